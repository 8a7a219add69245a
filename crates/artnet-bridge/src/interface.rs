//! Art-Net DMX interfaces
//!
//! An interface maps one kernel universe onto the Art-Net port-address
//! space. Two layouts exist:
//!
//! - **Simplex**: one port descriptor that is either an input or an output
//!   at any time. Registered with the node when the interface is created.
//! - **Duplex**: a transmit and a receive descriptor, each with its own
//!   direction. Registered while the interface is enabled.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use crate::address::PortAddress;
use crate::buffer::{DmxBuffer, UNIVERSE_SIZE};
use crate::kernel::{KernelEvent, KernelSink};
use crate::node::{FrameListener, NodeSynchronizer};
use crate::params::{
    AddressingScheme, ParamChange, ParamValue, ParameterDescriptor, ParameterStore, PortRole,
};
use crate::port::{
    DirectionMachine, DirectionState, GoodOutput, PortDescriptor, PortIndex, PortType,
    SharedPortDescriptor, StatusSnapshot, MAX_PORTS,
};
use crate::{error::BridgeError, Result};

/// Port layout of the interfaces a factory creates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortLayout {
    #[default]
    Simplex,
    Duplex,
}

impl PortLayout {
    /// Descriptors each interface registers with the node
    pub fn descriptors_per_interface(self) -> usize {
        match self {
            PortLayout::Simplex => 1,
            PortLayout::Duplex => 2,
        }
    }

    /// Interfaces that fit on one node next to the root port
    pub fn interface_capacity(self) -> usize {
        (MAX_PORTS - 1) / self.descriptors_per_interface()
    }
}

/// Capability of one kernel-visible port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortCapability {
    Simplex(u8),
    Duplex(u8),
}

/// What the kernel is told about an interface type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceMetadata {
    pub vendor_id: String,
    pub name: String,
    pub product_name: String,
    pub protocol: String,
    pub ports: Vec<PortCapability>,
    pub duplex: bool,
}

/// Kernel-side direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Network to kernel
    Input,
    /// Kernel to network
    Output,
}

impl Direction {
    fn active_state(self) -> DirectionState {
        match self {
            Direction::Input => DirectionState::InputEnabled,
            Direction::Output => DirectionState::OutputEnabled,
        }
    }
}

/// What the host kernel can do with an interface
pub trait DmxInterface: Send + Sync {
    fn port_index(&self) -> PortIndex;
    fn metadata(&self) -> &InterfaceMetadata;

    fn on_enable(&self);
    fn on_disable(&self);

    fn enable_output(&self, port: usize);
    fn disable_output(&self, port: usize);
    fn enable_input(&self, port: usize);
    fn disable_input(&self, port: usize);

    fn parameters(&self) -> Vec<ParameterDescriptor>;
    fn get_parameter(&self, name: &str) -> Option<ParamValue>;
    fn test_parameter(&self, name: &str, value: &ParamValue) -> Result<()>;
    fn set_parameter(&self, name: &str, value: ParamValue) -> Result<bool>;

    fn read_dmx(&self, offset: usize, count: usize) -> Result<Vec<u8>>;
    fn read_dmx_byte(&self, offset: usize) -> Result<u8>;
    fn send_dmx(&self, offset: usize, values: &[u8]) -> Result<()>;

    /// The kernel finished a write cycle on `port`
    fn commit_port(&self, port: usize);

    fn dispose(&self);
}

struct PortSlot {
    descriptor: SharedPortDescriptor,
    machine: DirectionMachine,
}

enum PortSet {
    Simplex(PortSlot),
    Duplex {
        transmit: PortSlot,
        receive: PortSlot,
    },
}

impl PortSet {
    fn slots(&self) -> Vec<&PortSlot> {
        match self {
            PortSet::Simplex(slot) => vec![slot],
            PortSet::Duplex { transmit, receive } => vec![transmit, receive],
        }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut PortSlot {
        match (self, direction) {
            (PortSet::Simplex(slot), _) => slot,
            (PortSet::Duplex { transmit, .. }, Direction::Output) => transmit,
            (PortSet::Duplex { receive, .. }, Direction::Input) => receive,
        }
    }

    fn slot(&self, direction: Direction) -> &PortSlot {
        match (self, direction) {
            (PortSet::Simplex(slot), _) => slot,
            (PortSet::Duplex { transmit, .. }, Direction::Output) => transmit,
            (PortSet::Duplex { receive, .. }, Direction::Input) => receive,
        }
    }
}

struct InterfaceState {
    params: ParameterStore,
    ports: PortSet,
    enabled: bool,
}

impl InterfaceState {
    /// Push the current addressing into every descriptor
    fn sync_addresses(&self) {
        let addressing = self.params.addressing();
        match &self.ports {
            PortSet::Simplex(slot) => {
                let role = match slot.machine.state() {
                    DirectionState::InputEnabled => PortRole::Receive,
                    _ => PortRole::Transmit,
                };
                slot.descriptor.write().port_address = addressing.address_for(role);
            }
            PortSet::Duplex { transmit, receive } => {
                transmit.descriptor.write().port_address =
                    addressing.address_for(PortRole::Transmit);
                receive.descriptor.write().port_address =
                    addressing.address_for(PortRole::Receive);
            }
        }
    }
}

/// Called once with the interface's index when it is disposed
pub type DisposeHook = Box<dyn FnOnce(PortIndex) + Send>;

/// An Art-Net backed DMX interface
pub struct ArtNetInterface {
    index: PortIndex,
    metadata: InterfaceMetadata,
    node: Arc<NodeSynchronizer>,
    kernel: Arc<dyn KernelSink>,
    // Handles outside the state lock so the receive path never takes it
    transmit: SharedPortDescriptor,
    receive: SharedPortDescriptor,
    state: Mutex<InterfaceState>,
    rx: DmxBuffer,
    tx: DmxBuffer,
    disposed: AtomicBool,
    dispose_hook: Mutex<Option<DisposeHook>>,
}

impl ArtNetInterface {
    /// Create the interface for `index` and hook it into `node`
    pub fn create(
        index: PortIndex,
        layout: PortLayout,
        scheme: AddressingScheme,
        metadata: InterfaceMetadata,
        node: Arc<NodeSynchronizer>,
        kernel: Arc<dyn KernelSink>,
    ) -> Arc<Self> {
        let params = ParameterStore::new(scheme);

        let ports = match layout {
            PortLayout::Simplex => PortSet::Simplex(PortSlot {
                descriptor: PortDescriptor::new(
                    index,
                    params.addressing().address_for(PortRole::Transmit),
                    PortType::DMX512,
                )
                .into_shared(),
                machine: DirectionMachine::exclusive(),
            }),
            PortLayout::Duplex => {
                // Two descriptors per interface; the pool is sized so the
                // port numbers fit a byte.
                let base = (index as u16 * 2).min(u8::MAX as u16) as u8;
                PortSet::Duplex {
                    transmit: PortSlot {
                        descriptor: PortDescriptor::new(
                            base.saturating_sub(1),
                            params.addressing().address_for(PortRole::Transmit),
                            PortType::INPUT_TO_NETWORK,
                        )
                        .into_shared(),
                        machine: DirectionMachine::independent(),
                    },
                    receive: PortSlot {
                        descriptor: PortDescriptor::new(
                            base,
                            params.addressing().address_for(PortRole::Receive),
                            PortType::OUTPUT_FROM_NETWORK,
                        )
                        .into_shared(),
                        machine: DirectionMachine::independent(),
                    },
                }
            }
        };

        let transmit = Arc::clone(&ports.slot(Direction::Output).descriptor);
        let receive = Arc::clone(&ports.slot(Direction::Input).descriptor);

        if layout == PortLayout::Simplex {
            node.register_port(&transmit);
        }

        let interface = Arc::new(Self {
            index,
            metadata,
            node: Arc::clone(&node),
            kernel,
            transmit,
            receive,
            state: Mutex::new(InterfaceState {
                params,
                ports,
                enabled: false,
            }),
            rx: DmxBuffer::new(),
            tx: DmxBuffer::new(),
            disposed: AtomicBool::new(false),
            dispose_hook: Mutex::new(None),
        });

        let listener: Weak<dyn FrameListener> =
            Arc::downgrade(&interface) as Weak<dyn FrameListener>;
        node.subscribe(index, listener);

        debug!("Created {:?} Art-Net interface at port index {}", layout, index);
        interface
    }

    pub fn layout(&self) -> PortLayout {
        match self.state.lock().ports {
            PortSet::Simplex(_) => PortLayout::Simplex,
            PortSet::Duplex { .. } => PortLayout::Duplex,
        }
    }

    /// Descriptor carrying kernel output into the network
    pub fn transmit_port(&self) -> &SharedPortDescriptor {
        &self.transmit
    }

    /// Descriptor carrying network data to the kernel
    pub fn receive_port(&self) -> &SharedPortDescriptor {
        &self.receive
    }

    /// Address frames must carry to reach this interface
    pub fn receive_address(&self) -> PortAddress {
        self.receive.read().port_address
    }

    /// Address writes are sent to
    pub fn transmit_address(&self) -> PortAddress {
        self.transmit.read().port_address
    }

    pub fn direction_state(&self, direction: Direction) -> DirectionState {
        self.state.lock().ports.slot(direction).machine.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Port detail text for the kernel
    pub fn port_detail(&self) -> String {
        self.state.lock().params.addressing().describe()
    }

    /// Enable or disable one direction, returning the status after each step
    ///
    /// On a simplex port, enabling one direction while the other is active
    /// disables the active one first; both steps show up in the result.
    pub fn set_direction(&self, direction: Direction, enable: bool) -> Vec<StatusSnapshot> {
        let mut state = self.state.lock();
        let slot = state.ports.slot_mut(direction);

        let steps = {
            let mut descriptor = slot.descriptor.write();
            if enable {
                slot.machine.enter(direction.active_state(), &mut descriptor)
            } else {
                slot.machine.leave(direction.active_state(), &mut descriptor)
            }
        };

        if !steps.is_empty() {
            state.sync_addresses();
        }
        steps
    }

    /// Values of every persistent parameter, for the kernel to store
    pub fn snapshot_parameters(&self) -> BTreeMap<String, ParamValue> {
        self.state.lock().params.snapshot()
    }

    /// Validate and apply stored parameter values
    ///
    /// Nothing is applied unless every value validates. Returns how many
    /// values changed.
    pub fn restore_parameters(&self, values: &BTreeMap<String, ParamValue>) -> Result<usize> {
        for (name, value) in values {
            self.test_parameter(name, value)?;
        }

        let mut changed = 0;
        for (name, value) in values {
            if self.set_parameter(name, value.clone())? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Run `hook` when the interface is disposed, however that happens
    ///
    /// The owning factory uses this to take the interface back. Replaces any
    /// earlier hook; an already disposed interface runs it right away.
    pub fn set_dispose_hook(&self, hook: DisposeHook) {
        let mut slot = self.dispose_hook.lock();
        if self.is_disposed() {
            drop(slot);
            hook(self.index);
            return;
        }
        *slot = Some(hook);
    }

    /// Withdraw from the node and notify the owner; false when already done
    pub fn shutdown(&self) -> bool {
        let hook = {
            let mut slot = self.dispose_hook.lock();
            if self.disposed.swap(true, Ordering::SeqCst) {
                return false;
            }
            slot.take()
        };

        self.node.unsubscribe(self.index);
        self.node.deregister_port(&self.transmit);
        self.node.deregister_port(&self.receive);
        debug!("Interface {} disposed", self.index);

        if let Some(hook) = hook {
            hook(self.index);
        }
        true
    }

    fn check_port(&self, port: usize, hook: &str) -> bool {
        if port != 0 {
            warn!(
                "Interface {}: {} for unknown port {}",
                self.index, hook, port
            );
            return false;
        }
        true
    }
}

impl DmxInterface for ArtNetInterface {
    fn port_index(&self) -> PortIndex {
        self.index
    }

    fn metadata(&self) -> &InterfaceMetadata {
        &self.metadata
    }

    fn on_enable(&self) {
        let mut state = self.state.lock();
        state.enabled = true;

        for slot in state.ports.slots() {
            slot.machine.reapply(&mut slot.descriptor.write());
        }
        if let PortSet::Duplex { transmit, receive } = &state.ports {
            self.node.register_port(&transmit.descriptor);
            self.node.register_port(&receive.descriptor);
        }
        debug!("Interface {} enabled", self.index);
    }

    fn on_disable(&self) {
        let mut state = self.state.lock();
        state.enabled = false;

        match &state.ports {
            PortSet::Simplex(slot) => slot.machine.suspend(&mut slot.descriptor.write()),
            PortSet::Duplex { transmit, receive } => {
                self.node.deregister_port(&transmit.descriptor);
                self.node.deregister_port(&receive.descriptor);
            }
        }
        debug!("Interface {} disabled", self.index);
    }

    fn enable_output(&self, port: usize) {
        if self.check_port(port, "enable_output") {
            self.set_direction(Direction::Output, true);
        }
    }

    fn disable_output(&self, port: usize) {
        if self.check_port(port, "disable_output") {
            self.set_direction(Direction::Output, false);
        }
    }

    fn enable_input(&self, port: usize) {
        if self.check_port(port, "enable_input") {
            self.set_direction(Direction::Input, true);
        }
    }

    fn disable_input(&self, port: usize) {
        if self.check_port(port, "disable_input") {
            self.set_direction(Direction::Input, false);
        }
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        self.state.lock().params.descriptors()
    }

    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.state.lock().params.get(name)
    }

    fn test_parameter(&self, name: &str, value: &ParamValue) -> Result<()> {
        self.state.lock().params.validate(name, value).map(|_| ())
    }

    fn set_parameter(&self, name: &str, value: ParamValue) -> Result<bool> {
        let mut state = self.state.lock();
        let change = state.params.validate(name, &value)?;
        if !state.params.apply(&change) {
            trace!("Interface {}: {} unchanged", self.index, name);
            return Ok(false);
        }

        match change {
            ParamChange::Addressing(_) => {
                state.sync_addresses();
                let detail = state.params.addressing().describe();
                drop(state);

                debug!("Interface {}: {}", self.index, detail);
                self.kernel
                    .notify(KernelEvent::PortDetailChanged { port: 0, detail });
            }
            ParamChange::ForceBroadcast(force) => {
                for slot in state.ports.slots() {
                    slot.descriptor.write().force_broadcast = force;
                }
            }
            ParamChange::AdditionalTarget(target) => {
                let mut transmit = self.transmit.write();
                transmit.additional_targets.clear();
                if let Some(ip) = target {
                    transmit.additional_targets.insert(ip);
                }
            }
        }
        Ok(true)
    }

    fn read_dmx(&self, offset: usize, count: usize) -> Result<Vec<u8>> {
        self.rx.read_range(offset, count)
    }

    fn read_dmx_byte(&self, offset: usize) -> Result<u8> {
        self.rx.read_byte(offset)
    }

    fn send_dmx(&self, offset: usize, values: &[u8]) -> Result<()> {
        if self.is_disposed() {
            return Err(BridgeError::InvalidParameter(format!(
                "Interface {} is disposed",
                self.index
            )));
        }

        self.tx.write(offset, values)?;
        // offset + len <= 512 was checked by the buffer
        self.node
            .write_dmx(self.transmit_address(), values, offset as u16);
        Ok(())
    }

    fn commit_port(&self, port: usize) {
        if !self.check_port(port, "commit_port") {
            return;
        }

        let committed = {
            let state = self.state.lock();
            let slot = state.ports.slot(Direction::Output);
            let mut descriptor = slot.descriptor.write();
            slot.machine.record_commit(&mut descriptor)
        };

        if committed {
            let frame = self.tx.snapshot();
            self.node
                .write_dmx(self.transmit_address(), &frame[..UNIVERSE_SIZE], 0);
        }
    }

    fn dispose(&self) {
        self.shutdown();
    }
}

impl FrameListener for ArtNetInterface {
    fn on_frame_received(&self, address: PortAddress, data: &[u8]) -> bool {
        if self.is_disposed() || address != self.receive_address() {
            return false;
        }

        let changes = self.rx.apply_frame(data);
        if changes.is_empty() {
            return true;
        }

        self.receive.write().good_output = GoodOutput::DataTransmitted;
        trace!(
            "Interface {}: {} channels changed from {}",
            self.index,
            changes.len(),
            address
        );

        for (channel, value) in changes {
            self.kernel.notify(KernelEvent::DmxInputChanged {
                port: 0,
                channel: channel as u16,
                value,
            });
        }
        true
    }
}
