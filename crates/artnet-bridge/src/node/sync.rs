//! Node synchronizer
//!
//! One per factory. Owns the node's registration with the protocol stack,
//! fans received frames out to the interfaces and gates DMX output around
//! the kernel's send batches.
//!
//! With gating on, DMX written while a batch is in flight is held back and
//! handed to the stack, in order, once the last batch finishes. Descriptor
//! changes are not gated.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, Level};

use super::{FrameListener, LogSink, ProtocolStack, TracingLogSink};
use crate::address::PortAddress;
use crate::port::{PortDescriptor, PortIndex, SharedPortDescriptor};

struct HeldWrite {
    address: PortAddress,
    data: Vec<u8>,
    offset: u16,
}

#[derive(Default)]
struct SendGate {
    // Send batches currently in progress
    in_flight: usize,
    held: Vec<HeldWrite>,
}

pub struct NodeSynchronizer {
    stack: Arc<dyn ProtocolStack>,
    root: SharedPortDescriptor,
    registered: Mutex<Vec<SharedPortDescriptor>>,
    listeners: RwLock<BTreeMap<PortIndex, Weak<dyn FrameListener>>>,
    gate_during_send: bool,
    gate: Mutex<SendGate>,
    log_sink: RwLock<Arc<dyn LogSink>>,
    disposed: AtomicBool,
}

impl NodeSynchronizer {
    /// Register a node with `stack`, including its root port
    pub fn new(stack: Arc<dyn ProtocolStack>, gate_during_send: bool) -> Arc<Self> {
        let root = PortDescriptor::root().into_shared();

        stack.add_port_config(Arc::clone(&root));
        stack.add_instance();
        info!(
            "Art-Net node registered (output gating {})",
            if gate_during_send { "on" } else { "off" }
        );

        Arc::new(Self {
            stack,
            root,
            registered: Mutex::new(Vec::new()),
            listeners: RwLock::new(BTreeMap::new()),
            gate_during_send,
            gate: Mutex::new(SendGate::default()),
            log_sink: RwLock::new(Arc::new(TracingLogSink)),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn root_port(&self) -> &SharedPortDescriptor {
        &self.root
    }

    /// Start advertising `descriptor`; false if it already is or the node
    /// is disposed
    pub fn register_port(&self, descriptor: &SharedPortDescriptor) -> bool {
        if self.is_disposed() {
            return false;
        }
        let mut registered = self.registered.lock();
        if registered.iter().any(|d| Arc::ptr_eq(d, descriptor)) {
            return false;
        }

        registered.push(Arc::clone(descriptor));
        self.stack.add_port_config(Arc::clone(descriptor));
        debug!("Registered port {}", descriptor.read().port_number);
        true
    }

    /// Stop advertising `descriptor`; false if it was not registered
    pub fn deregister_port(&self, descriptor: &SharedPortDescriptor) -> bool {
        let mut registered = self.registered.lock();
        let Some(position) = registered.iter().position(|d| Arc::ptr_eq(d, descriptor)) else {
            return false;
        };

        registered.swap_remove(position);
        self.stack.remove_port_config(descriptor);
        debug!("Deregistered port {}", descriptor.read().port_number);
        true
    }

    pub fn is_registered(&self, descriptor: &SharedPortDescriptor) -> bool {
        self.registered
            .lock()
            .iter()
            .any(|d| Arc::ptr_eq(d, descriptor))
    }

    /// Ports registered by interfaces (the root port is not counted)
    pub fn registered_ports(&self) -> usize {
        self.registered.lock().len()
    }

    /// Deliver received frames for `index` to `listener`
    pub fn subscribe(&self, index: PortIndex, listener: Weak<dyn FrameListener>) {
        self.listeners.write().insert(index, listener);
    }

    pub fn unsubscribe(&self, index: PortIndex) -> bool {
        self.listeners.write().remove(&index).is_some()
    }

    /// Entry point for the protocol stack's receive event
    ///
    /// Returns how many interfaces accepted the frame. Frames nobody is
    /// listening for are dropped.
    pub fn frame_received(&self, address: PortAddress, data: &[u8]) -> usize {
        let listeners: Vec<Arc<dyn FrameListener>> = {
            let mut map = self.listeners.write();
            map.retain(|_, listener| listener.strong_count() > 0);
            map.values().filter_map(Weak::upgrade).collect()
        };

        let accepted = listeners
            .iter()
            .filter(|listener| listener.on_frame_received(address, data))
            .count();

        if accepted == 0 {
            trace!("Dropped frame for unrouted port address {}", address);
        }
        accepted
    }

    /// Forward DMX values to the stack's send primitive
    ///
    /// Returns false when the write was held back by a closed gate.
    pub fn write_dmx(&self, address: PortAddress, data: &[u8], offset: u16) -> bool {
        if self.gate_during_send {
            let mut gate = self.gate.lock();
            if gate.in_flight > 0 {
                gate.held.push(HeldWrite {
                    address,
                    data: data.to_vec(),
                    offset,
                });
                trace!(
                    "Holding {} bytes for {} until the batch ends",
                    data.len(),
                    address
                );
                return false;
            }
        }

        self.stack.write_dmx(address, data, offset);
        true
    }

    /// Called by the kernel right before a batch of interfaces sends
    pub fn before_send(&self) {
        self.gate.lock().in_flight += 1;
    }

    /// Called by the kernel once the batch is done; the last one to finish
    /// releases held writes
    pub fn after_send(&self) {
        let held = {
            let mut gate = self.gate.lock();
            gate.in_flight = gate.in_flight.saturating_sub(1);
            if gate.in_flight > 0 {
                return;
            }
            std::mem::take(&mut gate.held)
        };

        if !held.is_empty() {
            debug!("Gate open, releasing {} held writes", held.len());
        }
        for write in held {
            self.stack.write_dmx(write.address, &write.data, write.offset);
        }
    }

    /// Whether DMX goes straight to the stack right now
    pub fn output_enabled(&self) -> bool {
        !self.gate_during_send || self.gate.lock().in_flight == 0
    }

    /// Writes waiting for the gate to open
    pub fn held_writes(&self) -> usize {
        self.gate.lock().held.len()
    }

    pub fn gates_output(&self) -> bool {
        self.gate_during_send
    }

    pub fn set_log_sink(&self, sink: Arc<dyn LogSink>) {
        *self.log_sink.write() = sink;
    }

    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.log_sink.read())
    }

    /// Write through the installed log sink
    pub fn log(&self, level: Level, message: &str) {
        self.log_sink.read().log(level, message);
    }

    /// Withdraw every port and the node itself; later calls do nothing
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let registered = std::mem::take(&mut *self.registered.lock());
        for descriptor in &registered {
            self.stack.remove_port_config(descriptor);
        }
        self.stack.remove_port_config(&self.root);
        self.listeners.write().clear();
        self.gate.lock().held.clear();
        self.stack.dispose_instance();

        info!("Art-Net node disposed ({} ports withdrawn)", registered.len());
        self.log(Level::INFO, "Art-Net node disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for NodeSynchronizer {
    fn drop(&mut self) {
        self.dispose();
    }
}
