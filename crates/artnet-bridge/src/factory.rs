//! Interface factory
//!
//! Owns the node's port-index pool and the table of live interfaces. The
//! host kernel may create and dispose interfaces from several threads; both
//! go through one lock.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn, Level};

use crate::config::BridgeConfig;
use crate::interface::{ArtNetInterface, InterfaceMetadata};
use crate::kernel::KernelSink;
use crate::node::{LogSink, NodeSynchronizer, ProtocolStack};
use crate::port::{PortIndex, PortIndexAllocator};

struct FactoryState {
    allocator: PortIndexAllocator,
    interfaces: BTreeMap<PortIndex, Arc<ArtNetInterface>>,
}

impl FactoryState {
    /// Forget the interface at `index` and free its index
    fn reclaim(&mut self, index: PortIndex) -> bool {
        if self.interfaces.remove(&index).is_none() {
            return false;
        }
        self.allocator.release(index)
    }
}

/// Creates Art-Net interfaces on one node
pub struct InterfaceFactory {
    config: BridgeConfig,
    node: Arc<NodeSynchronizer>,
    // Shared with the dispose hooks of live interfaces
    state: Arc<Mutex<FactoryState>>,
}

impl InterfaceFactory {
    /// Factory around an existing node
    pub fn new(config: BridgeConfig, node: Arc<NodeSynchronizer>) -> Self {
        let capacity = config.interface_capacity();
        info!(
            "Art-Net factory ready: {:?} addressing, {:?} ports, {} interfaces max",
            config.addressing, config.layout, capacity
        );

        Self {
            config,
            node,
            state: Arc::new(Mutex::new(FactoryState {
                allocator: PortIndexAllocator::new(capacity),
                interfaces: BTreeMap::new(),
            })),
        }
    }

    /// Factory with a fresh node on `stack`
    pub fn with_stack(config: BridgeConfig, stack: Arc<dyn ProtocolStack>) -> Self {
        let node = NodeSynchronizer::new(stack, config.gate_output_during_send);
        Self::new(config, node)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn vendor_id(&self) -> &str {
        &self.config.vendor_id
    }

    /// The node every interface of this factory synchronizes on
    pub fn synchronizer(&self) -> &Arc<NodeSynchronizer> {
        &self.node
    }

    /// Interface types the kernel may create right now; empty once the
    /// node is full or disposed
    pub fn available_interfaces(&self) -> Vec<InterfaceMetadata> {
        if !self.node.is_disposed() && self.state.lock().allocator.has_capacity() {
            vec![self.config.metadata()]
        } else {
            Vec::new()
        }
    }

    /// Create an interface, or `None` when no port index is left or the
    /// node is gone
    pub fn create_interface(&self, kernel: Arc<dyn KernelSink>) -> Option<Arc<ArtNetInterface>> {
        let mut state = self.state.lock();

        if self.node.is_disposed() {
            warn!("Not creating Art-Net interface: node is disposed");
            return None;
        }

        let index = match state.allocator.allocate() {
            Ok(index) => index,
            Err(exhausted) => {
                warn!("Not creating Art-Net interface: {}", exhausted);
                return None;
            }
        };

        let interface = ArtNetInterface::create(
            index,
            self.config.layout,
            self.config.addressing,
            self.config.metadata(),
            Arc::clone(&self.node),
            kernel,
        );
        let owner = Arc::downgrade(&self.state);
        interface.set_dispose_hook(Box::new(move |index| {
            if let Some(state) = owner.upgrade() {
                state.lock().reclaim(index);
            }
        }));
        state.interfaces.insert(index, Arc::clone(&interface));

        self.node.log(
            Level::DEBUG,
            &format!("Art-Net interface created at port index {}", index),
        );
        Some(interface)
    }

    /// Dispose the interface at `index` and return its index to the pool
    ///
    /// Same effect as the kernel calling [`DmxInterface::dispose`](crate::DmxInterface::dispose) on it.
    pub fn dispose_interface(&self, index: PortIndex) -> bool {
        let Some(interface) = self.interface(index) else {
            return false;
        };
        if !interface.shutdown() {
            return false;
        }

        self.node.log(
            Level::DEBUG,
            &format!("Art-Net interface at port index {} disposed", index),
        );
        true
    }

    pub fn interface(&self, index: PortIndex) -> Option<Arc<ArtNetInterface>> {
        self.state.lock().interfaces.get(&index).cloned()
    }

    pub fn interface_count(&self) -> usize {
        self.state.lock().interfaces.len()
    }

    pub fn remaining_capacity(&self) -> usize {
        self.state.lock().allocator.remaining()
    }

    /// Install the kernel's logger on the node
    pub fn set_logger(&self, sink: Arc<dyn LogSink>) {
        self.node.set_log_sink(sink);
    }

    /// Dispose every interface and the node
    pub fn dispose(&self) {
        let interfaces: Vec<_> = self.state.lock().interfaces.values().cloned().collect();
        for interface in interfaces {
            interface.shutdown();
        }

        self.node.dispose();
    }
}
