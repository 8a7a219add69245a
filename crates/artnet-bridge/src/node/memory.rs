//! In-process protocol stack
//!
//! Records node registration, advertised ports and every DMX write instead
//! of putting anything on the network. Hosts without a network and the test
//! suite drive the bridge through it.

use parking_lot::Mutex;
use std::sync::Arc;

use super::ProtocolStack;
use crate::address::PortAddress;
use crate::port::{PortDescriptor, SharedPortDescriptor};

/// One call to the send primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub address: PortAddress,
    pub offset: u16,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct MemoryStackState {
    instances: usize,
    disposals: usize,
    ports: Vec<SharedPortDescriptor>,
    sent: Vec<SentFrame>,
}

/// Protocol stack that keeps everything in memory
#[derive(Default)]
pub struct MemoryStack {
    state: Mutex<MemoryStackState>,
}

impl MemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `add_instance` was called
    pub fn instance_count(&self) -> usize {
        self.state.lock().instances
    }

    /// Times `dispose_instance` was called
    pub fn dispose_count(&self) -> usize {
        self.state.lock().disposals
    }

    /// Ports currently advertised, root included
    pub fn port_count(&self) -> usize {
        self.state.lock().ports.len()
    }

    pub fn is_registered(&self, descriptor: &SharedPortDescriptor) -> bool {
        self.state
            .lock()
            .ports
            .iter()
            .any(|d| Arc::ptr_eq(d, descriptor))
    }

    /// Copies of the advertised descriptors, in registration order
    pub fn port_configs(&self) -> Vec<PortDescriptor> {
        self.state
            .lock()
            .ports
            .iter()
            .map(|d| d.read().clone())
            .collect()
    }

    /// Every write so far, oldest first
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.state.lock().sent.clone()
    }

    /// Drain the recorded writes
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut self.state.lock().sent)
    }
}

impl ProtocolStack for MemoryStack {
    fn add_instance(&self) {
        self.state.lock().instances += 1;
    }

    fn dispose_instance(&self) {
        self.state.lock().disposals += 1;
    }

    fn add_port_config(&self, descriptor: SharedPortDescriptor) {
        let mut state = self.state.lock();
        if !state.ports.iter().any(|d| Arc::ptr_eq(d, &descriptor)) {
            state.ports.push(descriptor);
        }
    }

    fn remove_port_config(&self, descriptor: &SharedPortDescriptor) {
        self.state
            .lock()
            .ports
            .retain(|d| !Arc::ptr_eq(d, descriptor));
    }

    fn write_dmx(&self, address: PortAddress, data: &[u8], offset: u16) {
        tracing::trace!(
            "Memory stack: {} bytes at {} for {}",
            data.len(),
            offset,
            address
        );
        self.state.lock().sent.push(SentFrame {
            address,
            offset,
            data: data.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortType;

    #[test]
    fn test_records_ports_and_writes() {
        let stack = MemoryStack::new();
        let port = PortDescriptor::new(4, PortAddress::ROOT, PortType::DMX512).into_shared();

        stack.add_port_config(port.clone());
        stack.add_port_config(port.clone());
        assert_eq!(stack.port_count(), 1);
        assert_eq!(stack.port_configs()[0].port_number, 4);

        stack.write_dmx(PortAddress::ROOT, &[1, 2], 7);
        assert_eq!(
            stack.take_sent(),
            vec![SentFrame {
                address: PortAddress::ROOT,
                offset: 7,
                data: vec![1, 2],
            }]
        );
        assert!(stack.sent_frames().is_empty());

        stack.remove_port_config(&port);
        assert!(!stack.is_registered(&port));
    }
}
