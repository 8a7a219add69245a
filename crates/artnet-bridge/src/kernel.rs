//! Notifications towards the host kernel

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Something the kernel needs to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelEvent {
    /// A received channel changed value
    DmxInputChanged { port: u8, channel: u16, value: u8 },
    /// The port's detail text changed
    PortDetailChanged { port: u8, detail: String },
}

/// Receiver of [`KernelEvent`]s
///
/// Called from the network receive thread as well as from kernel calls, so
/// implementations must not block for long.
pub trait KernelSink: Send + Sync {
    fn notify(&self, event: KernelEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullKernelSink;

impl KernelSink for NullKernelSink {
    fn notify(&self, _event: KernelEvent) {}
}

/// Forwards events into a channel
#[derive(Debug, Clone)]
pub struct ChannelKernelSink {
    sender: Sender<KernelEvent>,
}

impl ChannelKernelSink {
    pub fn new(sender: Sender<KernelEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of a fresh unbounded channel
    pub fn unbounded() -> (Self, Receiver<KernelEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl KernelSink for ChannelKernelSink {
    fn notify(&self, event: KernelEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Kernel event dropped, receiver gone");
        }
    }
}
