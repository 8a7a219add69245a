//! Art-Net node seam
//!
//! The packet framing and the UDP transport belong to an external protocol
//! stack. This module defines what the bridge needs from it
//! ([`ProtocolStack`]), the per-node [`NodeSynchronizer`] that every
//! interface registers with, and [`MemoryStack`], an in-process stack that
//! records everything it is given.

pub mod memory;
pub mod sync;

pub use memory::{MemoryStack, SentFrame};
pub use sync::NodeSynchronizer;

use tracing::Level;

use crate::address::PortAddress;
use crate::port::SharedPortDescriptor;

/// Operations the bridge consumes from the Art-Net protocol stack
pub trait ProtocolStack: Send + Sync {
    /// Announce this node on the network
    fn add_instance(&self);

    /// Withdraw the node; no further calls follow
    fn dispose_instance(&self);

    /// Start advertising a port
    fn add_port_config(&self, descriptor: SharedPortDescriptor);

    /// Stop advertising a port
    fn remove_port_config(&self, descriptor: &SharedPortDescriptor);

    /// Queue DMX values for the universe at `address`, starting at `offset`
    fn write_dmx(&self, address: PortAddress, data: &[u8], offset: u16);
}

/// Receiver of DMX frames dispatched by the node
pub trait FrameListener: Send + Sync {
    /// Handle a frame for `address`; false when it is not addressed to us
    fn on_frame_received(&self, address: PortAddress, data: &[u8]) -> bool;
}

/// Log destination the host kernel can install on the node
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default sink, forwarding into `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "artnet_bridge::node", "{}", message),
            Level::WARN => tracing::warn!(target: "artnet_bridge::node", "{}", message),
            Level::INFO => tracing::info!(target: "artnet_bridge::node", "{}", message),
            Level::DEBUG => tracing::debug!(target: "artnet_bridge::node", "{}", message),
            _ => tracing::trace!(target: "artnet_bridge::node", "{}", message),
        }
    }
}
