//! Art-Net Bridge - DMX universes on an Art-Net node
//!
//! This crate adapts a lighting kernel's DMX universes to Art-Net port
//! addresses and keeps their buffers in sync with an external Art-Net
//! protocol stack:
//! - **Addressing**: 15-bit port-address codec and lookup table
//! - **Ports**: bounded index pool, port descriptors, direction state machine
//! - **Parameters**: validated get/test/set surface for the kernel
//! - **Buffers**: locked 512-byte universes with change detection
//! - **Node**: registration, frame dispatch and send-batch gating
//!
//! ## Quick Start
//!
//! ```rust
//! use artnet_bridge::{
//!     BridgeConfig, DmxInterface, InterfaceFactory, MemoryStack, NullKernelSink, ParamValue,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> artnet_bridge::Result<()> {
//! let stack = Arc::new(MemoryStack::new());
//! let factory = InterfaceFactory::with_stack(BridgeConfig::default(), stack.clone());
//!
//! let iface = factory
//!     .create_interface(Arc::new(NullKernelSink))
//!     .expect("node has room");
//! iface.enable_output(0);
//! iface.set_parameter("PortAddress", ParamValue::Text("0.0.1".into()))?;
//! iface.send_dmx(0, &[10, 20, 30])?;
//!
//! assert_eq!(stack.sent_frames()[0].data, vec![10, 20, 30]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`address`] - port-address codec
//! - [`port`] - index allocation, descriptors, directions
//! - [`params`] - parameter surface and addressing schemes
//! - [`buffer`] - DMX buffers
//! - [`node`] - protocol-stack seam and node synchronizer
//! - [`interface`] - the interfaces themselves
//! - [`factory`] - interface lifecycle
//! - [`kernel`] - notifications towards the kernel
//! - [`config`] / [`logging`] - configuration and log setup
//! - [`error`] - error types

pub mod address;
pub mod buffer;
pub mod config;
pub mod error;
pub mod factory;
pub mod interface;
pub mod kernel;
pub mod logging;
pub mod node;
pub mod params;
pub mod port;

// Re-exports
pub use address::PortAddress;
pub use buffer::{DmxBuffer, UNIVERSE_SIZE};
pub use config::BridgeConfig;
pub use error::{BridgeError, CapacityExhausted, Result};
pub use factory::InterfaceFactory;
pub use interface::{
    ArtNetInterface, Direction, DisposeHook, DmxInterface, InterfaceMetadata, PortCapability,
    PortLayout,
};
pub use kernel::{ChannelKernelSink, KernelEvent, KernelSink, NullKernelSink};
pub use logging::LogConfig;
pub use node::{
    FrameListener, LogSink, MemoryStack, NodeSynchronizer, ProtocolStack, SentFrame,
    TracingLogSink,
};
pub use params::{AddressingScheme, ParamValue, ParameterDescriptor, ParameterKind};
pub use port::{
    DirectionState, GoodInput, GoodOutput, PortDescriptor, PortIndex, PortIndexAllocator,
    PortType, MAX_PORTS,
};
