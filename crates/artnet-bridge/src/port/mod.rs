//! Port bookkeeping
//!
//! - [`allocator`] - bounded pool of port indices with lowest-first reuse
//! - [`descriptor`] - the records registered with the protocol stack
//! - [`direction`] - input/output/disabled state per descriptor

pub mod allocator;
pub mod descriptor;
pub mod direction;

pub use allocator::{PortIndex, PortIndexAllocator, MAX_PORTS};
pub use descriptor::{GoodInput, GoodOutput, PortDescriptor, PortType, SharedPortDescriptor};
pub use direction::{DirectionMachine, DirectionState, StatusSnapshot};
