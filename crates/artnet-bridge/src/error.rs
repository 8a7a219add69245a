//! Error types for the Art-Net bridge
use thiserror::Error;

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A port-address field exceeds its bit width
    #[error("{field} out of range: {value} (max {max})")]
    AddressOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// Malformed or out-of-range parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Additional unicast target that is not a network address
    #[error("Not a valid IP address: {0}")]
    InvalidTarget(String),

    /// Parameter name not exposed by this interface
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// DMX buffer access outside the 512 channel universe
    #[error("Channel range out of bounds: offset {offset}, length {len}")]
    ChannelRange { offset: usize, len: usize },

    /// Configuration could not be parsed or written
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for the failures `test` reports before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BridgeError::AddressOutOfRange { .. }
                | BridgeError::InvalidParameter(_)
                | BridgeError::InvalidTarget(_)
        )
    }
}

/// The port-index pool is empty.
///
/// Returned by the allocator and consumed by the factory, which stops
/// advertising interfaces instead of failing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No port index left (node holds at most {max} ports)")]
pub struct CapacityExhausted {
    pub max: usize,
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
