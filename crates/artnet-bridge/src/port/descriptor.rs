//! Port descriptors handed to the protocol stack

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use crate::address::PortAddress;

/// Direction bits of a port, from the network's point of view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortType {
    /// DMX enters the network through this port (kernel output)
    pub input_to_network: bool,
    /// DMX leaves the network through this port (kernel input)
    pub output_from_network: bool,
}

impl PortType {
    /// Plain DMX512 port with no direction set
    pub const DMX512: PortType = PortType {
        input_to_network: false,
        output_from_network: false,
    };
    pub const INPUT_TO_NETWORK: PortType = PortType {
        input_to_network: true,
        output_from_network: false,
    };
    pub const OUTPUT_FROM_NETWORK: PortType = PortType {
        input_to_network: false,
        output_from_network: true,
    };
}

/// GoodInput status of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoodInput {
    #[default]
    None,
    InputDisabled,
    DataReceived,
}

/// GoodOutput status of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoodOutput {
    #[default]
    None,
    /// The port is configured to put DMX on the wire
    BeingOutput,
    /// Frames are actually flowing
    DataTransmitted,
}

/// Protocol-facing record of one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub port_number: u8,
    pub port_address: PortAddress,
    pub port_type: PortType,
    pub additional_targets: BTreeSet<IpAddr>,
    pub force_broadcast: bool,
    pub good_input: GoodInput,
    pub good_output: GoodOutput,
}

impl PortDescriptor {
    pub fn new(port_number: u8, port_address: PortAddress, port_type: PortType) -> Self {
        Self {
            port_number,
            port_address,
            port_type,
            additional_targets: BTreeSet::new(),
            force_broadcast: false,
            good_input: GoodInput::None,
            good_output: GoodOutput::None,
        }
    }

    /// The node's root port (number 0, address 0, no direction)
    pub fn root() -> Self {
        Self::new(0, PortAddress::ROOT, PortType::DMX512)
    }

    pub fn into_shared(self) -> SharedPortDescriptor {
        Arc::new(RwLock::new(self))
    }
}

/// Descriptor shared between its owning interface and the protocol stack
pub type SharedPortDescriptor = Arc<RwLock<PortDescriptor>>;
