//! Interface parameter surface
//!
//! The kernel reads parameters with `get`, checks candidate values with
//! `test` and commits them with `set`. Validation never mutates: a value is
//! first turned into a [`ParamChange`] and only then applied.
//!
//! Two addressing schemes exist in the field and both are kept:
//!
//! - **Combined**: one `PortAddress` parameter holding the packed 15-bit value
//! - **Split**: `Net`, `Subnet`, `SendUniverse` and `ReceiveUniverse`, with
//!   separate universes for the transmit and receive directions

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::address::{self, PortAddress, MAX_NET, MAX_SUBNET, MAX_UNIVERSE};
use crate::{error::BridgeError, Result};

pub const PARAM_PORT_ADDRESS: &str = "PortAddress";
pub const PARAM_NET: &str = "Net";
pub const PARAM_SUBNET: &str = "Subnet";
pub const PARAM_SEND_UNIVERSE: &str = "SendUniverse";
pub const PARAM_RECEIVE_UNIVERSE: &str = "ReceiveUniverse";
pub const PARAM_FORCE_BROADCAST: &str = "ForceBroadcast";
pub const PARAM_ADDITIONAL_TARGET: &str = "AdditionalTarget";

const PORT_ADDRESS_HELP: &str = "The PortAddress in Art-Net is the universe in the lighting desk.\n\
Universe in Art-Net is NOT the desk universe, it is part of the PortAddress.\n\
\n\
The PortAddress is separated in multiple parts:\n\
Art-Net 1 to 2 (8 bit) -> Net (0x00), Subnet (0x0-0xf) and Universe (0x0-0xf).\n\
Art-Net 3 to 4 (15 bit) -> Net (0x00-0x7f), Subnet (0x0-0xf) and Universe (0x0-0xf).";

static NET_VALUES: Lazy<Vec<String>> =
    Lazy::new(|| (0..=MAX_NET).map(|n| n.to_string()).collect());
static NIBBLE_VALUES: Lazy<Vec<String>> =
    Lazy::new(|| (0..=MAX_SUBNET).map(|n| n.to_string()).collect());

/// A parameter value as exchanged with the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Address(PortAddress),
    Text(String),
}

/// Semantic type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Address,
    Byte,
    Bool,
    Text,
}

/// Description of one parameter for the kernel's settings surface
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ParameterKind,
    pub persistent: bool,
    /// Legal values in display form, when the parameter is enumerable
    pub allowed_values: Option<&'static [String]>,
    pub description: Option<&'static str>,
}

impl ParameterDescriptor {
    fn persistent(name: &'static str, label: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            label,
            kind,
            persistent: true,
            allowed_values: None,
            description: None,
        }
    }

    fn with_values(mut self, values: &'static [String]) -> Self {
        self.allowed_values = Some(values);
        self
    }

    fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Which addressing scheme an interface exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingScheme {
    #[default]
    Combined,
    Split,
}

/// Direction a descriptor carries, used to pick its address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// Kernel output into the network
    Transmit,
    /// Network into kernel input
    Receive,
}

/// Net/Subnet shared by both directions, one universe each
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SplitAddress {
    pub net: u8,
    pub subnet: u8,
    pub send_universe: u8,
    pub receive_universe: u8,
}

/// Current address state of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    Combined(PortAddress),
    Split(SplitAddress),
}

impl Addressing {
    pub fn new(scheme: AddressingScheme) -> Self {
        match scheme {
            AddressingScheme::Combined => Addressing::Combined(PortAddress::ROOT),
            AddressingScheme::Split => Addressing::Split(SplitAddress::default()),
        }
    }

    pub fn scheme(&self) -> AddressingScheme {
        match self {
            Addressing::Combined(_) => AddressingScheme::Combined,
            Addressing::Split(_) => AddressingScheme::Split,
        }
    }

    /// Port address a descriptor with `role` should carry
    pub fn address_for(&self, role: PortRole) -> PortAddress {
        match self {
            Addressing::Combined(address) => *address,
            Addressing::Split(split) => {
                let universe = match role {
                    PortRole::Transmit => split.send_universe,
                    PortRole::Receive => split.receive_universe,
                };
                // Fields are range-checked before they are stored
                PortAddress::new(split.net, split.subnet, universe).unwrap_or_default()
            }
        }
    }

    /// Port detail text shown by the kernel
    pub fn describe(&self) -> String {
        match self {
            Addressing::Combined(address) => format!(
                "Net: {} Subnet: {} Universe: {} [{}]",
                address.net(),
                address.subnet(),
                address.universe(),
                address
            ),
            Addressing::Split(split) => format!(
                "Net: {} Subnet: {} Send: {} Recv: {}",
                split.net, split.subnet, split.send_universe, split.receive_universe
            ),
        }
    }

    fn descriptors(&self) -> Vec<ParameterDescriptor> {
        match self {
            Addressing::Combined(_) => vec![ParameterDescriptor::persistent(
                PARAM_PORT_ADDRESS,
                "PortAddress",
                ParameterKind::Address,
            )
            .with_values(address::address_table().names())
            .with_description(PORT_ADDRESS_HELP)],
            Addressing::Split(_) => vec![
                ParameterDescriptor::persistent(PARAM_NET, "Net", ParameterKind::Byte)
                    .with_values(&NET_VALUES),
                ParameterDescriptor::persistent(PARAM_SUBNET, "Subnet", ParameterKind::Byte)
                    .with_values(&NIBBLE_VALUES),
                ParameterDescriptor::persistent(
                    PARAM_SEND_UNIVERSE,
                    "Send Universe",
                    ParameterKind::Byte,
                )
                .with_values(&NIBBLE_VALUES),
                ParameterDescriptor::persistent(
                    PARAM_RECEIVE_UNIVERSE,
                    "Receive Universe",
                    ParameterKind::Byte,
                )
                .with_values(&NIBBLE_VALUES),
            ],
        }
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        match (self, name) {
            (Addressing::Combined(address), PARAM_PORT_ADDRESS) => {
                Some(ParamValue::Address(*address))
            }
            (Addressing::Split(split), PARAM_NET) => Some(ParamValue::Int(split.net.into())),
            (Addressing::Split(split), PARAM_SUBNET) => Some(ParamValue::Int(split.subnet.into())),
            (Addressing::Split(split), PARAM_SEND_UNIVERSE) => {
                Some(ParamValue::Int(split.send_universe.into()))
            }
            (Addressing::Split(split), PARAM_RECEIVE_UNIVERSE) => {
                Some(ParamValue::Int(split.receive_universe.into()))
            }
            _ => None,
        }
    }

    /// The state after assigning `value` to `name`; `None` if `name` is not
    /// an address parameter of this scheme
    fn with_value(&self, name: &str, value: &ParamValue) -> Result<Option<Addressing>> {
        let next = match (self, name) {
            (Addressing::Combined(_), PARAM_PORT_ADDRESS) => {
                Addressing::Combined(address_from_value(value)?)
            }
            (Addressing::Split(split), PARAM_NET) => Addressing::Split(SplitAddress {
                net: field_from_value("Net", value, MAX_NET)?,
                ..*split
            }),
            (Addressing::Split(split), PARAM_SUBNET) => Addressing::Split(SplitAddress {
                subnet: field_from_value("Subnet", value, MAX_SUBNET)?,
                ..*split
            }),
            (Addressing::Split(split), PARAM_SEND_UNIVERSE) => Addressing::Split(SplitAddress {
                send_universe: field_from_value("Send Universe", value, MAX_UNIVERSE)?,
                ..*split
            }),
            (Addressing::Split(split), PARAM_RECEIVE_UNIVERSE) => {
                Addressing::Split(SplitAddress {
                    receive_universe: field_from_value("Receive Universe", value, MAX_UNIVERSE)?,
                    ..*split
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(next))
    }
}

fn field_from_value(field: &'static str, value: &ParamValue, max: u8) -> Result<u8> {
    let raw: i64 = match value {
        ParamValue::Int(n) => *n,
        ParamValue::Text(text) => text.trim().parse().map_err(|_| {
            BridgeError::InvalidParameter(format!("{}: not a number: {}", field, text))
        })?,
        other => {
            return Err(BridgeError::InvalidParameter(format!(
                "{}: value not valid: {:?}",
                field, other
            )))
        }
    };

    if raw < 0 {
        return Err(BridgeError::InvalidParameter(format!(
            "{}: value out of range (0-{}): {}",
            field, max, raw
        )));
    }
    if raw > max as i64 {
        return Err(BridgeError::AddressOutOfRange {
            field,
            value: raw.min(u32::MAX as i64) as u32,
            max: max as u32,
        });
    }
    Ok(raw as u8)
}

fn address_from_value(value: &ParamValue) -> Result<PortAddress> {
    match value {
        ParamValue::Address(address) => Ok(*address),
        ParamValue::Int(raw) => {
            if *raw < 0 || *raw > PortAddress::MAX_RAW as i64 {
                return Err(BridgeError::AddressOutOfRange {
                    field: "PortAddress",
                    value: (*raw).clamp(0, u32::MAX as i64) as u32,
                    max: PortAddress::MAX_RAW as u32,
                });
            }
            PortAddress::from_raw(*raw as u16)
        }
        ParamValue::Text(text) => address::parse(text),
        ParamValue::Bool(_) => Err(BridgeError::InvalidParameter(
            "PortAddress: value not valid".to_string(),
        )),
    }
}

fn bool_from_value(value: &ParamValue) -> Result<bool> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        ParamValue::Int(n) => Ok(*n != 0),
        ParamValue::Text(text) => text.trim().to_ascii_lowercase().parse().map_err(|_| {
            BridgeError::InvalidParameter(format!("Force broadcast: not a boolean: {}", text))
        }),
        ParamValue::Address(_) => Err(BridgeError::InvalidParameter(
            "Force broadcast: value not valid".to_string(),
        )),
    }
}

fn target_from_value(value: &ParamValue) -> Result<Option<IpAddr>> {
    let ParamValue::Text(text) = value else {
        return Err(BridgeError::InvalidParameter(
            "Additional target: value not valid".to_string(),
        ));
    };

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| BridgeError::InvalidTarget(text.to_string()))
}

/// A validated parameter assignment, ready to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamChange {
    Addressing(Addressing),
    ForceBroadcast(bool),
    AdditionalTarget(Option<IpAddr>),
}

/// Parameter values of one interface
#[derive(Debug, Clone)]
pub struct ParameterStore {
    addressing: Addressing,
    force_broadcast: bool,
    additional_target: Option<IpAddr>,
}

impl ParameterStore {
    pub fn new(scheme: AddressingScheme) -> Self {
        Self {
            addressing: Addressing::new(scheme),
            force_broadcast: false,
            additional_target: None,
        }
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn force_broadcast(&self) -> bool {
        self.force_broadcast
    }

    pub fn additional_target(&self) -> Option<IpAddr> {
        self.additional_target
    }

    /// Every parameter this store exposes, in display order
    pub fn descriptors(&self) -> Vec<ParameterDescriptor> {
        let mut descriptors = self.addressing.descriptors();
        descriptors.push(ParameterDescriptor::persistent(
            PARAM_FORCE_BROADCAST,
            "Force broadcast",
            ParameterKind::Bool,
        ));
        descriptors.push(ParameterDescriptor::persistent(
            PARAM_ADDITIONAL_TARGET,
            "Additional send to IP (optional)",
            ParameterKind::Text,
        ));
        descriptors
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        match name {
            PARAM_FORCE_BROADCAST => Some(ParamValue::Bool(self.force_broadcast)),
            PARAM_ADDITIONAL_TARGET => Some(ParamValue::Text(
                self.additional_target
                    .map(|ip| ip.to_string())
                    .unwrap_or_default(),
            )),
            _ => self.addressing.get(name),
        }
    }

    /// Check `value` for `name` without touching the store
    pub fn validate(&self, name: &str, value: &ParamValue) -> Result<ParamChange> {
        match name {
            PARAM_FORCE_BROADCAST => Ok(ParamChange::ForceBroadcast(bool_from_value(value)?)),
            PARAM_ADDITIONAL_TARGET => Ok(ParamChange::AdditionalTarget(target_from_value(value)?)),
            _ => self
                .addressing
                .with_value(name, value)?
                .map(ParamChange::Addressing)
                .ok_or_else(|| BridgeError::UnknownParameter(name.to_string())),
        }
    }

    /// Apply a validated change; false when it matches the current value
    pub fn apply(&mut self, change: &ParamChange) -> bool {
        match change {
            ParamChange::Addressing(next) => replace(&mut self.addressing, *next),
            ParamChange::ForceBroadcast(next) => replace(&mut self.force_broadcast, *next),
            ParamChange::AdditionalTarget(next) => replace(&mut self.additional_target, *next),
        }
    }

    /// Values of every persistent parameter, keyed by name
    pub fn snapshot(&self) -> BTreeMap<String, ParamValue> {
        self.descriptors()
            .into_iter()
            .filter(|descriptor| descriptor.persistent)
            .filter_map(|descriptor| {
                self.get(descriptor.name)
                    .map(|value| (descriptor.name.to_string(), value))
            })
            .collect()
    }
}

fn replace<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}
