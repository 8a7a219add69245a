//! Art-Net port-address codec
//!
//! A port address is the 15-bit value that identifies one DMX universe on an
//! Art-Net network:
//!
//! ```text
//!  14       8 7    4 3    0
//! +----------+------+------+
//! |   Net    |Subnet| Univ |
//! +----------+------+------+
//! ```
//!
//! Art-Net 1 and 2 only used the low 8 bits (Net fixed at 0). Art-Net 3 and 4
//! widen the Net field to 7 bits, giving 32768 addressable universes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{error::BridgeError, Result};

/// Highest valid Net value (7 bits)
pub const MAX_NET: u8 = 0x7F;
/// Highest valid Subnet value (4 bits)
pub const MAX_SUBNET: u8 = 0x0F;
/// Highest valid Universe value (4 bits)
pub const MAX_UNIVERSE: u8 = 0x0F;
/// Number of distinct port addresses
pub const ADDRESS_COUNT: usize = 1 << 15;

/// A packed 15-bit Art-Net port address
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct PortAddress(u16);

impl PortAddress {
    /// The address of the node's root port
    pub const ROOT: PortAddress = PortAddress(0);

    /// Largest packed value
    pub const MAX_RAW: u16 = (ADDRESS_COUNT - 1) as u16;

    /// Pack Net, Subnet and Universe into a port address
    pub fn new(net: u8, subnet: u8, universe: u8) -> Result<Self> {
        check_field("Net", net as u32, MAX_NET as u32)?;
        check_field("Subnet", subnet as u32, MAX_SUBNET as u32)?;
        check_field("Universe", universe as u32, MAX_UNIVERSE as u32)?;

        Ok(Self(
            ((net as u16) << 8) | ((subnet as u16) << 4) | universe as u16,
        ))
    }

    /// Wrap an already packed value
    pub fn from_raw(raw: u16) -> Result<Self> {
        check_field("PortAddress", raw as u32, Self::MAX_RAW as u32)?;
        Ok(Self(raw))
    }

    /// The packed 15-bit value
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn net(self) -> u8 {
        (self.0 >> 8) as u8 & MAX_NET
    }

    pub fn subnet(self) -> u8 {
        (self.0 >> 4) as u8 & MAX_SUBNET
    }

    pub fn universe(self) -> u8 {
        self.0 as u8 & MAX_UNIVERSE
    }

    /// Split into (net, subnet, universe)
    pub fn decode(self) -> (u8, u8, u8) {
        (self.net(), self.subnet(), self.universe())
    }
}

fn check_field(field: &'static str, value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(BridgeError::AddressOutOfRange { field, value, max });
    }
    Ok(())
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.net(), self.subnet(), self.universe())
    }
}

impl FromStr for PortAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

impl TryFrom<u16> for PortAddress {
    type Error = BridgeError;

    fn try_from(raw: u16) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<PortAddress> for u16 {
    fn from(address: PortAddress) -> u16 {
        address.0
    }
}

/// Pack Net, Subnet and Universe into a port address
pub fn encode(net: u8, subnet: u8, universe: u8) -> Result<PortAddress> {
    PortAddress::new(net, subnet, universe)
}

/// Split a port address into (net, subnet, universe)
pub fn decode(address: PortAddress) -> (u8, u8, u8) {
    address.decode()
}

/// Canonical "Net.Subnet.Universe" text of an address
pub fn format(address: PortAddress) -> String {
    address.to_string()
}

/// Parse a port address from text
///
/// Accepts the canonical `"Net.Subnet.Universe"` form as well as the packed
/// value written in decimal (`"4097"`).
pub fn parse(text: &str) -> Result<PortAddress> {
    let text = text.trim();

    if let Some(address) = address_table().lookup(text) {
        return Ok(address);
    }

    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        let raw: u32 = text
            .parse()
            .map_err(|_| BridgeError::InvalidParameter(format!("Invalid port address: {}", text)))?;
        check_field("PortAddress", raw, PortAddress::MAX_RAW as u32)?;
        return PortAddress::from_raw(raw as u16);
    }

    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 3 {
        return Err(BridgeError::InvalidParameter(format!(
            "Port address must be Net.Subnet.Universe: {}",
            text
        )));
    }

    let mut fields = [0u32; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part.trim().parse().map_err(|_| {
            BridgeError::InvalidParameter(format!("Invalid port address field: {}", part))
        })?;
    }

    check_field("Net", fields[0], MAX_NET as u32)?;
    check_field("Subnet", fields[1], MAX_SUBNET as u32)?;
    check_field("Universe", fields[2], MAX_UNIVERSE as u32)?;

    PortAddress::new(fields[0] as u8, fields[1] as u8, fields[2] as u8)
}

/// Every port address keyed by its canonical text
pub struct AddressTable {
    names: Vec<String>,
    lookup: HashMap<String, PortAddress>,
}

impl AddressTable {
    fn build() -> Self {
        let mut names = Vec::with_capacity(ADDRESS_COUNT);
        let mut lookup = HashMap::with_capacity(ADDRESS_COUNT);

        for raw in 0..=PortAddress::MAX_RAW {
            let address = PortAddress(raw);
            let name = address.to_string();
            lookup.insert(name.clone(), address);
            names.push(name);
        }

        tracing::debug!("Built port address table with {} entries", names.len());

        Self { names, lookup }
    }

    /// Canonical names in packed-value order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Find the address for a canonical name
    pub fn lookup(&self, name: &str) -> Option<PortAddress> {
        self.lookup.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

static ADDRESS_TABLE: Lazy<AddressTable> = Lazy::new(AddressTable::build);

/// The shared address table, built on first use
pub fn address_table() -> &'static AddressTable {
    &ADDRESS_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let address = encode(1, 2, 3).unwrap();
        assert_eq!(address.raw(), 0x0123);
        assert_eq!(decode(address), (1, 2, 3));

        let top = encode(127, 15, 15).unwrap();
        assert_eq!(top.raw(), 0x7FFF);
    }

    #[test]
    fn test_encode_range_errors() {
        assert!(matches!(
            encode(128, 0, 0),
            Err(BridgeError::AddressOutOfRange { field: "Net", .. })
        ));
        assert!(matches!(
            encode(0, 16, 0),
            Err(BridgeError::AddressOutOfRange { field: "Subnet", .. })
        ));
        assert!(matches!(
            encode(0, 0, 16),
            Err(BridgeError::AddressOutOfRange { field: "Universe", .. })
        ));
        assert!(PortAddress::from_raw(0x8000).is_err());
    }

    #[test]
    fn test_format_and_parse() {
        let address = encode(0, 0, 1).unwrap();
        assert_eq!(format(address), "0.0.1");
        assert_eq!(parse("0.0.1").unwrap(), address);
        assert_eq!(parse(" 0.0.1 ").unwrap(), address);
        assert_eq!(parse("1").unwrap(), address);
        assert_eq!("127.15.15".parse::<PortAddress>().unwrap().raw(), 0x7FFF);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("1.2").is_err());
        assert!(parse("a.b.c").is_err());
        assert!(matches!(
            parse("128.0.0"),
            Err(BridgeError::AddressOutOfRange { field: "Net", .. })
        ));
        assert!(matches!(
            parse("32768"),
            Err(BridgeError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn test_table_enumerates_every_address() {
        let table = address_table();
        assert_eq!(table.len(), ADDRESS_COUNT);
        assert_eq!(table.names()[0], "0.0.0");
        assert_eq!(table.names()[0x7FFF], "127.15.15");
        assert_eq!(table.lookup("3.4.5"), Some(encode(3, 4, 5).unwrap()));
        assert_eq!(table.lookup("3.4.16"), None);
    }

    #[test]
    fn test_serde_packed_value() {
        let address = encode(2, 1, 0).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "528");
        let back: PortAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
        assert!(serde_json::from_str::<PortAddress>("40000").is_err());
    }
}
