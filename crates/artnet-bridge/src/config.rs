//! Bridge configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interface::{InterfaceMetadata, PortCapability, PortLayout};
use crate::logging::LogConfig;
use crate::params::AddressingScheme;
use crate::{error::BridgeError, Result};

/// How a factory builds its interfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub addressing: AddressingScheme,
    pub layout: PortLayout,
    /// Hold DMX output while the kernel runs a send batch
    pub gate_output_during_send: bool,
    pub vendor_id: String,
    pub product_name: String,
    pub protocol_name: String,
    pub logging: LogConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addressing: AddressingScheme::Combined,
            layout: PortLayout::Simplex,
            gate_output_during_send: false,
            vendor_id: "Artistic License".to_string(),
            product_name: "ArtNet 4".to_string(),
            protocol_name: "Art-Net 4".to_string(),
            logging: LogConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Split addressing with duplex ports
    pub fn split_duplex() -> Self {
        Self {
            addressing: AddressingScheme::Split,
            layout: PortLayout::Duplex,
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Read a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded bridge config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml_string()?)?;
        Ok(())
    }

    /// Interfaces one node can hold with this layout
    pub fn interface_capacity(&self) -> usize {
        self.layout.interface_capacity()
    }

    /// Metadata advertised to the kernel
    pub fn metadata(&self) -> InterfaceMetadata {
        let (port, duplex) = match self.layout {
            PortLayout::Simplex => (PortCapability::Simplex(0), false),
            PortLayout::Duplex => (PortCapability::Duplex(0), true),
        };

        InterfaceMetadata {
            vendor_id: self.vendor_id.clone(),
            name: self.product_name.clone(),
            product_name: self.product_name.clone(),
            protocol: self.protocol_name.clone(),
            ports: vec![port],
            duplex,
        }
    }
}
