//! Driver configuration.
//!
//! One driver serves both capability variants; the variant and the optional
//! user channel are configuration, not separate code paths. The defaults
//! reproduce the ELAN 04F3:30BC touchpad identity.
//!
//! Configs load from TOML, with every missing field falling back to the
//! default and unknown keys rejected:
//!
//! ```
//! use padbind::DriverConfig;
//!
//! let config = DriverConfig::from_toml_str(r#"
//!     variant = "minimal"
//!     user_channel = true
//! "#).unwrap();
//! assert_eq!(config.peripheral_id, "ELAN0662:00");
//! ```

use serde::{Deserialize, Serialize};

use crate::caps::CapabilityVariant;
use crate::error::DriverError;
use crate::event::BUS_I2C;

/// Identity and feature selection for one driver instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Bus identity string the driver matches against.
    pub peripheral_id: String,
    /// Display name of the published input device.
    pub device_name: String,
    pub bus_type: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    /// Capability set published at registration.
    pub variant: CapabilityVariant,
    /// Attach the user channel stub to each bound peripheral.
    pub user_channel: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            peripheral_id: "ELAN0662:00".to_string(),
            device_name: "ELAN0662:00 04F3:30BC Touchpad".to_string(),
            bus_type: BUS_I2C,
            vendor_id: 0x04f3,
            product_id: 0x30bc,
            version: 0x0100,
            variant: CapabilityVariant::Full,
            user_channel: false,
        }
    }
}

impl DriverConfig {
    /// Parses a TOML configuration fragment.
    pub fn from_toml_str(s: &str) -> Result<Self, DriverError> {
        Ok(toml::from_str(s)?)
    }
}
