use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// LoRaWAN DevEUI (8 bytes, hex-encoded in JSON)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevEui(pub String);

impl DevEui {
    pub fn new(dev_eui: String) -> Result<Self, TrackerError> {
        let eui = Self(dev_eui);
        eui.validate()?;
        Ok(eui)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.0.len() != 16 {
            return Err(TrackerError::InvalidDevEui(
                "DevEUI must be 16 hex characters".to_string(),
            ));
        }
        if !self.0.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TrackerError::InvalidDevEui(
                "DevEUI must contain only hex characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the DevEUI as a normalized lowercase string
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DevEui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gateway EUI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayEui(pub String);

impl GatewayEui {
    pub fn new(eui: String) -> Self {
        Self(eui)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GatewayEui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame counter
pub type FCnt = u32;

/// LoRaWAN application port
pub type FPort = u8;

/// RSSI in dBm
pub type Rssi = i32;

/// SNR in dB
pub type Snr = f64;

/// Stable device identity: `{deviceName}-{devEUI}`.
pub fn device_id(device_name: &str, dev_eui: &DevEui) -> String {
    format!("{}-{}", device_name, dev_eui.normalized())
}
