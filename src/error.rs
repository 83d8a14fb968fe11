use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported device type: {0}")]
    UnsupportedDevice(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid DevEUI: {0}")]
    InvalidDevEui(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("no reply within the global timeout, the module needs a reset")]
    ModemTimeout,

    #[error("Modem command error: {0}")]
    ModemCommand(String),

    #[error("Unexpected modem response: {0}")]
    ModemResponse(String),

    #[error("Network join failed: {0}")]
    JoinFailed(String),

    #[error("GPS did not acknowledge PMTK{0}")]
    GpsAck(u16),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TrackerError {
    /// True when the modem stopped answering and only a hardware reset recovers it.
    pub fn is_fatal_hardware(&self) -> bool {
        matches!(self, TrackerError::ModemTimeout)
    }

    /// True for errors scoped to a single uplink.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrackerError::Decode(_)
                | TrackerError::UnsupportedDevice(_)
                | TrackerError::Validation(_)
                | TrackerError::InvalidDevEui(_)
                | TrackerError::JsonError(_)
        )
    }
}

impl From<serialport::Error> for TrackerError {
    fn from(err: serialport::Error) -> Self {
        TrackerError::Serial(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_fatal() {
        assert!(TrackerError::ModemTimeout.is_fatal_hardware());
        assert!(!TrackerError::ModemCommand("-1".to_string()).is_fatal_hardware());
        assert_eq!(
            TrackerError::ModemTimeout.to_string(),
            "no reply within the global timeout, the module needs a reset"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(TrackerError::Decode("x".to_string()).is_client_error());
        assert!(TrackerError::Validation("x".to_string()).is_client_error());
        assert!(!TrackerError::JoinFailed("x".to_string()).is_client_error());
    }
}
