use crate::error::TrackerError;
use crate::ingest::rpi::parse_coordinates;
use crate::modem::rak811::SUPPORTED_BANDS;
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Receiver-side configuration (uplink webhook service)
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_addr: SocketAddr,
    pub age_tick: Duration,
}

/// Sender-side configuration (GPS + RAK811 device)
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub lora: LoraConfig,
    pub modem: ModemConfig,
    pub gps: GpsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct LoraConfig {
    pub app_key: String,
    pub dev_eui: String,
    pub data_rate: u8,
    pub band: Option<String>,
    pub join_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
    pub global_timeout: Duration,
    pub read_timeout: Duration,
    pub settle_delay: Duration,
    pub reset_gpio: u32,
}

#[derive(Debug, Clone)]
pub struct GpsConfig {
    pub ports: Vec<String>,
    pub baud_rate: u32,
    pub fix_interval_ms: u32,
    pub usb_power_path: PathBuf,
    pub hdop_threshold: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub send_interval: Option<Duration>,
    pub single_points: bool,
    pub fake_fix: Option<(f64, f64)>,
    pub invalid_reset_threshold: u32,
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Ok(ReceiverConfig {
            bind_addr: parse_env(
                "LORATRACK_BIND_ADDR",
                "0.0.0.0:8070".parse().context("Invalid default bind address")?,
            )?,
            age_tick: Duration::from_millis(parse_env("LORATRACK_AGE_TICK_MS", 1000u64)?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.age_tick.is_zero() {
            return Err(TrackerError::ConfigError(
                "LORATRACK_AGE_TICK_MS must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

impl SenderConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let lora = LoraConfig {
            app_key: env::var("LORATRACK_APP_KEY").context("LORATRACK_APP_KEY must be set")?,
            dev_eui: env::var("LORATRACK_DEV_EUI").context("LORATRACK_DEV_EUI must be set")?,
            data_rate: parse_env("LORATRACK_DATA_RATE", 1)?,
            band: env::var("LORATRACK_BAND").ok().filter(|b| !b.is_empty()),
            join_attempts: parse_env("LORATRACK_JOIN_ATTEMPTS", 25)?,
        };

        let modem = ModemConfig {
            port: env::var("LORATRACK_MODEM_PORT").unwrap_or_else(|_| "/dev/ttyAMA0".to_string()),
            baud_rate: parse_env("LORATRACK_MODEM_BAUD", 115_200)?,
            global_timeout: Duration::from_secs(parse_env("LORATRACK_MODEM_TIMEOUT_SECS", 600)?),
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            reset_gpio: parse_env("LORATRACK_MODEM_RESET_GPIO", 17)?,
        };

        let gps = GpsConfig {
            ports: env::var("LORATRACK_GPS_PORTS")
                .unwrap_or_else(|_| "/dev/ttyUSB0,/dev/ttyUSB1".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            baud_rate: parse_env("LORATRACK_GPS_BAUD", 9600)?,
            fix_interval_ms: parse_env("LORATRACK_GPS_FIX_INTERVAL_MS", 1000)?,
            usb_power_path: env::var("LORATRACK_USB_POWER_PATH")
                .unwrap_or_else(|_| "/sys/devices/platform/soc/20980000.usb/buspower".to_string())
                .into(),
            hdop_threshold: parse_env_opt("LORATRACK_HDOP")?,
        };

        let fake_fix = match env::var("LORATRACK_FAKE_GPS") {
            Ok(raw) if !raw.is_empty() => {
                let (lat, lon, _) = parse_coordinates(&raw)
                    .map_err(|e| anyhow::anyhow!("Failed to parse LORATRACK_FAKE_GPS: {}", e))?;
                Some((lat, lon))
            }
            _ => None,
        };

        let pipeline = PipelineConfig {
            send_interval: parse_env_opt::<u64>("LORATRACK_SEND_INTERVAL_SECS")?
                .map(Duration::from_secs),
            single_points: parse_env("LORATRACK_SINGLE_POINTS", false)?,
            fake_fix,
            invalid_reset_threshold: parse_env("LORATRACK_GPS_INVALID_RESET", 50)?,
        };

        Ok(SenderConfig {
            lora,
            modem,
            gps,
            pipeline,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.lora.app_key.len() != 32 || !is_hex(&self.lora.app_key) {
            return Err(TrackerError::ConfigError(
                "LORATRACK_APP_KEY must be 32 hex characters".to_string(),
            )
            .into());
        }

        if self.lora.dev_eui.len() != 16 || !is_hex(&self.lora.dev_eui) {
            return Err(TrackerError::ConfigError(
                "LORATRACK_DEV_EUI must be 16 hex characters".to_string(),
            )
            .into());
        }

        if self.lora.data_rate > 13 {
            return Err(TrackerError::ConfigError(format!(
                "LORATRACK_DATA_RATE must be between 0 and 13 (got {})",
                self.lora.data_rate
            ))
            .into());
        }

        if let Some(ref band) = self.lora.band {
            if !SUPPORTED_BANDS.contains(&band.as_str()) {
                return Err(TrackerError::ConfigError(format!(
                    "Unsupported band {}, expected one of {:?}",
                    band, SUPPORTED_BANDS
                ))
                .into());
            }
        }

        if self.lora.join_attempts == 0 {
            return Err(TrackerError::ConfigError(
                "LORATRACK_JOIN_ATTEMPTS must be at least 1".to_string(),
            )
            .into());
        }

        if self.gps.ports.is_empty() {
            return Err(TrackerError::ConfigError(
                "LORATRACK_GPS_PORTS must list at least one device".to_string(),
            )
            .into());
        }

        if let Some(hdop) = self.gps.hdop_threshold {
            if !(hdop > 0.0) {
                return Err(TrackerError::ConfigError(format!(
                    "LORATRACK_HDOP must be positive (got {})",
                    hdop
                ))
                .into());
            }
        }

        Ok(())
    }
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    parse_env_opt(key).map(|opt| opt.unwrap_or(default))
}

fn parse_env_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", key, e))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_config() -> SenderConfig {
        SenderConfig {
            lora: LoraConfig {
                app_key: "000102030405060708090a0b0c0d0e0f".to_string(),
                dev_eui: "0011223344556677".to_string(),
                data_rate: 1,
                band: Some("EU868".to_string()),
                join_attempts: 25,
            },
            modem: ModemConfig {
                port: "/dev/ttyAMA0".to_string(),
                baud_rate: 115_200,
                global_timeout: Duration::from_secs(600),
                read_timeout: Duration::from_secs(1),
                settle_delay: Duration::from_millis(100),
                reset_gpio: 17,
            },
            gps: GpsConfig {
                ports: vec!["/dev/ttyUSB0".to_string()],
                baud_rate: 9600,
                fix_interval_ms: 1000,
                usb_power_path: PathBuf::from("/tmp/buspower"),
                hdop_threshold: None,
            },
            pipeline: PipelineConfig {
                send_interval: None,
                single_points: false,
                fake_fix: None,
                invalid_reset_threshold: 50,
            },
        }
    }

    #[test]
    fn test_valid_sender_config() {
        assert!(sender_config().validate().is_ok());
    }

    #[test]
    fn test_app_key_must_be_32_hex() {
        let mut config = sender_config();
        config.lora.app_key = "0001".to_string();
        assert!(config.validate().is_err());

        config.lora.app_key = "zz0102030405060708090a0b0c0d0e0f".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dev_eui_must_be_16_hex() {
        let mut config = sender_config();
        config.lora.dev_eui = "00112233445566".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_rate_range() {
        let mut config = sender_config();
        config.lora.data_rate = 13;
        assert!(config.validate().is_ok());
        config.lora.data_rate = 14;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_band_must_be_supported() {
        let mut config = sender_config();
        config.lora.band = Some("CN470".to_string());
        assert!(config.validate().is_err());
        config.lora.band = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_receiver_config_rejects_zero_tick() {
        let config = ReceiverConfig {
            bind_addr: "127.0.0.1:8070".parse().unwrap(),
            age_tick: Duration::ZERO,
        };
        assert!(config.validate().is_err());
    }
}
