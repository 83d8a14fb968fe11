use crate::error::{Result, TrackerError};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that can hard-reset the radio module
pub trait ResetLine: Send {
    fn pulse(&mut self) -> Result<()>;
}

/// Active-low reset pin driven through the sysfs GPIO interface
pub struct SysfsResetLine {
    base: PathBuf,
    pin: u32,
    low_time: Duration,
    boot_time: Duration,
}

impl SysfsResetLine {
    pub fn new(pin: u32) -> Self {
        Self {
            base: PathBuf::from("/sys/class/gpio"),
            pin,
            low_time: Duration::from_millis(10),
            boot_time: Duration::from_millis(2000),
        }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_timing(mut self, low_time: Duration, boot_time: Duration) -> Self {
        self.low_time = low_time;
        self.boot_time = boot_time;
        self
    }

    fn pin_dir(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.pin))
    }

    fn write_value(&self, value: &str) -> Result<()> {
        fs::write(self.pin_dir().join("value"), value)?;
        Ok(())
    }
}

impl ResetLine for SysfsResetLine {
    fn pulse(&mut self) -> Result<()> {
        if !self.pin_dir().exists() {
            debug!(pin = self.pin, "exporting reset GPIO");
            fs::write(self.base.join("export"), self.pin.to_string())?;
        }
        fs::write(self.pin_dir().join("direction"), "out")?;

        info!(pin = self.pin, "pulsing modem reset line");
        self.write_value("0")?;
        thread::sleep(self.low_time);
        self.write_value("1")?;
        thread::sleep(self.boot_time);
        Ok(())
    }
}

/// Root-hub power switch for the USB bus the GPS hangs off
#[derive(Debug, Clone)]
pub struct UsbPowerRail {
    path: PathBuf,
    settle: Duration,
}

impl UsbPowerRail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn power_on(&self) -> Result<()> {
        fs::write(&self.path, "1")?;
        Ok(())
    }

    /// Cuts power, waits, restores it and waits for enumeration.
    pub fn power_cycle(&self) -> Result<()> {
        warn!(path = %self.path.display(), "power cycling USB rail");
        fs::write(&self.path, "0")?;
        thread::sleep(self.settle);
        fs::write(&self.path, "1")?;
        thread::sleep(self.settle);
        Ok(())
    }
}

/// Waits for one of the candidate device files to appear, powering the rail between polls.
pub fn select_port(
    candidates: &[String],
    rail: &UsbPowerRail,
    attempts: u32,
    poll: Duration,
) -> Result<String> {
    for attempt in 1..=attempts {
        if let Some(found) = candidates.iter().find(|c| Path::new(c.as_str()).exists()) {
            info!(port = found.as_str(), attempt, "found GPS device");
            return Ok(found.clone());
        }

        debug!(attempt, "no GPS device yet, powering USB rail");
        if let Err(e) = rail.power_on() {
            warn!(error = %e, "failed to power USB rail");
        }
        thread::sleep(poll);
    }

    Err(TrackerError::Serial(format!(
        "no GPS device found among {:?}",
        candidates
    )))
}
