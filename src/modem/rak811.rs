use super::transport::{ModemTransport, TransportSettings};
use crate::error::{Result, TrackerError};
use crate::hw::ResetLine;
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, info};

/// Synchronous acknowledgement token
pub const OK: &str = "OK";

pub const SUPPORTED_BANDS: &[&str] = &["EU868", "US915", "AU915", "KR920", "AS923"];

const APP_EUI: &str = "0000010000000000";
const NWKS_KEY: &str = "00000000000000000000000000000000";

/// Asynchronous status reported as `at+recv=<code>,0,0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    RecvData,
    TxConfirmed,
    TxUnconfirmed,
    Joined,
    JoinFailed,
    TxTimeout,
    Rx2Timeout,
    DownlinkRepeated,
    WakeUp,
    P2pTxComplete,
    Unknown,
    Unrecognized(String),
}

impl ModemEvent {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let code = line
            .strip_prefix("at+recv=")
            .and_then(|rest| rest.split(',').next())
            .and_then(|code| code.trim().parse::<u16>().ok());

        match code {
            Some(0) => ModemEvent::RecvData,
            Some(1) => ModemEvent::TxConfirmed,
            Some(2) => ModemEvent::TxUnconfirmed,
            Some(3) => ModemEvent::Joined,
            Some(4) => ModemEvent::JoinFailed,
            Some(5) => ModemEvent::TxTimeout,
            Some(6) => ModemEvent::Rx2Timeout,
            Some(7) => ModemEvent::DownlinkRepeated,
            Some(8) => ModemEvent::WakeUp,
            Some(9) => ModemEvent::P2pTxComplete,
            Some(100) => ModemEvent::Unknown,
            _ => ModemEvent::Unrecognized(line.to_string()),
        }
    }

    /// Whether a transmission left the radio
    pub fn is_sent(&self) -> bool {
        matches!(self, ModemEvent::TxConfirmed | ModemEvent::TxUnconfirmed)
    }
}

impl fmt::Display for ModemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemEvent::RecvData => f.write_str("recv data"),
            ModemEvent::TxConfirmed => f.write_str("tx confirmed"),
            ModemEvent::TxUnconfirmed => f.write_str("tx unconfirmed"),
            ModemEvent::Joined => f.write_str("joined"),
            ModemEvent::JoinFailed => f.write_str("join failed"),
            ModemEvent::TxTimeout => f.write_str("tx timeout"),
            ModemEvent::Rx2Timeout => f.write_str("rx2 timeout"),
            ModemEvent::DownlinkRepeated => f.write_str("downlink repeated"),
            ModemEvent::WakeUp => f.write_str("wake up"),
            ModemEvent::P2pTxComplete => f.write_str("p2p tx complete"),
            ModemEvent::Unknown => f.write_str("unknown"),
            ModemEvent::Unrecognized(line) => write!(f, "unrecognized {:?}", line),
        }
    }
}

/// Operations the join supervisor needs from a LoRaWAN radio
pub trait LoraModem {
    /// Power-cycles the module and returns its boot banner
    fn hard_reset(&mut self) -> Result<String>;
    fn set_mode(&mut self, mode: u8) -> Result<()>;
    fn set_band(&mut self, band: &str) -> Result<()>;
    fn set_config(&mut self, config: &str) -> Result<()>;
    fn join_otaa(&mut self) -> Result<ModemEvent>;
    /// Unconfirmed uplink of hex-encoded bytes on `port`
    fn send(&mut self, port: u8, payload_hex: &str) -> Result<ModemEvent>;
    fn signal(&mut self) -> Result<String>;
}

/// LoRaWAN OTAA config string for `set_config`
pub fn otaa_config(dev_eui: &str, app_key: &str, data_rate: u8) -> String {
    format!(
        "adr:off&dr:{}&pwr_level:0&dev_eui:{}&app_key:{}&app_eui:{}&nwks_key:{}",
        data_rate, dev_eui, app_key, APP_EUI, NWKS_KEY
    )
}

/// RAK811 module on a serial port with a hardware reset line
pub struct Rak811<P: Read + Write, R: ResetLine> {
    transport: ModemTransport<P>,
    reset: R,
}

impl<P: Read + Write, R: ResetLine> Rak811<P, R> {
    pub fn new(port: P, reset: R, settings: TransportSettings) -> Self {
        Self {
            transport: ModemTransport::new(port, settings),
            reset,
        }
    }

    pub fn version(&mut self) -> Result<String> {
        self.transport.execute("version", 1)
    }

    pub fn band(&mut self) -> Result<String> {
        self.transport.execute("band", 1)
    }

    /// Sends a command acknowledged with `OK`, then waits for its outcome line.
    fn acknowledged(&mut self, command: &str) -> Result<ModemEvent> {
        let ack = self.transport.execute(command, 1)?;
        if ack != OK {
            return Err(TrackerError::ModemResponse(ack));
        }
        let outcome = self.transport.collect(1)?;
        Ok(ModemEvent::parse(&outcome))
    }
}

impl<P: Read + Write, R: ResetLine> LoraModem for Rak811<P, R> {
    fn hard_reset(&mut self) -> Result<String> {
        self.reset.pulse()?;
        let banner = self.transport.collect(4)?;
        info!(banner = banner.as_str(), "modem reset");
        Ok(banner)
    }

    fn set_mode(&mut self, mode: u8) -> Result<()> {
        let reply = self.transport.execute(&format!("mode={}", mode), 4)?;
        if !reply.ends_with(OK) {
            return Err(TrackerError::ModemResponse(reply));
        }
        Ok(())
    }

    fn set_band(&mut self, band: &str) -> Result<()> {
        if !SUPPORTED_BANDS.contains(&band) {
            return Err(TrackerError::Validation(format!(
                "unrecognised band {}, supported bands: {:?}",
                band, SUPPORTED_BANDS
            )));
        }

        let current = self.band()?;
        if current.contains(band) {
            debug!(band, "band already set, skipping");
            return Ok(());
        }

        self.transport.execute(&format!("band={}", band), 4)?;
        Ok(())
    }

    fn set_config(&mut self, config: &str) -> Result<()> {
        let reply = self.transport.execute(&format!("set_config={}", config), 1)?;
        if reply != OK {
            return Err(TrackerError::ModemResponse(reply));
        }
        Ok(())
    }

    fn join_otaa(&mut self) -> Result<ModemEvent> {
        self.acknowledged("join=otaa")
    }

    fn send(&mut self, port: u8, payload_hex: &str) -> Result<ModemEvent> {
        self.acknowledged(&format!("send=0,{},{}", port, payload_hex))
    }

    fn signal(&mut self) -> Result<String> {
        self.transport.execute("signal", 1)
    }
}
