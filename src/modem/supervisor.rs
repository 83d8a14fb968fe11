use super::rak811::{otaa_config, LoraModem, ModemEvent};
use crate::error::{Result, TrackerError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Link state of the LoRaWAN modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Joining,
    Joined,
}

/// Network credentials and retry policy
#[derive(Debug, Clone)]
pub struct LoraSettings {
    pub dev_eui: String,
    pub app_key: String,
    pub data_rate: u8,
    pub band: Option<String>,
    pub max_join_attempts: u32,
    pub retry_delay: Duration,
}

/// LoRaWAN mode for `set_mode`
const LORAWAN_MODE: u8 = 0;

/// Keeps the modem joined: bounded join attempts per cycle, then a
/// hardware reset and a full bring-up. It never gives up.
pub struct JoinSupervisor<M: LoraModem> {
    modem: M,
    settings: LoraSettings,
    state: LinkState,
    escalations: u64,
}

impl<M: LoraModem> JoinSupervisor<M> {
    pub fn new(modem: M, settings: LoraSettings) -> Self {
        Self {
            modem,
            settings,
            state: LinkState::Disconnected,
            escalations: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Hardware resets forced after a failed join cycle
    pub fn escalations(&self) -> u64 {
        self.escalations
    }

    pub fn modem_mut(&mut self) -> &mut M {
        &mut self.modem
    }

    /// Blocks until the modem is joined.
    ///
    /// Only a failed join cycle counts as an escalation; a failed bring-up
    /// is retried without one.
    pub fn connect(&mut self) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;

            self.state = LinkState::Disconnected;
            if let Err(e) = self.bring_up() {
                warn!(cycle, error = %e, "modem bring-up failed");
                thread::sleep(self.settings.retry_delay);
                continue;
            }

            self.state = LinkState::Joining;
            match self.join_cycle() {
                Ok(()) => {
                    self.state = LinkState::Joined;
                    info!(cycle, "joined LoRaWAN network");
                    return;
                }
                Err(e) => {
                    self.escalations += 1;
                    warn!(cycle, error = %e, "join cycle failed, forcing hardware reset");
                }
            }
        }
    }

    /// Reset, mode, optional band, then the OTAA config.
    fn bring_up(&mut self) -> Result<()> {
        self.modem.hard_reset()?;
        self.modem.set_mode(LORAWAN_MODE)?;
        if let Some(ref band) = self.settings.band {
            self.modem.set_band(band)?;
        }
        let config = otaa_config(
            &self.settings.dev_eui,
            &self.settings.app_key,
            self.settings.data_rate,
        );
        self.modem.set_config(&config)
    }

    /// Runs up to `max_join_attempts` joins. An unresponsive modem ends the
    /// cycle early with its transport error.
    fn join_cycle(&mut self) -> Result<()> {
        let mut last_outcome = String::new();
        for attempt in 1..=self.settings.max_join_attempts {
            match self.modem.join_otaa() {
                Ok(ModemEvent::Joined) => return Ok(()),
                Ok(event) => {
                    warn!(attempt, outcome = %event, "join attempt failed");
                    last_outcome = event.to_string();
                }
                Err(e) if e.is_fatal_hardware() => {
                    error!(attempt, error = %e, "modem unresponsive during join");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "join request rejected");
                    last_outcome = e.to_string();
                }
            }
            thread::sleep(self.settings.retry_delay);
        }

        Err(TrackerError::JoinFailed(format!(
            "{} attempts, last outcome: {}",
            self.settings.max_join_attempts, last_outcome
        )))
    }

    /// Sends an unconfirmed uplink, joining first if needed.
    ///
    /// A failed send drops the link and immediately re-runs the bring-up;
    /// the error is still returned so the caller knows the payload was lost.
    pub fn transmit(&mut self, port: u8, payload_hex: &str) -> Result<ModemEvent> {
        if self.state != LinkState::Joined {
            self.connect();
        }

        match self.modem.send(port, payload_hex) {
            Ok(event) => {
                if !event.is_sent() {
                    warn!(outcome = %event, "uplink not acknowledged by the radio");
                }
                Ok(event)
            }
            Err(e) => {
                warn!(error = %e, "send failed, re-establishing the link");
                self.state = LinkState::Disconnected;
                self.connect();
                Err(e)
            }
        }
    }
}
