use super::pmtk::{self, frame_command, parse_ack};
use crate::config::GpsConfig;
use crate::error::{Result, TrackerError};
use crate::hw::{select_port, UsbPowerRail};
use crate::sender::FixSource;
use nmea::sentences::FixType;
use nmea::ParseResult;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lines searched for a PMTK acknowledgement
const ACK_WINDOW: usize = 20;

/// Polls of the candidate device files before giving up
const PORT_SELECT_ATTEMPTS: u32 = 10;

/// A position report from the receiver. `valid` is false when it had no lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub hdop: Option<f64>,
    pub valid: bool,
    pub timestamp: i64,
}

impl GpsFix {
    pub fn invalid() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            hdop: None,
            valid: false,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    pub fix_interval_ms: u32,
    pub hdop_threshold: Option<f64>,
    /// Pause before retrying a failed setup
    pub retry_delay: Duration,
}

impl From<&GpsConfig> for ReceiverSettings {
    fn from(config: &GpsConfig) -> Self {
        Self {
            fix_interval_ms: config.fix_interval_ms,
            hdop_threshold: config.hdop_threshold,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// NMEA receiver speaking MTK `PMTK` commands over a serial port
pub struct GpsReceiver<P: Read + Write> {
    port: BufReader<P>,
    pending: Vec<u8>,
    settings: ReceiverSettings,
}

impl<P: Read + Write> GpsReceiver<P> {
    pub fn new(port: P, settings: ReceiverSettings) -> Self {
        Self {
            port: BufReader::new(port),
            pending: Vec::new(),
            settings,
        }
    }

    pub fn port(&self) -> &P {
        self.port.get_ref()
    }

    /// Restricts output to GGA and sets the fix interval. Both must be acked.
    pub fn setup(&mut self) -> Result<()> {
        // The first line after opening is usually a fragment
        self.read_line()?;

        self.command(&pmtk::gga_only_output(), pmtk::SET_NMEA_OUTPUT)?;
        self.command(
            &pmtk::fix_interval(self.settings.fix_interval_ms),
            pmtk::SET_FIX_INTERVAL,
        )?;
        Ok(())
    }

    fn command(&mut self, body: &str, command: u16) -> Result<()> {
        debug!(body, "sending PMTK command");
        let port = self.port.get_mut();
        port.write_all(frame_command(body).as_bytes())?;
        port.flush()?;

        for _ in 0..ACK_WINDOW {
            let Some(line) = self.read_line()? else {
                continue;
            };
            match parse_ack(&line) {
                Some(ack) if ack.command == command && ack.succeeded() => return Ok(()),
                Some(ack) if ack.command == command => {
                    warn!(command, flag = ack.flag, "PMTK command rejected");
                    return Err(TrackerError::GpsAck(command));
                }
                _ => {}
            }
        }
        Err(TrackerError::GpsAck(command))
    }

    /// One line from the port, `None` when the read timed out first.
    fn read_line(&mut self) -> Result<Option<String>> {
        match self.port.read_until(b'\n', &mut self.pending) {
            Ok(0) => Err(TrackerError::Serial("GPS port closed".to_string())),
            Ok(_) if self.pending.last() == Some(&b'\n') => {
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                Ok(Some(line))
            }
            Ok(_) => Ok(None),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads one line and returns a fix if it was a GGA sentence.
    pub fn read_fix(&mut self) -> Result<Option<GpsFix>> {
        let Some(line) = self.read_line()? else {
            return Ok(None);
        };
        let sentence = line.trim();
        if !sentence.starts_with('$') {
            return Ok(None);
        }

        match nmea::parse_str(sentence) {
            Ok(ParseResult::GGA(gga)) => {
                let timestamp = chrono::Utc::now().timestamp();
                let locked = !matches!(gga.fix_type, None | Some(FixType::Invalid));
                match (locked, gga.latitude, gga.longitude) {
                    (true, Some(latitude), Some(longitude)) => Ok(Some(GpsFix {
                        latitude,
                        longitude,
                        hdop: gga.hdop.map(f64::from),
                        valid: true,
                        timestamp,
                    })),
                    _ => Ok(Some(GpsFix {
                        timestamp,
                        ..GpsFix::invalid()
                    })),
                }
            }
            Ok(_) => Ok(None),
            Err(e) => {
                debug!(sentence, error = ?e, "unparseable NMEA sentence");
                Ok(None)
            }
        }
    }

    fn passes_hdop(&self, fix: &GpsFix) -> bool {
        match (self.settings.hdop_threshold, fix.hdop) {
            (Some(threshold), Some(hdop)) if fix.valid => hdop <= threshold,
            _ => true,
        }
    }

    /// Streams fixes until `stop` is set or the consumer goes away.
    ///
    /// Read errors trigger a resync (setup again). A failed setup publishes an
    /// invalid fix so the consumer's no-fix accounting keeps moving.
    pub fn run(&mut self, fixes: &FixPublisher, stop: &AtomicBool) {
        let mut configured = false;

        while !stop.load(Ordering::Relaxed) {
            if !configured {
                match self.setup() {
                    Ok(()) => {
                        info!("GPS configured for GGA output");
                        configured = true;
                    }
                    Err(e) => {
                        warn!(error = %e, "GPS setup failed");
                        if !fixes.publish(GpsFix::invalid()) {
                            return;
                        }
                        thread::sleep(self.settings.retry_delay);
                    }
                }
                continue;
            }

            match self.read_fix() {
                Ok(Some(fix)) if self.passes_hdop(&fix) => {
                    if !fixes.publish(fix) {
                        return;
                    }
                }
                Ok(Some(fix)) => {
                    debug!(hdop = ?fix.hdop, "fix rejected by HDOP gate");
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "GPS read failed, resyncing");
                    configured = false;
                }
            }
        }
    }
}

#[derive(Default)]
struct Slot {
    fix: Option<GpsFix>,
    publisher_gone: bool,
    receiver_gone: bool,
}

#[derive(Default)]
struct Mailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Producer half of the fix hand-off
pub struct FixPublisher {
    mailbox: Arc<Mailbox>,
}

/// Consumer half of the fix hand-off
pub struct FixReceiver {
    mailbox: Arc<Mailbox>,
}

/// Single-slot hand-off: an unread fix is overwritten by the next one, so a
/// busy consumer always gets the newest position.
pub fn fix_channel() -> (FixPublisher, FixReceiver) {
    let mailbox = Arc::new(Mailbox::default());
    (
        FixPublisher {
            mailbox: mailbox.clone(),
        },
        FixReceiver { mailbox },
    )
}

impl FixPublisher {
    /// Stores `fix`, replacing any unread one. False once the receiver is gone.
    pub fn publish(&self, fix: GpsFix) -> bool {
        let mut slot = self.mailbox.slot.lock();
        if slot.receiver_gone {
            debug!("fix consumer gone, stopping acquisition");
            return false;
        }
        if slot.fix.replace(fix).is_some() {
            debug!("consumer busy, replacing unread fix");
        }
        self.mailbox.ready.notify_one();
        true
    }
}

impl Drop for FixPublisher {
    fn drop(&mut self) {
        self.mailbox.slot.lock().publisher_gone = true;
        self.mailbox.ready.notify_all();
    }
}

impl FixReceiver {
    /// Blocks for the next fix. `None` once the publisher is gone and the slot is empty.
    pub fn recv(&self) -> Option<GpsFix> {
        let mut slot = self.mailbox.slot.lock();
        loop {
            if let Some(fix) = slot.fix.take() {
                return Some(fix);
            }
            if slot.publisher_gone {
                return None;
            }
            self.mailbox.ready.wait(&mut slot);
        }
    }
}

impl Drop for FixReceiver {
    fn drop(&mut self) {
        self.mailbox.slot.lock().receiver_gone = true;
    }
}

/// Handle to a receiver running on its own thread
pub struct GpsAcquisition {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GpsAcquisition {
    /// Starts the acquisition loop on its own thread.
    pub fn spawn<P>(port: P, settings: ReceiverSettings) -> (Self, FixReceiver)
    where
        P: Read + Write + Send + 'static,
    {
        let (publisher, receiver) = fix_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let thread = thread::spawn(move || {
            let mut gps = GpsReceiver::new(port, settings);
            gps.run(&publisher, &flag);
        });

        (
            Self {
                stop,
                thread: Some(thread),
            },
            receiver,
        )
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stops the loop and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("GPS acquisition thread panicked");
            }
        }
    }
}

impl Drop for GpsAcquisition {
    fn drop(&mut self) {
        self.stop();
    }
}

/// USB serial GPS with power-cycle recovery
pub struct SerialFixSource {
    config: GpsConfig,
    rail: UsbPowerRail,
    acquisition: Option<GpsAcquisition>,
    fixes: Option<FixReceiver>,
}

impl SerialFixSource {
    /// Finds the receiver among the configured ports and starts acquisition.
    pub fn start(config: GpsConfig) -> Result<Self> {
        let rail = UsbPowerRail::new(config.usb_power_path.clone());
        let mut source = Self {
            config,
            rail,
            acquisition: None,
            fixes: None,
        };
        source.open()?;
        Ok(source)
    }

    fn open(&mut self) -> Result<()> {
        let path = select_port(
            &self.config.ports,
            &self.rail,
            PORT_SELECT_ATTEMPTS,
            Duration::from_secs(1),
        )?;
        let port = serialport::new(&path, self.config.baud_rate)
            .timeout(Duration::from_secs(1))
            .open()?;
        info!(port = path.as_str(), baud = self.config.baud_rate, "GPS port opened");

        let (acquisition, fixes) = GpsAcquisition::spawn(port, ReceiverSettings::from(&self.config));
        self.acquisition = Some(acquisition);
        self.fixes = Some(fixes);
        Ok(())
    }
}

impl FixSource for SerialFixSource {
    fn next_fix(&mut self) -> Option<GpsFix> {
        self.fixes.as_ref()?.recv()
    }

    fn reset(&mut self) -> Result<()> {
        self.fixes = None;
        if let Some(acquisition) = self.acquisition.take() {
            acquisition.shutdown();
        }
        self.rail.power_cycle()?;
        self.open()
    }
}
