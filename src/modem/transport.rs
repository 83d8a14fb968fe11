use crate::error::{Result, TrackerError};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Back-off when the port reports end of stream
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Timing rules for the AT command channel
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// Bound on collecting a whole multi-line reply
    pub global_timeout: Duration,
    /// Pause after every command before the next one may be issued
    pub settle_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            global_timeout: Duration::from_secs(600),
            settle_delay: Duration::from_millis(100),
        }
    }
}

/// Line-oriented AT command framing over a serial byte stream.
///
/// Per-read timeouts from the port are retried; only the global timeout
/// ends a collection, with [`TrackerError::ModemTimeout`].
pub struct ModemTransport<P: Read + Write> {
    port: BufReader<P>,
    pending: Vec<u8>,
    settings: TransportSettings,
}

impl<P: Read + Write> ModemTransport<P> {
    pub fn new(port: P, settings: TransportSettings) -> Self {
        Self {
            port: BufReader::new(port),
            pending: Vec::new(),
            settings,
        }
    }

    pub fn port(&self) -> &P {
        self.port.get_ref()
    }

    /// Writes `at+<command>` and collects `expected_lines` reply lines.
    pub fn execute(&mut self, command: &str, expected_lines: usize) -> Result<String> {
        debug!(command, expected_lines, "modem command");

        let frame = format!("at+{}\r\n", command);
        let port = self.port.get_mut();
        let result = match port.write_all(frame.as_bytes()).and_then(|_| port.flush()) {
            Ok(()) => self.collect(expected_lines),
            Err(e) => Err(TrackerError::Serial(format!(
                "failed to write command {:?}: {}",
                command, e
            ))),
        };

        thread::sleep(self.settings.settle_delay);
        result
    }

    /// Collects reply lines without sending anything (unsolicited output).
    pub fn collect(&mut self, expected_lines: usize) -> Result<String> {
        let started = Instant::now();
        let mut response = String::new();

        for _ in 0..expected_lines {
            let line = self.read_line(started)?;
            trace!(line = line.trim_end(), "modem line");

            if let Some(rest) = line.trim_start().strip_prefix("ERROR") {
                return Err(TrackerError::ModemCommand(rest.trim().to_string()));
            }
            response.push_str(&line);
        }

        Ok(response.trim().to_string())
    }

    fn read_line(&mut self, started: Instant) -> Result<String> {
        loop {
            match self.port.read_until(b'\n', &mut self.pending) {
                Ok(_) if self.pending.last() == Some(&b'\n') => {
                    let line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(line);
                }
                // End of stream or a partial line; the rest may still arrive
                Ok(_) => thread::sleep(IDLE_POLL),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }

            if started.elapsed() > self.settings.global_timeout {
                return Err(TrackerError::ModemTimeout);
            }
        }
    }
}
