use crate::config::PipelineConfig;
use crate::error::Result;
use crate::gps::acquisition::GpsFix;
use crate::model::fix::ATTR_SINGLE_POINT;
use crate::modem::rak811::{LoraModem, ModemEvent};
use crate::modem::supervisor::JoinSupervisor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// LoRaWAN port the receiver's `rpi` decoder listens on
pub const UPLINK_PORT: u8 = 1;

/// Supplier of GPS fixes that can be hard-reset
pub trait FixSource {
    /// Next fix, or `None` once the source has stopped.
    fn next_fix(&mut self) -> Option<GpsFix>;
    /// Power-cycles the receiver and restarts acquisition.
    fn reset(&mut self) -> Result<()>;
}

/// Text payload `"<lat>,<lon>[,s]"` with six decimals.
pub fn encode_fix(latitude: f64, longitude: f64, single_point: bool) -> String {
    let mut payload = format!("{:.6},{:.6}", latitude, longitude);
    if single_point {
        payload.push(',');
        payload.push_str(ATTR_SINGLE_POINT);
    }
    payload
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Sent(ModemEvent),
    /// No lock and no substitute position
    Skipped,
    SendFailed,
    SourceClosed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub sent: u64,
    pub send_failures: u64,
    pub invalid: u64,
    pub gps_resets: u64,
}

pub struct SenderPipeline<M: LoraModem, S: FixSource> {
    supervisor: JoinSupervisor<M>,
    source: S,
    config: PipelineConfig,
    invalid_streak: u32,
    stats: PipelineStats,
}

impl<M: LoraModem, S: FixSource> SenderPipeline<M, S> {
    pub fn new(supervisor: JoinSupervisor<M>, source: S, config: PipelineConfig) -> Self {
        Self {
            supervisor,
            source,
            config,
            invalid_streak: 0,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn supervisor(&self) -> &JoinSupervisor<M> {
        &self.supervisor
    }

    /// Handles one fix from the source.
    pub fn step(&mut self) -> StepOutcome {
        let Some(fix) = self.source.next_fix() else {
            return StepOutcome::SourceClosed;
        };

        let (latitude, longitude) = if fix.valid {
            self.invalid_streak = 0;
            (fix.latitude, fix.longitude)
        } else {
            self.note_invalid();
            match self.config.fake_fix {
                Some(position) => position,
                None => return StepOutcome::Skipped,
            }
        };

        let payload = encode_fix(latitude, longitude, self.config.single_points);
        debug!(payload = payload.as_str(), "sending position");

        match self.supervisor.transmit(UPLINK_PORT, &hex::encode(payload.as_bytes())) {
            Ok(event) => {
                self.stats.sent += 1;
                match self.supervisor.modem_mut().signal() {
                    Ok(signal) => info!(outcome = %event, signal = signal.as_str(), "position sent"),
                    Err(e) => info!(outcome = %event, error = %e, "position sent, signal unavailable"),
                }
                if let Some(interval) = self.config.send_interval {
                    thread::sleep(interval);
                }
                StepOutcome::Sent(event)
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!(error = %e, "position dropped");
                StepOutcome::SendFailed
            }
        }
    }

    fn note_invalid(&mut self) {
        self.invalid_streak += 1;
        self.stats.invalid += 1;
        debug!(streak = self.invalid_streak, "no GPS lock");

        if self.invalid_streak > self.config.invalid_reset_threshold {
            warn!(streak = self.invalid_streak, "GPS stuck without a fix, power cycling");
            self.invalid_streak = 0;
            self.stats.gps_resets += 1;
            if let Err(e) = self.source.reset() {
                error!(error = %e, "GPS reset failed");
            }
        }
    }

    /// Joins, then sends fixes until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        self.supervisor.connect();

        while !stop.load(Ordering::Relaxed) {
            if self.step() == StepOutcome::SourceClosed {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                warn!("GPS acquisition ended, restarting it");
                self.stats.gps_resets += 1;
                if let Err(e) = self.source.reset() {
                    error!(error = %e, "GPS restart failed");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }

        info!(
            sent = self.stats.sent,
            failures = self.stats.send_failures,
            "sender pipeline stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::ingest::rpi::parse_coordinates;
    use crate::modem::supervisor::tests::{settings, FakeModem};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedSource {
        fixes: VecDeque<GpsFix>,
        resets: usize,
    }

    impl FixSource for ScriptedSource {
        fn next_fix(&mut self) -> Option<GpsFix> {
            self.fixes.pop_front()
        }

        fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            Ok(())
        }
    }

    fn fix(latitude: f64, longitude: f64) -> GpsFix {
        GpsFix {
            latitude,
            longitude,
            hdop: Some(1.0),
            valid: true,
            timestamp: 0,
        }
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            send_interval: None,
            single_points: false,
            fake_fix: None,
            invalid_reset_threshold: 3,
        }
    }

    fn pipeline(
        fixes: Vec<GpsFix>,
        config: PipelineConfig,
    ) -> SenderPipeline<FakeModem, ScriptedSource> {
        let supervisor = JoinSupervisor::new(FakeModem::default(), settings(3));
        let source = ScriptedSource {
            fixes: fixes.into(),
            resets: 0,
        };
        SenderPipeline::new(supervisor, source, config)
    }

    fn sent_text(pipeline: &mut SenderPipeline<FakeModem, ScriptedSource>) -> Vec<String> {
        pipeline
            .supervisor
            .modem_mut()
            .payloads
            .iter()
            .map(|(_, hex)| String::from_utf8(hex::decode(hex).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_six_decimals() {
        assert_eq!(encode_fix(42.6951, 23.3604, false), "42.695100,23.360400");
        assert_eq!(encode_fix(-33.8688, 151.2093, true), "-33.868800,151.209300,s");
    }

    #[test]
    fn test_encoded_fix_decodes_on_receiver() {
        let (lat, lon, single) = parse_coordinates(&encode_fix(48.858370, 2.294481, true)).unwrap();
        assert!((lat - 48.858370).abs() < 1e-9);
        assert!((lon - 2.294481).abs() < 1e-9);
        assert!(single);
    }

    #[test]
    fn test_valid_fix_is_sent_on_port_one() {
        let mut pipeline = pipeline(vec![fix(42.6951, 23.3604)], pipeline_config());

        assert_eq!(pipeline.step(), StepOutcome::Sent(ModemEvent::TxUnconfirmed));
        assert_eq!(sent_text(&mut pipeline), vec!["42.695100,23.360400"]);
        assert_eq!(pipeline.supervisor.modem_mut().payloads[0].0, UPLINK_PORT);
        assert_eq!(pipeline.stats().sent, 1);
    }

    #[test]
    fn test_invalid_fix_skipped_without_fake() {
        let mut pipeline = pipeline(vec![GpsFix::invalid()], pipeline_config());

        assert_eq!(pipeline.step(), StepOutcome::Skipped);
        assert!(pipeline.supervisor.modem_mut().payloads.is_empty());
        assert_eq!(pipeline.stats().invalid, 1);
    }

    #[test]
    fn test_fake_fix_substitutes_for_invalid() {
        let config = PipelineConfig {
            fake_fix: Some((10.5, -20.25)),
            single_points: true,
            ..pipeline_config()
        };
        let mut pipeline = pipeline(vec![GpsFix::invalid()], config);

        assert!(matches!(pipeline.step(), StepOutcome::Sent(_)));
        assert_eq!(sent_text(&mut pipeline), vec!["10.500000,-20.250000,s"]);
    }

    #[test]
    fn test_invalid_streak_resets_gps_once() {
        let mut fixes = vec![GpsFix::invalid(); 4];
        fixes.push(fix(1.0, 1.0));
        fixes.extend(vec![GpsFix::invalid(); 3]);
        let mut pipeline = pipeline(fixes, pipeline_config());

        while pipeline.step() != StepOutcome::SourceClosed {}

        assert_eq!(pipeline.source.resets, 1);
        assert_eq!(pipeline.stats().gps_resets, 1);
        assert_eq!(pipeline.stats().invalid, 7);
    }

    #[test]
    fn test_send_failure_counted() {
        let mut pipeline = pipeline(vec![fix(1.0, 2.0)], pipeline_config());
        pipeline
            .supervisor
            .modem_mut()
            .sends
            .push_back(Err(TrackerError::ModemTimeout));

        assert_eq!(pipeline.step(), StepOutcome::SendFailed);
        assert_eq!(pipeline.stats().send_failures, 1);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut pipeline = pipeline(vec![fix(1.0, 2.0)], pipeline_config());
        let stop = AtomicBool::new(true);

        pipeline.run(&stop);
        assert!(pipeline.supervisor.modem_mut().payloads.is_empty());
        assert_eq!(pipeline.supervisor().state(), crate::modem::supervisor::LinkState::Joined);
    }
}
