use crate::model::fix::Fix;
use crate::model::gateway::{strongest, GatewayRxInfo};
use crate::model::lorawan::{FCnt, Rssi, Snr};
use crate::util::geo::{distance_km, speed_knots};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Link quality between one gateway and one device
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GatewayLink {
    pub rssi: Rssi,
    pub snr: Snr,
    pub distance_m: Option<f64>,
    pub age_secs: u64,
}

/// Latest known state of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub device_id: String,
    /// Last valid fix
    pub last_fix: Option<Fix>,
    pub last_f_cnt: Option<FCnt>,
    pub age_secs: u64,
    pub speed_knots: f64,
    pub rssi: Option<Rssi>,
    pub snr: Option<Snr>,
    pub gateways: BTreeMap<String, GatewayLink>,
}

impl DeviceState {
    fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            last_fix: None,
            last_f_cnt: None,
            age_secs: 0,
            speed_knots: 0.0,
            rssi: None,
            snr: None,
            gateways: BTreeMap::new(),
        }
    }

    fn record_gateways(&mut self, rx_info: &[GatewayRxInfo]) {
        if let Some(best) = strongest(rx_info) {
            self.rssi = Some(best.rssi);
            self.snr = Some(best.snr);
        }
        for rx in rx_info {
            let link = self.gateways.entry(rx.gateway_id.to_string()).or_default();
            link.rssi = rx.rssi;
            link.snr = rx.snr;
            link.age_secs = 0;
        }
    }

    fn record_fix(&mut self, fix: &mut Fix, rx_info: &[GatewayRxInfo]) {
        if fix.valid {
            for rx in rx_info {
                if let Some(loc) = rx.location {
                    let km = distance_km(fix.latitude, fix.longitude, loc.latitude, loc.longitude);
                    if let Some(link) = self.gateways.get_mut(rx.gateway_id.as_str()) {
                        link.distance_m = Some(km * 1000.0);
                    }
                }
            }

            if let Some(prev) = self.last_fix.as_ref() {
                match speed_knots(prev, fix) {
                    Some(knots) => self.speed_knots = knots,
                    None => warn!(
                        device_id = self.device_id.as_str(),
                        timestamp = fix.timestamp,
                        "position changed with no elapsed time, keeping previous speed"
                    ),
                }
            }
        }

        if fix.motion {
            fix.speed_knots = self.speed_knots;
        }
        if fix.valid {
            self.last_fix = Some(fix.clone());
        }
    }
}

/// What [`DeviceStateStore::apply`] did with an uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    FirstSeen,
    Updated,
    Duplicate,
}

/// Per-device state shared by request handlers and the aging ticker
pub struct DeviceStateStore {
    devices: Mutex<HashMap<String, DeviceState>>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one uplink's fixes in a single critical section.
    ///
    /// A frame counter equal to the last one seen for the device is a
    /// duplicate delivery: state is left untouched and motion fixes only
    /// receive the stored speed.
    pub fn apply(
        &self,
        device_id: &str,
        f_cnt: FCnt,
        rx_info: &[GatewayRxInfo],
        fixes: &mut [Fix],
    ) -> ApplyOutcome {
        let mut devices = self.devices.lock();

        let first_seen = !devices.contains_key(device_id);
        let state = devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceState::new(device_id));

        if state.last_f_cnt == Some(f_cnt) {
            for fix in fixes.iter_mut().filter(|f| f.motion) {
                fix.speed_knots = state.speed_knots;
            }
            debug!(device_id, f_cnt, "duplicate uplink, state unchanged");
            return ApplyOutcome::Duplicate;
        }

        state.last_f_cnt = Some(f_cnt);
        state.age_secs = 0;

        if rx_info.is_empty() {
            warn!(device_id, f_cnt, "uplink carries no gateway receive info");
        }
        state.record_gateways(rx_info);

        for fix in fixes.iter_mut() {
            if !fix.valid {
                debug!(device_id, f_cnt, "invalid fix, last known position kept");
            }
            state.record_fix(fix, rx_info);
        }

        if first_seen {
            info!(device_id, "new device");
            ApplyOutcome::FirstSeen
        } else {
            ApplyOutcome::Updated
        }
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceState> {
        self.devices.lock().get(device_id).cloned()
    }

    /// Snapshot of every device, sorted by id
    pub fn list(&self) -> Vec<DeviceState> {
        let mut states: Vec<DeviceState> = self.devices.lock().values().cloned().collect();
        states.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        states
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Advances every age counter by one tick.
    pub fn tick(&self) {
        let mut devices = self.devices.lock();
        for state in devices.values_mut() {
            state.age_secs += 1;
            for link in state.gateways.values_mut() {
                link.age_secs += 1;
            }
        }
    }

    /// Spawns the background aging ticker
    pub fn start_aging(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting device aging ticker (period: {:?})", period);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                self.tick();
            }
        })
    }
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}
