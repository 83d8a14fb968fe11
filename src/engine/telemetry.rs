use super::store::{ApplyOutcome, DeviceStateStore};
use crate::error::Result;
use crate::ingest::chirpstack::ChirpStackParser;
use crate::ingest::decoder;
use crate::model::fix::Fix;
use crate::model::gateway::strongest;
use crate::model::uplink::Uplink;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Result of ingesting one uplink
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub device_id: String,
    pub duplicate: bool,
    pub first_seen: bool,
    pub fixes: Vec<Fix>,
}

/// Decode, dedup and derive distance/speed for inbound uplinks
pub struct TelemetryEngine {
    parser: ChirpStackParser,
    store: Arc<DeviceStateStore>,
}

impl TelemetryEngine {
    pub fn new(store: Arc<DeviceStateStore>) -> Self {
        Self {
            parser: ChirpStackParser::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<DeviceStateStore> {
        &self.store
    }

    /// Parses a webhook body and ingests it
    pub fn ingest_json(&self, body: &[u8]) -> Result<IngestOutcome> {
        let uplink = self.parser.parse_uplink(body)?;
        self.ingest(&uplink)
    }

    pub fn ingest(&self, uplink: &Uplink) -> Result<IngestOutcome> {
        self.ingest_at(uplink, Utc::now().timestamp())
    }

    /// Ingests with an explicit receive time for fixes lacking a device timestamp
    pub fn ingest_at(&self, uplink: &Uplink, received_at: i64) -> Result<IngestOutcome> {
        let mut fixes = decoder::decode(uplink, received_at)?;
        let device_id = uplink.device_id();

        if let Some(best) = strongest(&uplink.rx_info) {
            for fix in &mut fixes {
                fix.rssi = Some(best.rssi);
                fix.snr = Some(best.snr);
            }
        }

        let outcome = self
            .store
            .apply(&device_id, uplink.f_cnt, &uplink.rx_info, &mut fixes);

        tracing::info!(
            device_id = device_id.as_str(),
            f_cnt = uplink.f_cnt,
            fixes = fixes.len(),
            valid = fixes.iter().filter(|f| f.valid).count(),
            duplicate = outcome == ApplyOutcome::Duplicate,
            "uplink ingested"
        );

        Ok(IngestOutcome {
            device_id,
            duplicate: outcome == ApplyOutcome::Duplicate,
            first_seen: outcome == ApplyOutcome::FirstSeen,
            fixes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;

    fn rpi_uplink(f_cnt: u32, data_b64: &str) -> String {
        format!(
            r#"{{
                "deviceName": "pi",
                "devEUI": "0011223344556677",
                "fCnt": {},
                "fPort": 1,
                "data": "{}",
                "rxInfo": [
                    {{"gatewayID": "gw-a", "rssi": -60, "loRaSNR": 4.0,
                      "location": {{"latitude": 42.70, "longitude": 23.33}}}},
                    {{"gatewayID": "gw-b", "rssi": -95, "loRaSNR": 9.0}}
                ],
                "tags": {{"type": "rpi"}}
            }}"#,
            f_cnt, data_b64
        )
    }

    // base64("42.6951,23.3604")
    const SCENARIO_DATA: &str = "NDIuNjk1MSwyMy4zNjA0";

    #[test]
    fn test_rpi_scenario_and_duplicate() {
        let engine = TelemetryEngine::new(Arc::new(DeviceStateStore::new()));

        let first = engine
            .ingest_json(rpi_uplink(5, SCENARIO_DATA).as_bytes())
            .unwrap();
        assert!(first.first_seen);
        assert!(!first.duplicate);
        let fix = &first.fixes[0];
        assert_eq!(fix.latitude, 42.6951);
        assert_eq!(fix.longitude, 23.3604);
        assert!(fix.valid);
        assert!(fix.motion);
        assert_eq!(fix.rssi, Some(-95));
        assert_eq!(fix.snr, Some(9.0));

        let stored = engine.store().get(&first.device_id).unwrap();

        let second = engine
            .ingest_json(rpi_uplink(5, SCENARIO_DATA).as_bytes())
            .unwrap();
        assert!(second.duplicate);
        assert_eq!(second.fixes[0].latitude, 42.6951);
        assert_eq!(engine.store().get(&first.device_id).unwrap(), stored);
    }

    #[test]
    fn test_gateway_distance_recorded() {
        let engine = TelemetryEngine::new(Arc::new(DeviceStateStore::new()));
        let outcome = engine
            .ingest_json(rpi_uplink(1, SCENARIO_DATA).as_bytes())
            .unwrap();

        let state = engine.store().get(&outcome.device_id).unwrap();
        assert!(state.gateways["gw-a"].distance_m.unwrap() > 0.0);
        assert_eq!(state.gateways["gw-b"].distance_m, None);
    }

    #[test]
    fn test_decode_error_leaves_store_empty() {
        let engine = TelemetryEngine::new(Arc::new(DeviceStateStore::new()));
        let body = r#"{"deviceName": "pi", "devEUI": "0011223344556677", "fCnt": 1, "data": "NDIuNjk1MSwyMy4zNjA0"}"#;
        let result = engine.ingest_json(body.as_bytes());
        assert!(matches!(result, Err(TrackerError::Decode(_))));
        assert_eq!(engine.store().device_count(), 0);
    }
}
