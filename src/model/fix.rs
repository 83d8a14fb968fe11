use super::lorawan::{Rssi, Snr};
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute key marking a single-point report
pub const ATTR_SINGLE_POINT: &str = "s";

/// Canonical decoded position report
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Fix {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
    pub valid: bool,
    pub motion: bool,
    pub hdop: f64,
    pub attributes: BTreeMap<String, String>,
    pub rssi: Option<Rssi>,
    pub snr: Option<Snr>,
    pub speed_knots: f64,
}

impl Fix {
    /// A fix carrying no usable position, still recorded for bookkeeping.
    pub fn unfixed(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// A fix at the given position; `(0,0)` is the receiver-not-fixed sentinel.
    pub fn at(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            valid: !is_null_island(latitude, longitude),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

pub fn is_null_island(latitude: f64, longitude: f64) -> bool {
    latitude == 0.0 && longitude == 0.0
}
