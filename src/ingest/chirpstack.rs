use super::common::{validate_payload_size, MAX_UPLINK_PAYLOAD_SIZE};
use crate::error::{Result, TrackerError};
use crate::model::fix::is_null_island;
use crate::model::gateway::{GatewayLocation, GatewayRxInfo};
use crate::model::lorawan::*;
use crate::model::object::PayloadObject;
use crate::model::uplink::Uplink;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;

/// Parser for ChirpStack HTTP integration uplink events
pub struct ChirpStackParser;

impl ChirpStackParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChirpStackParser {
    fn default() -> Self {
        Self::new()
    }
}

/// ChirpStack uplink event format (v3 flat layout, v4 `deviceInfo` accepted)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackUplink {
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default, rename = "devEUI", alias = "devEui")]
    dev_eui: Option<String>,
    #[serde(default)]
    device_info: Option<ChirpStackDeviceInfo>,
    #[serde(default)]
    f_cnt: Option<u32>,
    #[serde(default)]
    f_port: Option<u8>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    object: Option<serde_json::Value>,
    #[serde(default)]
    rx_info: Vec<ChirpStackRxInfo>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackDeviceInfo {
    #[serde(default)]
    dev_eui: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChirpStackRxInfo {
    #[serde(default, rename = "gatewayID", alias = "gatewayId")]
    gateway_id: Option<String>,
    #[serde(default)]
    rssi: Option<i32>,
    #[serde(default, rename = "loRaSNR", alias = "snr")]
    lora_snr: Option<f64>,
    #[serde(default)]
    location: Option<ChirpStackLocation>,
}

#[derive(Debug, Deserialize)]
struct ChirpStackLocation {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl ChirpStackParser {
    /// Parse an uplink event body into a normalized [`Uplink`]
    pub fn parse_uplink(&self, payload: &[u8]) -> Result<Uplink> {
        validate_payload_size(payload, MAX_UPLINK_PAYLOAD_SIZE)?;

        let msg: ChirpStackUplink = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!("ChirpStack uplink JSON parse error: {}", e);
            TrackerError::Decode(format!("Failed to parse ChirpStack uplink JSON: {}", e))
        })?;

        let (info_eui, info_name, info_tags) = match msg.device_info {
            Some(info) => (info.dev_eui, info.device_name, info.tags),
            None => (None, None, HashMap::new()),
        };

        let dev_eui = msg
            .dev_eui
            .or(info_eui)
            .ok_or_else(|| TrackerError::Decode("uplink has no devEUI".to_string()))?;
        let dev_eui = DevEui::new(dev_eui)?;

        let mut tags = info_tags;
        tags.extend(msg.tags);

        let data = match msg.data.as_deref() {
            None | Some("") => Vec::new(),
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| TrackerError::Decode(format!("data is not valid base64: {}", e)))?,
        };

        let time = match msg.time.as_deref() {
            None | Some("") => None,
            Some(t) => Some(
                chrono::DateTime::parse_from_rfc3339(t)
                    .map_err(|e| TrackerError::Decode(format!("invalid time {}: {}", t, e)))?
                    .timestamp(),
            ),
        };

        let f_port = msg.f_port.unwrap_or(0);
        if f_port == 0 || f_port > 223 {
            tracing::warn!(
                dev_eui = dev_eui.as_str(),
                f_port = f_port,
                "Invalid f_port value (must be 1-223 for application data)"
            );
        }

        Ok(Uplink {
            device_name: msg.device_name.or(info_name).unwrap_or_default(),
            dev_eui,
            f_cnt: msg.f_cnt.unwrap_or(0),
            f_port,
            data,
            object: msg.object.map(PayloadObject::from_json),
            rx_info: msg
                .rx_info
                .into_iter()
                .map(|rx| GatewayRxInfo {
                    gateway_id: GatewayEui::new(
                        rx.gateway_id.unwrap_or_else(|| "unknown".to_string()),
                    ),
                    rssi: rx.rssi.unwrap_or(0),
                    snr: rx.lora_snr.unwrap_or(0.0),
                    location: rx.location.and_then(|loc| match (loc.latitude, loc.longitude) {
                        // Gateways without GPS report an all-zero location
                        (Some(lat), Some(lng)) if !is_null_island(lat, lng) => {
                            Some(GatewayLocation {
                                latitude: lat,
                                longitude: lng,
                            })
                        }
                        _ => None,
                    }),
                })
                .collect(),
            tags,
            time,
        })
    }
}
