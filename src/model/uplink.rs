use super::gateway::GatewayRxInfo;
use super::lorawan::{device_id, DevEui, FCnt, FPort};
use super::object::PayloadObject;
use crate::error::{Result, TrackerError};
use std::collections::HashMap;

/// Tag selecting the payload decoder
pub const DEVICE_TYPE_TAG: &str = "type";

/// Normalized network-server uplink event
#[derive(Debug, Clone)]
pub struct Uplink {
    pub device_name: String,
    pub dev_eui: DevEui,
    pub f_cnt: FCnt,
    pub f_port: FPort,
    pub data: Vec<u8>,
    pub object: Option<PayloadObject>,
    pub rx_info: Vec<GatewayRxInfo>,
    pub tags: HashMap<String, String>,
    /// Network-server receive time, unix seconds
    pub time: Option<i64>,
}

impl Uplink {
    pub fn device_id(&self) -> String {
        device_id(&self.device_name, &self.dev_eui)
    }

    pub fn device_type(&self) -> Result<&str> {
        self.tags
            .get(DEVICE_TYPE_TAG)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                TrackerError::Decode("uplink is missing the tags.type device type".to_string())
            })
    }

    /// Decoded object, or a decode error naming the decoder that needed it.
    pub fn require_object(&self, decoder: &str) -> Result<&PayloadObject> {
        self.object.as_ref().ok_or_else(|| {
            TrackerError::Decode(format!("{} uplink has no decoded object", decoder))
        })
    }
}
