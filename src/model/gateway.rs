use super::lorawan::{GatewayEui, Rssi, Snr};
use serde::{Deserialize, Serialize};

/// One gateway's reception of an uplink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRxInfo {
    pub gateway_id: GatewayEui,
    pub rssi: Rssi,
    pub snr: Snr,
    pub location: Option<GatewayLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatewayLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Picks the entry with the highest SNR. Ties keep the first one seen.
pub fn strongest(rx_info: &[GatewayRxInfo]) -> Option<&GatewayRxInfo> {
    rx_info.iter().fold(None, |best: Option<&GatewayRxInfo>, rx| match best {
        Some(b) if rx.snr <= b.snr => Some(b),
        _ => Some(rx),
    })
}
