use super::common::{decode_port_layout, PortLayout};
use crate::error::Result;
use crate::model::fix::Fix;
use crate::model::uplink::Uplink;

pub const LAYOUT: PortLayout = PortLayout {
    vendor: "antratek",
    gps_port: 136,
    latitude: "positionLatitude",
    longitude: "positionLongitude",
    attributes: &[("battery", "battery"), ("temperature", "temperature")],
};

pub fn decode(uplink: &Uplink, received_at: i64) -> Result<Vec<Fix>> {
    decode_port_layout(uplink, received_at, &LAYOUT)
}
