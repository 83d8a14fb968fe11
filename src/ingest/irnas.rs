use super::common::{coordinates, copy_attributes, LATITUDE_FIELDS, LONGITUDE_FIELDS};
use crate::error::Result;
use crate::model::fix::Fix;
use crate::model::object::PayloadObject;
use crate::model::uplink::Uplink;

/// Ports carrying positions: 1 periodic fix, 11 location log, 12 status.
pub const GPS_PORTS: &[u8] = &[1, 11, 12];

/// `gps_resend` value reported when the position comes from a fresh lock.
pub const RESEND_FRESH_SENTINEL: i64 = 0;

const TIME_FIELDS: &[&str] = &["gps_time", "time"];

/// IRNAS wildlife collar, decoded by the network-server codec.
pub fn decode(uplink: &Uplink, received_at: i64) -> Result<Vec<Fix>> {
    if !GPS_PORTS.contains(&uplink.f_port) {
        tracing::debug!(f_port = uplink.f_port, "irnas uplink on a non-GPS port");
        return Ok(vec![Fix::unfixed(received_at)]);
    }

    let object = uplink.require_object("irnas")?;
    match object.list("locations")? {
        Some(locations) => locations
            .iter()
            .map(|location| decode_single(location, received_at))
            .collect(),
        None => Ok(vec![decode_single(object, received_at)?]),
    }
}

fn decode_single(object: &PayloadObject, received_at: i64) -> Result<Fix> {
    let (lat, lon) = coordinates(object, LATITUDE_FIELDS, LONGITUDE_FIELDS)?;
    let timestamp = object
        .timestamp(TIME_FIELDS)?
        .filter(|t| *t > 0)
        .unwrap_or(received_at);

    let mut fix = Fix::at(lat, lon, timestamp);
    fix.hdop = object.number(&["hdop"])?.unwrap_or(0.0);
    copy_attributes(&mut fix, object, &[("battery", "battery"), ("temperature", "temperature")]);

    if let Some(motion) = object.integer(&["motion"])? {
        fix.motion = motion > 0;
        fix.attributes.insert("motion".to_string(), motion.to_string());
    }

    if let Some(resend) = object.integer(&["gps_resend"])? {
        fix.attributes.insert("resend".to_string(), resend.to_string());
        if resend != RESEND_FRESH_SENTINEL {
            fix.valid = false;
        }
    }

    Ok(fix)
}
