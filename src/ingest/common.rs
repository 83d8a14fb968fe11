use crate::error::{Result, TrackerError};
use crate::model::fix::Fix;
use crate::model::object::PayloadObject;
use crate::model::uplink::Uplink;

pub const MAX_UPLINK_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB

pub const LATITUDE_FIELDS: &[&str] = &["lat", "latitude"];
pub const LONGITUDE_FIELDS: &[&str] = &["lon", "longitude"];

/// Validate payload size to prevent DoS attacks
pub fn validate_payload_size(payload: &[u8], max_size: usize) -> Result<()> {
    if payload.len() > max_size {
        return Err(TrackerError::Validation(format!(
            "Payload too large: {} bytes (max: {})",
            payload.len(),
            max_size
        )));
    }
    Ok(())
}

/// Reject coordinates outside the WGS84 range.
pub fn validate_range(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(TrackerError::Validation(format!(
            "latitude {} outside [-90, 90]",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(TrackerError::Validation(format!(
            "longitude {} outside [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

/// Required in-range latitude/longitude pair under the given field names.
pub fn coordinates(
    object: &PayloadObject,
    lat_fields: &[&str],
    lon_fields: &[&str],
) -> Result<(f64, f64)> {
    let lat = object
        .number(lat_fields)?
        .ok_or_else(|| TrackerError::Decode(format!("missing latitude ({})", lat_fields.join("/"))))?;
    let lon = object
        .number(lon_fields)?
        .ok_or_else(|| TrackerError::Decode(format!("missing longitude ({})", lon_fields.join("/"))))?;
    validate_range(lat, lon)?;
    Ok((lat, lon))
}

/// Copies present optional fields into the fix attributes, renamed to `key`.
pub fn copy_attributes(fix: &mut Fix, object: &PayloadObject, fields: &[(&str, &str)]) {
    for (field, key) in fields {
        if let Some(text) = object.attribute(field) {
            fix.attributes.insert(key.to_string(), text);
        }
    }
}

/// Field layout of a vendor that reports one fix per frame on a fixed port
pub struct PortLayout {
    pub vendor: &'static str,
    pub gps_port: u8,
    pub latitude: &'static str,
    pub longitude: &'static str,
    /// (object field, attribute key)
    pub attributes: &'static [(&'static str, &'static str)],
}

/// Decodes a single-fix vendor. Frames on other ports become invalid fixes.
pub fn decode_port_layout(uplink: &Uplink, received_at: i64, layout: &PortLayout) -> Result<Vec<Fix>> {
    let timestamp = uplink.time.unwrap_or(received_at);
    if uplink.f_port != layout.gps_port {
        tracing::debug!(
            vendor = layout.vendor,
            f_port = uplink.f_port,
            "skipping non-GPS frame"
        );
        return Ok(vec![Fix::unfixed(timestamp)]);
    }

    let object = uplink.require_object(layout.vendor)?;
    let (lat, lon) = coordinates(object, &[layout.latitude], &[layout.longitude])?;

    let mut fix = Fix::at(lat, lon, timestamp);
    fix.hdop = object.number(&["hdop"])?.unwrap_or(0.0);
    copy_attributes(&mut fix, object, layout.attributes);
    Ok(vec![fix])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_size_limit() {
        assert!(validate_payload_size(&[0u8; 10], 10).is_ok());
        assert!(matches!(
            validate_payload_size(&[0u8; 11], 10),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        assert!(validate_range(90.0, 180.0).is_ok());
        assert!(validate_range(-90.0, -180.0).is_ok());
        assert!(validate_range(90.1, 0.0).is_err());
        assert!(validate_range(0.0, -180.5).is_err());
    }

    #[test]
    fn test_missing_coordinate_is_decode_error() {
        let object = PayloadObject::from_json(json!({"lat": 1.0}));
        assert!(matches!(
            coordinates(&object, LATITUDE_FIELDS, LONGITUDE_FIELDS),
            Err(TrackerError::Decode(_))
        ));
    }

    #[test]
    fn test_out_of_range_coordinate_is_validation_error() {
        let object = PayloadObject::from_json(json!({"lat": 91.0, "lon": 10.0}));
        assert!(matches!(
            coordinates(&object, LATITUDE_FIELDS, LONGITUDE_FIELDS),
            Err(TrackerError::Validation(_))
        ));
    }
}
