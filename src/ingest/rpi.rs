use super::common::validate_range;
use crate::error::{Result, TrackerError};
use crate::model::fix::{Fix, ATTR_SINGLE_POINT};
use crate::model::uplink::Uplink;

/// Parses `"<lat>,<lon>[,s]"`, returning the coordinates and the single-point flag.
pub fn parse_coordinates(text: &str) -> Result<(f64, f64, bool)> {
    let parts: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(TrackerError::Decode(format!(
            "expected \"lat,lon\" text payload, got {:?}",
            text
        )));
    }

    let lat: f64 = parts[0]
        .parse()
        .map_err(|e| TrackerError::Decode(format!("latitude {:?}: {}", parts[0], e)))?;
    let lon: f64 = parts[1]
        .parse()
        .map_err(|e| TrackerError::Decode(format!("longitude {:?}: {}", parts[1], e)))?;
    validate_range(lat, lon)?;

    let single = parts.get(2) == Some(&"s");
    Ok((lat, lon, single))
}

/// Raspberry Pi sender: plain text coordinates in the frame payload.
pub fn decode(uplink: &Uplink, received_at: i64) -> Result<Vec<Fix>> {
    let text = std::str::from_utf8(&uplink.data)
        .map_err(|e| TrackerError::Decode(format!("rpi payload is not text: {}", e)))?;
    let (lat, lon, single) = parse_coordinates(text)?;

    let mut fix = Fix::at(lat, lon, received_at);
    fix.motion = true;
    if single {
        fix = fix.with_attribute(ATTR_SINGLE_POINT, "true");
    }
    Ok(vec![fix])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_pair() {
        let (lat, lon, single) = parse_coordinates("42.6951,23.3604").unwrap();
        assert_eq!((lat, lon, single), (42.6951, 23.3604, false));
    }

    #[test]
    fn test_parse_single_point_flag() {
        let (_, _, single) = parse_coordinates(" 42.6951 , 23.3604 ,s").unwrap();
        assert!(single);
        let (_, _, single) = parse_coordinates("42.6951,23.3604,x").unwrap();
        assert!(!single);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_coordinates("42.6951"), Err(TrackerError::Decode(_))));
        assert!(matches!(parse_coordinates("north,23.1"), Err(TrackerError::Decode(_))));
        assert!(matches!(parse_coordinates("91.0,23.1"), Err(TrackerError::Validation(_))));
        assert!(matches!(parse_coordinates("42.0,-181"), Err(TrackerError::Validation(_))));
        assert!(matches!(parse_coordinates("NaN,1.0"), Err(TrackerError::Validation(_))));
    }

    proptest! {
        #[test]
        fn prop_formatted_pairs_parse_back(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let (plat, plon, single) = parse_coordinates(&format!("{},{}", lat, lon)).unwrap();
            prop_assert_eq!(plat, lat);
            prop_assert_eq!(plon, lon);
            prop_assert!(!single);
        }
    }
}
