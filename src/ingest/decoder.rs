use super::{antratek, g62, irnas, rpi};
use crate::error::{Result, TrackerError};
use crate::model::fix::Fix;
use crate::model::uplink::Uplink;
use std::fmt;
use std::str::FromStr;

/// Device vendor selected by the uplink's `tags.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorTag {
    Rpi,
    Irnas,
    G62,
    Antratek,
}

impl VendorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorTag::Rpi => "rpi",
            VendorTag::Irnas => "irnas",
            VendorTag::G62 => "Second",
            VendorTag::Antratek => "antratek",
        }
    }

    fn decoder(&self) -> fn(&Uplink, i64) -> Result<Vec<Fix>> {
        match self {
            VendorTag::Rpi => rpi::decode,
            VendorTag::Irnas => irnas::decode,
            VendorTag::G62 => g62::decode,
            VendorTag::Antratek => antratek::decode,
        }
    }
}

impl FromStr for VendorTag {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rpi" => Ok(VendorTag::Rpi),
            "irnas" => Ok(VendorTag::Irnas),
            "Second" => Ok(VendorTag::G62),
            "antratek" => Ok(VendorTag::Antratek),
            other => Err(TrackerError::UnsupportedDevice(other.to_string())),
        }
    }
}

impl fmt::Display for VendorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes an uplink into fixes stamped with the uplink's device identity.
///
/// The vendor tag is resolved before any payload is inspected, so a missing
/// or unknown `tags.type` is rejected up front.
pub fn decode(uplink: &Uplink, received_at: i64) -> Result<Vec<Fix>> {
    let tag: VendorTag = uplink.device_type()?.parse()?;
    let device_id = uplink.device_id();

    let mut fixes = (tag.decoder())(uplink, received_at)?;
    for fix in &mut fixes {
        fix.device_id = device_id.clone();
    }

    tracing::debug!(
        device_id = device_id.as_str(),
        vendor = tag.as_str(),
        f_cnt = uplink.f_cnt,
        fixes = fixes.len(),
        "decoded uplink"
    );
    Ok(fixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lorawan::DevEui;
    use crate::model::object::PayloadObject;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn uplink(tag: Option<&str>, f_port: u8, data: &[u8], object: Option<serde_json::Value>) -> Uplink {
        let mut tags = HashMap::new();
        if let Some(tag) = tag {
            tags.insert("type".to_string(), tag.to_string());
        }
        Uplink {
            device_name: "dev".to_string(),
            dev_eui: DevEui::new("0011223344556677".to_string()).unwrap(),
            f_cnt: 5,
            f_port,
            data: data.to_vec(),
            object: object.map(PayloadObject::from_json),
            rx_info: Vec::new(),
            tags,
            time: None,
        }
    }

    #[test]
    fn test_vendor_tag_parse() {
        assert_eq!("rpi".parse::<VendorTag>().unwrap(), VendorTag::Rpi);
        assert_eq!("Second".parse::<VendorTag>().unwrap(), VendorTag::G62);
        assert!(matches!(
            "lora-x".parse::<VendorTag>(),
            Err(TrackerError::UnsupportedDevice(_))
        ));
    }

    #[test]
    fn test_rpi_scenario() {
        let fixes = decode(&uplink(Some("rpi"), 1, b"42.6951,23.3604", None), 100).unwrap();
        assert_eq!(fixes.len(), 1);
        let fix = &fixes[0];
        assert_eq!(fix.device_id, "dev-0011223344556677");
        assert_eq!(fix.latitude, 42.6951);
        assert_eq!(fix.longitude, 23.3604);
        assert!(fix.valid);
        assert!(fix.motion);
    }

    #[test]
    fn test_missing_tag_rejected_before_decoding() {
        // Payload is garbage for every decoder; the tag check must fail first.
        let result = decode(&uplink(None, 1, b"\xff\xfe", None), 0);
        match result {
            Err(TrackerError::Decode(msg)) => assert!(msg.contains("tags.type")),
            other => panic!("Expected missing tag decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_hard_error() {
        let result = decode(&uplink(Some("mystery"), 1, b"1,2", None), 0);
        assert!(matches!(result, Err(TrackerError::UnsupportedDevice(_))));
    }

    #[test]
    fn test_zero_coordinates_invalid_for_every_vendor() {
        let cases = vec![
            uplink(Some("rpi"), 1, b"0,0", None),
            uplink(Some("irnas"), 1, b"", Some(json!({"lat": 0, "lon": 0}))),
            uplink(Some("Second"), 1, b"", Some(json!({"latitudeDeg": 0, "longitudeDeg": 0}))),
            uplink(
                Some("antratek"),
                136,
                b"",
                Some(json!({"positionLatitude": 0, "positionLongitude": 0})),
            ),
        ];
        for case in cases {
            let fixes = decode(&case, 0).unwrap();
            assert!(!fixes[0].valid, "vendor {:?}", case.tags.get("type"));
        }
    }

    proptest! {
        #[test]
        fn prop_object_vendors_keep_coordinates(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let up = uplink(Some("irnas"), 1, b"", Some(json!({"lat": lat, "lon": lon})));
            let fix = &decode(&up, 0).unwrap()[0];
            prop_assert_eq!(fix.latitude, lat);
            prop_assert_eq!(fix.longitude, lon);
        }
    }
}
