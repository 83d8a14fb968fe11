use super::common::{decode_port_layout, PortLayout};
use crate::error::Result;
use crate::model::fix::Fix;
use crate::model::uplink::Uplink;

/// Digital Matter G62 (`Second` device type)
pub const LAYOUT: PortLayout = PortLayout {
    vendor: "g62",
    gps_port: 1,
    latitude: "latitudeDeg",
    longitude: "longitudeDeg",
    attributes: &[("speedKmph", "speedKmph"), ("tempC", "temperature")],
};

pub fn decode(uplink: &Uplink, received_at: i64) -> Result<Vec<Fix>> {
    decode_port_layout(uplink, received_at, &LAYOUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::model::lorawan::DevEui;
    use crate::model::object::PayloadObject;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn uplink(f_port: u8, object: Value, time: Option<i64>) -> Uplink {
        Uplink {
            device_name: "truck".to_string(),
            dev_eui: DevEui::new("0004a30b001c0530".to_string()).unwrap(),
            f_cnt: 10,
            f_port,
            data: Vec::new(),
            object: Some(PayloadObject::from_json(object)),
            rx_info: Vec::new(),
            tags: HashMap::new(),
            time,
        }
    }

    #[test]
    fn test_g62_fix_with_attributes() {
        let object = json!({
            "latitudeDeg": -37.81,
            "longitudeDeg": 144.96,
            "hdop": 0.9,
            "speedKmph": 54,
            "tempC": 18.5
        });
        let fix = &decode(&uplink(1, object, Some(1_700_000_000)), 1).unwrap()[0];

        assert!(fix.valid);
        assert_eq!((fix.latitude, fix.longitude), (-37.81, 144.96));
        assert_eq!(fix.hdop, 0.9);
        assert_eq!(fix.timestamp, 1_700_000_000);
        assert_eq!(fix.attributes.get("speedKmph").map(String::as_str), Some("54"));
        assert_eq!(fix.attributes.get("temperature").map(String::as_str), Some("18.5"));
    }

    #[test]
    fn test_g62_other_port() {
        let fixes = decode(&uplink(2, json!({}), None), 42).unwrap();
        assert!(!fixes[0].valid);
        assert_eq!(fixes[0].timestamp, 42);
    }

    #[test]
    fn test_g62_requires_its_own_field_names() {
        let result = decode(&uplink(1, json!({"lat": 1.0, "lon": 2.0}), None), 0);
        assert!(matches!(result, Err(TrackerError::Decode(_))));
    }
}
