use crate::error::{Result, TrackerError};
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;

/// Object decoded by the network server's payload codec
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PayloadObject {
    pub object: Value,
}

impl PayloadObject {
    pub fn from_json(value: Value) -> Self {
        Self {
            object: unwrap_double_encoded(value),
        }
    }

    /// Get a field by path (e.g., "battery" or "gps.hdop")
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.object;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        match current {
            Value::Null => None,
            v => Some(v),
        }
    }

    /// First field among `names` that is present
    fn first_of<'a>(&'a self, names: &[&'a str]) -> Option<(&'a str, &'a Value)> {
        names
            .iter()
            .find_map(|name| self.get_field(name).map(|v| (*name, v)))
    }

    /// Numeric field under any of `names`; a non-numeric value is a decode error.
    pub fn number(&self, names: &[&str]) -> Result<Option<f64>> {
        match self.first_of(names) {
            None => Ok(None),
            Some((name, Value::Number(n))) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| type_mismatch(name, "number")),
            Some((name, _)) => Err(type_mismatch(name, "number")),
        }
    }

    /// Integer field; floats with a fractional part are rejected.
    pub fn integer(&self, names: &[&str]) -> Result<Option<i64>> {
        match self.first_of(names) {
            None => Ok(None),
            Some((name, Value::Number(n))) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Some(i));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(type_mismatch(name, "integer")),
                }
            }
            Some((name, _)) => Err(type_mismatch(name, "integer")),
        }
    }

    /// Unix seconds from either a numeric epoch or an RFC3339 string.
    pub fn timestamp(&self, names: &[&str]) -> Result<Option<i64>> {
        match self.first_of(names) {
            None => Ok(None),
            Some((_, Value::Number(_))) => self.integer(names),
            Some((name, Value::String(s))) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(dt.timestamp()))
                .map_err(|e| TrackerError::Decode(format!("field {}: {}", name, e))),
            Some((name, _)) => Err(type_mismatch(name, "timestamp")),
        }
    }

    /// Nested list of objects, possibly delivered as a JSON-encoded string.
    pub fn list(&self, name: &str) -> Result<Option<Vec<PayloadObject>>> {
        let value = match self.get_field(name) {
            None => return Ok(None),
            Some(v) => unwrap_double_encoded(v.clone()),
        };
        match value {
            Value::Array(items) => Ok(Some(items.into_iter().map(PayloadObject::from_json).collect())),
            _ => Err(type_mismatch(name, "list")),
        }
    }

    /// Field rendered as attribute text, or None when absent.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.get_field(name).map(value_text)
    }
}

/// Decimal text for numbers, raw text for strings.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string()),
        },
        other => other.to_string(),
    }
}

fn unwrap_double_encoded(value: Value) -> Value {
    // Some codecs return JSON.stringify() output instead of raw objects
    match &value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => {
                tracing::debug!("Detected and unwrapped double-encoded JSON payload");
                parsed
            }
            _ => value,
        },
        _ => value,
    }
}

fn type_mismatch(field: &str, expected: &str) -> TrackerError {
    TrackerError::Decode(format!("field {} is not a {}", field, expected))
}
