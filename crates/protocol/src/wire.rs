//! Frame and value encodings.
//!
//! A frame is `Key=Value` pairs joined by `|`. Vectors are `x:y:z` and
//! waypoint lists are vectors joined by `;`. Floats are written with Rust's
//! shortest round-trip formatting, so decode(encode(v)) is bit-identical.

use crate::error::{WireError, WireResult};
use baymaster_core::Vec3;

/// Separator between fields of a frame.
pub const FIELD_SEPARATOR: char = '|';
/// Separator between a field key and its value.
pub const KEY_VALUE_SEPARATOR: char = '=';
/// Separator between vector components.
pub const VECTOR_SEPARATOR: char = ':';
/// Separator between vectors of a list.
pub const LIST_SEPARATOR: char = ';';

/// Encode a vector as `x:y:z`.
pub fn encode_vector(v: Vec3) -> String {
    format!("{}{sep}{}{sep}{}", v.x, v.y, v.z, sep = VECTOR_SEPARATOR)
}

/// Decode an `x:y:z` vector.
pub fn decode_vector(raw: &str) -> WireResult<Vec3> {
    let mut parts = raw.trim().split(VECTOR_SEPARATOR);
    let mut next = || -> WireResult<f64> {
        parts
            .next()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .ok_or_else(|| WireError::MalformedVector(raw.to_string()))
    };
    let v = Vec3::new(next()?, next()?, next()?);
    if parts.next().is_some() {
        return Err(WireError::MalformedVector(raw.to_string()));
    }
    Ok(v)
}

/// Encode a waypoint list as `p1;p2;...`.
pub fn encode_waypoints(points: &[Vec3]) -> String {
    points
        .iter()
        .map(|p| encode_vector(*p))
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

/// Decode a waypoint list. The empty string is the empty list.
pub fn decode_waypoints(raw: &str) -> WireResult<Vec<Vec3>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(LIST_SEPARATOR).map(decode_vector).collect()
}

/// Replace characters that would break framing inside free text.
pub fn sanitize(value: &str) -> String {
    value.replace(FIELD_SEPARATOR, "/")
}

/// Parsed fields of one frame, in arrival order.
///
/// Lookups of absent keys yield the empty string: missing fields default to
/// empty/zero rather than failing the whole frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    /// Split a frame into fields. Segments without `=` are ignored; for
    /// repeated keys the last occurrence wins.
    pub fn parse(frame: &str) -> Self {
        let entries = frame
            .split(FIELD_SEPARATOR)
            .filter_map(|segment| segment.split_once(KEY_VALUE_SEPARATOR))
            .map(|(k, v)| (k.trim().to_string(), v.to_string()))
            .collect();
        Self { entries }
    }

    /// Start an empty frame builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.push((key.to_string(), sanitize(&value.into())));
        self
    }

    /// Raw value of `key`, empty when absent.
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// True when `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Vector value of `key`; zero when absent.
    pub fn vector(&self, key: &'static str) -> WireResult<Vec3> {
        let raw = self.get(key);
        if raw.trim().is_empty() {
            return Ok(Vec3::ZERO);
        }
        decode_vector(raw).map_err(|_| WireError::InvalidField {
            field: key,
            value: raw.to_string(),
        })
    }

    /// Waypoint list value of `key`; empty when absent.
    pub fn waypoints(&self, key: &'static str) -> WireResult<Vec<Vec3>> {
        let raw = self.get(key);
        decode_waypoints(raw).map_err(|_| WireError::InvalidField {
            field: key,
            value: raw.to_string(),
        })
    }

    /// Integer value of `key`; zero when absent.
    pub fn integer(&self, key: &'static str) -> WireResult<i64> {
        let raw = self.get(key).trim();
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse().map_err(|_| WireError::InvalidField {
            field: key,
            value: raw.to_string(),
        })
    }

    /// Join the fields back into a frame.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}{}{}", k, KEY_VALUE_SEPARATOR, v))
            .collect::<Vec<_>>()
            .join(&FIELD_SEPARATOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_vector_format() {
        assert_eq!(encode_vector(Vec3::new(1.5, -2.0, 0.0)), "1.5:-2:0");
        assert_eq!(decode_vector("1.5:-2:0").unwrap(), Vec3::new(1.5, -2.0, 0.0));
    }

    #[test]
    fn test_malformed_vectors_rejected() {
        assert!(decode_vector("1:2").is_err());
        assert!(decode_vector("1:2:3:4").is_err());
        assert!(decode_vector("a:b:c").is_err());
    }

    #[test]
    fn test_waypoint_list() {
        let points = vec![Vec3::new(0.0, 0.0, 50.0), Vec3::new(0.0, 0.0, 1.5)];
        let encoded = encode_waypoints(&points);
        assert_eq!(encoded, "0:0:50;0:0:1.5");
        assert_eq!(decode_waypoints(&encoded).unwrap(), points);
        assert!(decode_waypoints("").unwrap().is_empty());
    }

    #[test]
    fn test_fields_missing_default_empty() {
        let fields = Fields::parse("Command=RESPONSE_STATUS|From=Hauler");
        assert_eq!(fields.get("Command"), "RESPONSE_STATUS");
        assert_eq!(fields.get("StatusMessage"), "");
        assert_eq!(fields.integer("Status").unwrap(), 0);
        assert_eq!(fields.vector("Position").unwrap(), Vec3::ZERO);
    }

    #[test]
    fn test_fields_value_may_contain_equals() {
        let fields = Fields::parse("Command=X|StatusMessage=eta=5s");
        assert_eq!(fields.get("StatusMessage"), "eta=5s");
    }

    #[test]
    fn test_builder_sanitizes_separator() {
        let frame = Fields::new()
            .with("Command", "RESPONSE_STATUS")
            .with("StatusMessage", "a|b")
            .encode();
        assert_eq!(frame, "Command=RESPONSE_STATUS|StatusMessage=a/b");
    }

    proptest! {
        #[test]
        fn vector_encoding_is_exact(
            x in proptest::num::f64::NORMAL | proptest::num::f64::ZERO,
            y in proptest::num::f64::NORMAL | proptest::num::f64::ZERO,
            z in proptest::num::f64::NORMAL | proptest::num::f64::ZERO,
        ) {
            let v = Vec3::new(x, y, z);
            let decoded = decode_vector(&encode_vector(v)).unwrap();
            prop_assert_eq!(decoded.x.to_bits(), x.to_bits());
            prop_assert_eq!(decoded.y.to_bits(), y.to_bits());
            prop_assert_eq!(decoded.z.to_bits(), z.to_bits());
        }
    }
}
