//! Fixed wire timestamp format shared by every inbound sensor and the
//! broadcast payload: `YYYY-MM-DD HH:mm:ss`, no timezone.

use chrono::NaiveDateTime;

pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), WIRE_FORMAT).ok()
}

pub fn format(t: &NaiveDateTime) -> String {
    t.format(WIRE_FORMAT).to_string()
}

/// Serde adapter for `NaiveDateTime` fields carried in the wire format.
pub mod wire {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(t))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid timestamp '{}', expected YYYY-MM-DD HH:mm:ss", s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_parse_wire_format() {
        let t = parse("2024-01-01 10:00:00").unwrap();
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(t.hour(), 10);
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        assert!(parse("2024-01-01T10:00:00Z").is_none());
        assert!(parse("01/01/2024 10:00").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let t = parse("2024-06-30 23:59:59").unwrap();
        assert_eq!(format(&t), "2024-06-30 23:59:59");
    }
}
