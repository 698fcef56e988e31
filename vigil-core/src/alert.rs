use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::timefmt;

/// Severity assigned when the source reports none, or reports something
/// that is not a number.
pub const DEFAULT_THREAT_LEVEL: i32 = 3;

/// Attack type used when the sensor schema omits `attack_type`.
pub const UNKNOWN_ATTACK_TYPE: &str = "Unknown";

/// Canonical alert record: the single shape that gets persisted and pushed
/// to live subscribers, regardless of which sensor produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub threat_id: String,
    pub threat_level: i32,
    pub impact_scope: String,
    #[serde(with = "timefmt::wire")]
    pub occur_time: NaiveDateTime,
    #[serde(with = "timefmt::wire")]
    pub create_time: NaiveDateTime,
}

/// The payload body was not a JSON object at all. This is the only way an
/// alert ingest can fail before persistence; anything wrong *inside* a
/// recognized shape degrades to defaults instead.
#[derive(Debug, Error)]
#[error("alert payload must be a JSON object, got {0}")]
pub struct FormatError(pub String);

/// Standard schema: the sensor already speaks our canonical field names.
/// Values stay untyped so a present-but-unparseable field can be dropped to
/// its default instead of failing the whole record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardAlert {
    pub threat_id: Value,
    pub threat_level: Option<Value>,
    pub impact_scope: Option<Value>,
    pub occur_time: Option<Value>,
    pub create_time: Option<Value>,
}

/// Sensor-engine schema, as emitted by the anomaly IDS. It has no threat id
/// of its own and scatters the impact information across session/ip fields.
/// Untyped for the same reason as [`StandardAlert`]: a mistyped field must
/// degrade, not abort the record.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorAlert {
    pub engine: Option<Value>,
    pub timestamp: Option<Value>,
    pub attack_type: Option<Value>,
    pub severity: Option<Value>,
    pub message: Option<Value>,
    pub session: Option<Value>,
    pub src_ip: Option<Value>,
    pub dst_ip: Option<Value>,
    pub confidence: Option<Value>,
}

/// Inbound alert after schema disambiguation. The presence of a `threatId`
/// key selects the standard branch; everything else is treated as the
/// sensor-engine schema. Kept as an explicit sum type so normalization is
/// exhaustively matched and new schemas are additive.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundAlert {
    Standard(StandardAlert),
    Sensor(SensorAlert),
}

impl InboundAlert {
    /// Decode a raw wire value into one of the known schemas.
    pub fn decode(raw: Value) -> Result<Self, FormatError> {
        if !raw.is_object() {
            return Err(FormatError(json_type_name(&raw).to_string()));
        }
        serde_json::from_value(raw).map_err(|e| FormatError(e.to_string()))
    }

    /// Total normalization: every syntactically valid object becomes a
    /// canonical [`Alert`]. Field-level problems never abort the record.
    pub fn normalize(self, now: NaiveDateTime) -> Alert {
        match self {
            InboundAlert::Standard(std) => normalize_standard(std, now),
            InboundAlert::Sensor(sensor) => normalize_sensor(sensor, now),
        }
    }
}

/// Convenience entry point: decode + normalize in one step.
pub fn normalize(raw: Value, now: NaiveDateTime) -> Result<Alert, FormatError> {
    Ok(InboundAlert::decode(raw)?.normalize(now))
}

fn normalize_standard(std: StandardAlert, now: NaiveDateTime) -> Alert {
    let threat_id = match std.threat_id.as_str() {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => {
            tracing::warn!("standard alert carried a non-string threatId, generating one");
            Uuid::new_v4().to_string()
        }
    };

    Alert {
        threat_id,
        threat_level: coerce_level(std.threat_level.as_ref()),
        impact_scope: coerce_string(std.impact_scope.as_ref()).unwrap_or_default(),
        occur_time: parse_or_now("occurTime", std.occur_time.as_ref(), now),
        create_time: parse_or_now("createTime", std.create_time.as_ref(), now),
    }
}

fn normalize_sensor(sensor: SensorAlert, now: NaiveDateTime) -> Alert {
    let attack_type = coerce_string(sensor.attack_type.as_ref())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_ATTACK_TYPE.to_string());

    // Impact scope priority: session, then src/dst pair, then message.
    let session = coerce_string(sensor.session.as_ref()).unwrap_or_default();
    let src_ip = coerce_string(sensor.src_ip.as_ref()).unwrap_or_default();
    let dst_ip = coerce_string(sensor.dst_ip.as_ref()).unwrap_or_default();
    let message = coerce_string(sensor.message.as_ref()).unwrap_or_default();

    let impact_scope = if !session.is_empty() {
        format!("{} | {}", session, attack_type)
    } else if !src_ip.is_empty() && !dst_ip.is_empty() {
        format!("{} -> {} | {}", src_ip, dst_ip, attack_type)
    } else {
        format!("{} | {}", attack_type, message)
    };

    Alert {
        threat_id: Uuid::new_v4().to_string(),
        threat_level: coerce_level(sensor.severity.as_ref()),
        impact_scope,
        occur_time: parse_or_now("timestamp", sensor.timestamp.as_ref(), now),
        create_time: now,
    }
}

/// Numeric severities map through directly (fractions truncate); anything
/// else falls back to [`DEFAULT_THREAT_LEVEL`].
fn coerce_level(value: Option<&Value>) -> i32 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .map(|n| n as i32)
        .unwrap_or(DEFAULT_THREAT_LEVEL)
}

/// String fields arrive untyped; anything that is not a JSON string counts
/// as absent.
fn coerce_string(value: Option<&Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(str::to_string)
}

/// Parse a wire timestamp, substituting the ingestion time when the field is
/// absent or malformed. Malformed values are surfaced in the log since they
/// hide upstream clock/format problems.
fn parse_or_now(field: &str, value: Option<&Value>, now: NaiveDateTime) -> NaiveDateTime {
    let Some(raw) = value.filter(|v| !v.is_null()) else {
        return now;
    };
    raw.as_str().and_then(timefmt::parse).unwrap_or_else(|| {
        tracing::warn!(field, value = %raw, "unparseable alert timestamp, using ingestion time");
        now
    })
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        timefmt::parse("2024-05-05 12:00:00").unwrap()
    }

    #[test]
    fn test_standard_schema_is_lossless_roundtrip() {
        let input = json!({
            "threatId": "t-001",
            "threatLevel": 5,
            "impactScope": "10.0.0.1 -> 10.0.0.2 | DDoS",
            "occurTime": "2024-01-01 10:00:00",
            "createTime": "2024-01-01 10:00:05"
        });
        let alert = normalize(input.clone(), now()).unwrap();
        let reserialized = serde_json::to_value(&alert).unwrap();
        assert_eq!(reserialized, input);
    }

    #[test]
    fn test_threat_id_key_selects_standard_branch() {
        let alert = normalize(
            json!({"threatId": "abc", "severity": 5, "attack_type": "scan"}),
            now(),
        )
        .unwrap();
        // severity/attack_type belong to the sensor schema and are ignored here
        assert_eq!(alert.threat_id, "abc");
        assert_eq!(alert.threat_level, DEFAULT_THREAT_LEVEL);
        assert_eq!(alert.impact_scope, "");
    }

    #[test]
    fn test_standard_unparseable_fields_degrade_to_defaults() {
        let alert = normalize(
            json!({
                "threatId": "t-002",
                "threatLevel": "critical",
                "occurTime": "yesterday"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(alert.threat_level, DEFAULT_THREAT_LEVEL);
        assert_eq!(alert.occur_time, now());
        assert_eq!(alert.create_time, now());
    }

    #[test]
    fn test_sensor_schema_generates_threat_id() {
        let payload = json!({"engine": "ids1", "attack_type": "PortScan"});
        let a = normalize(payload.clone(), now()).unwrap();
        let b = normalize(payload, now()).unwrap();
        assert!(!a.threat_id.is_empty());
        assert_ne!(a.threat_id, b.threat_id);
    }

    #[test]
    fn test_concurrent_normalization_yields_distinct_ids() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    normalize(json!({"engine": "ids1"}), now()).unwrap().threat_id
                })
            })
            .collect();
        let ids: std::collections::HashSet<String> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_impact_scope_prefers_session() {
        let alert = normalize(
            json!({
                "engine": "ids1",
                "session": "s1",
                "attack_type": "scan",
                "src_ip": "10.0.0.1",
                "dst_ip": "10.0.0.2"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(alert.impact_scope, "s1 | scan");
    }

    #[test]
    fn test_impact_scope_falls_back_to_ip_pair() {
        let alert = normalize(
            json!({
                "engine": "ids1",
                "timestamp": "2024-01-01 10:00:00",
                "attack_type": "PortScan",
                "severity": 4,
                "src_ip": "10.0.0.1",
                "dst_ip": "10.0.0.2"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(alert.threat_level, 4);
        assert_eq!(alert.impact_scope, "10.0.0.1 -> 10.0.0.2 | PortScan");
        assert_eq!(timefmt::format(&alert.occur_time), "2024-01-01 10:00:00");
        assert_eq!(alert.create_time, now());
    }

    #[test]
    fn test_impact_scope_falls_back_to_message() {
        let alert = normalize(
            json!({
                "engine": "ids1",
                "attack_type": "scan",
                "message": "suspicious traffic",
                "src_ip": "10.0.0.1"
            }),
            now(),
        )
        .unwrap();
        // only one side of the ip pair present, so the pair branch is skipped
        assert_eq!(alert.impact_scope, "scan | suspicious traffic");
    }

    #[test]
    fn test_attack_type_defaults_to_unknown() {
        let alert = normalize(json!({"engine": "ids1", "message": "m"}), now()).unwrap();
        assert_eq!(alert.impact_scope, "Unknown | m");
    }

    #[test]
    fn test_severity_defaults() {
        for payload in [
            json!({"engine": "ids1"}),
            json!({"engine": "ids1", "severity": "high"}),
            json!({"engine": "ids1", "severity": null}),
        ] {
            let alert = normalize(payload, now()).unwrap();
            assert_eq!(alert.threat_level, DEFAULT_THREAT_LEVEL);
        }
    }

    #[test]
    fn test_fractional_severity_truncates() {
        let alert = normalize(json!({"engine": "ids1", "severity": 4.7}), now()).unwrap();
        assert_eq!(alert.threat_level, 4);
    }

    #[test]
    fn test_unparseable_timestamp_falls_back_to_ingestion_time() {
        let alert = normalize(
            json!({"engine": "ids1", "timestamp": "not-a-time"}),
            now(),
        )
        .unwrap();
        assert_eq!(alert.occur_time, now());
    }

    #[test]
    fn test_non_object_payload_is_a_format_error() {
        assert!(normalize(json!("just a string"), now()).is_err());
        assert!(normalize(json!([1, 2, 3]), now()).is_err());
        assert!(normalize(json!(null), now()).is_err());
    }

    #[test]
    fn test_mistyped_fields_degrade_instead_of_failing() {
        // session is a number, timestamp is a list: both count as absent
        let alert = normalize(
            json!({
                "engine": "ids1",
                "session": 123,
                "timestamp": [2024, 1, 1],
                "attack_type": "scan",
                "message": "m"
            }),
            now(),
        )
        .unwrap();
        assert_eq!(alert.impact_scope, "scan | m");
        assert_eq!(alert.occur_time, now());
    }

    #[test]
    fn test_mistyped_standard_fields_stay_on_standard_branch() {
        // occurTime as a number must not flip the record to the sensor schema
        let alert = normalize(
            json!({"threatId": "t-42", "occurTime": 1704103200}),
            now(),
        )
        .unwrap();
        assert_eq!(alert.threat_id, "t-42");
        assert_eq!(alert.occur_time, now());
    }

    #[test]
    fn test_empty_object_still_normalizes() {
        let alert = normalize(json!({}), now()).unwrap();
        assert!(!alert.threat_id.is_empty());
        assert_eq!(alert.threat_level, DEFAULT_THREAT_LEVEL);
        assert_eq!(alert.create_time, now());
    }
}
