//! Payload validation
//!
//! Turns nested [`IngestionEntry`] values into flat [`NewRecord`] rows.
//! Validation is pure: a batch is either fully valid or rejected as a whole,
//! and nothing here touches the store.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use serde_path_to_error::Segment;

use crate::error::{PathSegment, ValidationError};
use crate::model::{IngestionEntry, NewRecord, Timestamp};

/// Message reported for any timestamp that is not ISO 8601
pub const INVALID_TIMESTAMP: &str =
    "Invalid timestamp format. Expected ISO 8601 format(YYYY-MM-DDTHH:MM:SSZ).";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a client timestamp into a UTC instant
///
/// Offsets are normalized to UTC; timestamps without an offset are taken as UTC.
pub fn parse_timestamp(timestamp: &Timestamp) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = || ValidationError::new(["agent_data", "timestamp"], INVALID_TIMESTAMP);

    let text = match timestamp {
        Timestamp::Typed(dt) => return Ok(*dt),
        Timestamp::Raw(Value::String(s)) => s.trim(),
        Timestamp::Raw(_) => return Err(invalid()),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(invalid())
}

fn finite(value: f64, location: [&str; 3]) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::new(location, "value is not a finite number"))
    }
}

/// Validate and flatten one entry
pub fn validate_entry(entry: &IngestionEntry) -> Result<NewRecord, ValidationError> {
    let data = &entry.agent_data;

    Ok(NewRecord {
        road_state: entry.road_state.clone(),
        x: finite(data.accelerometer.x, ["agent_data", "accelerometer", "x"])?,
        y: finite(data.accelerometer.y, ["agent_data", "accelerometer", "y"])?,
        z: finite(data.accelerometer.z, ["agent_data", "accelerometer", "z"])?,
        latitude: finite(data.gps.latitude, ["agent_data", "gps", "latitude"])?,
        longitude: finite(data.gps.longitude, ["agent_data", "gps", "longitude"])?,
        timestamp: parse_timestamp(&data.timestamp)?,
    })
}

/// Validate every entry of a batch before any of it is persisted
///
/// The first failing entry rejects the whole batch; its index is prefixed to
/// the error location.
pub fn validate_batch(batch: &[IngestionEntry]) -> Result<Vec<NewRecord>, ValidationError> {
    batch
        .iter()
        .enumerate()
        .map(|(index, entry)| validate_entry(entry).map_err(|e| e.within(index)))
        .collect()
}

/// Decode an untyped request body into a batch of entries
pub fn decode_batch(body: &Value) -> Result<Vec<IngestionEntry>, ValidationError> {
    let Value::Array(items) = body else {
        return Err(ValidationError::new(
            Vec::<&str>::new(),
            "expected an array of telemetry entries",
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_entry(item).map_err(|e| e.within(index)))
        .collect()
}

/// Decode an untyped request body into a single entry
///
/// Shape errors carry the path to the offending field, e.g.
/// `agent_data.gps.latitude` for a string where a number belongs.
pub fn decode_entry(body: &Value) -> Result<IngestionEntry, ValidationError> {
    serde_path_to_error::deserialize(body).map_err(|e| {
        let location: Vec<PathSegment> = e
            .path()
            .iter()
            .filter_map(|segment| match segment {
                Segment::Seq { index } => Some(PathSegment::Index(*index)),
                Segment::Map { key } => Some(PathSegment::Field(key.clone())),
                _ => None,
            })
            .collect();
        ValidationError {
            location,
            message: e.inner().to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Accelerometer, AgentData, Gps};
    use chrono::TimeZone;

    fn entry(timestamp: impl Into<Timestamp>) -> IngestionEntry {
        IngestionEntry {
            road_state: "NORMAL".to_string(),
            agent_data: AgentData {
                accelerometer: Accelerometer { x: 1.0, y: 0.0, z: 9.8 },
                gps: Gps { latitude: 50.45, longitude: 30.52 },
                timestamp: timestamp.into(),
            },
        }
    }

    fn midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_flattens_entry() {
        let record = validate_entry(&entry("2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(record.road_state, "NORMAL");
        assert_eq!((record.x, record.y, record.z), (1.0, 0.0, 9.8));
        assert_eq!((record.latitude, record.longitude), (50.45, 30.52));
        assert_eq!(record.timestamp, midnight());
    }

    #[test]
    fn test_accepts_iso_variants() {
        for text in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T02:00:00+02:00",
            "2024-01-01T00:00:00",
            "2024-01-01 00:00:00",
            "2024-01-01T00:00:00.000",
            "2024-01-01T00:00",
            "2024-01-01",
        ] {
            assert_eq!(
                parse_timestamp(&Timestamp::from(text)).unwrap(),
                midnight(),
                "failed on {}",
                text
            );
        }
    }

    #[test]
    fn test_typed_timestamp_passes_through() {
        assert_eq!(parse_timestamp(&Timestamp::Typed(midnight())).unwrap(), midnight());
    }

    #[test]
    fn test_rejects_bad_timestamps() {
        for value in [
            serde_json::json!("yesterday"),
            serde_json::json!("2024-13-01T00:00:00Z"),
            serde_json::json!(""),
            serde_json::json!(1704067200),
            serde_json::json!(null),
        ] {
            let err = parse_timestamp(&Timestamp::Raw(value.clone())).unwrap_err();
            assert_eq!(err.message, INVALID_TIMESTAMP, "accepted {}", value);
            assert_eq!(
                err.location,
                vec![
                    PathSegment::Field("agent_data".to_string()),
                    PathSegment::Field("timestamp".to_string())
                ]
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_numbers() {
        let mut bad = entry("2024-01-01T00:00:00Z");
        bad.agent_data.gps.longitude = f64::INFINITY;

        let err = validate_entry(&bad).unwrap_err();
        assert_eq!(err.to_string(), "agent_data.gps.longitude: value is not a finite number");
    }

    #[test]
    fn test_batch_rejected_by_single_bad_entry() {
        // GIVEN: a batch whose third entry has an unparsable timestamp
        let batch = vec![
            entry("2024-01-01T00:00:00Z"),
            entry("2024-01-01T00:00:01Z"),
            entry("not a time"),
        ];

        // WHEN: validating the batch
        let err = validate_batch(&batch).unwrap_err();

        // THEN: the whole batch fails and the entry index is reported
        assert_eq!(err.location[0], PathSegment::Index(2));
        assert_eq!(err.message, INVALID_TIMESTAMP);
    }

    #[test]
    fn test_decode_batch_reports_entry_index() {
        let body = serde_json::json!([
            {
                "road_state": "NORMAL",
                "agent_data": {
                    "accelerometer": {"x": 1.0, "y": 0.0, "z": 9.8},
                    "gps": {"latitude": 50.45, "longitude": 30.52},
                    "timestamp": "2024-01-01T00:00:00Z"
                }
            },
            {"road_state": "NORMAL"}
        ]);

        let err = decode_batch(&body).unwrap_err();
        assert_eq!(err.location, vec![PathSegment::Index(1)]);
        assert_eq!(err.message, "missing field `agent_data`");
    }

    #[test]
    fn test_decode_batch_rejects_string_numbers() {
        let body = serde_json::json!([{
            "road_state": "NORMAL",
            "agent_data": {
                "accelerometer": {"x": "1.0", "y": 0.0, "z": 9.8},
                "gps": {"latitude": 50.45, "longitude": 30.52},
                "timestamp": "2024-01-01T00:00:00Z"
            }
        }]);

        let err = decode_batch(&body).unwrap_err();
        assert_eq!(err.to_string(), "0.agent_data.accelerometer.x: invalid type: string \"1.0\", expected f64");
    }

    #[test]
    fn test_decode_batch_locates_nested_type_error() {
        // GIVEN: a latitude sent as a string in the first entry
        let body = serde_json::json!([{
            "road_state": "NORMAL",
            "agent_data": {
                "accelerometer": {"x": 1.0, "y": 0.0, "z": 9.8},
                "gps": {"latitude": "50.45", "longitude": 30.52},
                "timestamp": "2024-01-01T00:00:00Z"
            }
        }]);

        // WHEN: decoding the batch
        let err = decode_batch(&body).unwrap_err();

        // THEN: the full path to the field is reported
        assert_eq!(
            serde_json::to_value(&err.location).unwrap(),
            serde_json::json!([0, "agent_data", "gps", "latitude"])
        );
        assert!(err.message.contains("expected f64"));
    }

    #[test]
    fn test_decode_entry_locates_missing_nested_field() {
        let body = serde_json::json!({
            "road_state": "NORMAL",
            "agent_data": {
                "accelerometer": {"y": 0.0, "z": 9.8},
                "gps": {"latitude": 50.45, "longitude": 30.52},
                "timestamp": "2024-01-01T00:00:00Z"
            }
        });

        let err = decode_entry(&body).unwrap_err();
        assert_eq!(
            err.location,
            vec![
                PathSegment::Field("agent_data".to_string()),
                PathSegment::Field("accelerometer".to_string())
            ]
        );
        assert_eq!(err.message, "missing field `x`");
    }

    #[test]
    fn test_decode_batch_requires_array() {
        let err = decode_batch(&serde_json::json!({"road_state": "NORMAL"})).unwrap_err();
        assert!(err.location.is_empty());
    }
}
