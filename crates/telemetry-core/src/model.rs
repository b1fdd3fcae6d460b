//! Telemetry data model
//!
//! Ingestion payloads arrive nested (`road_state` + `agent_data` with
//! accelerometer, GPS and timestamp) and are flattened into one
//! [`ProcessedRecord`] row per entry before storage.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Accelerometer reading, one value per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// GPS fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
}

/// Timestamp as supplied by the client
///
/// Decoding never fails on the timestamp itself; the raw JSON value is kept
/// and checked by the validator so a bad timestamp is reported with the
/// expected format rather than as a shape error.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    /// Already-typed instant (programmatic callers)
    Typed(DateTime<Utc>),
    /// Value exactly as received on the wire
    Raw(serde_json::Value),
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Typed(dt)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Timestamp::Raw(serde_json::Value::String(s.to_string()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::Typed(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Timestamp::Raw(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Timestamp::Raw)
    }
}

/// Sensor block of an ingestion entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentData {
    pub accelerometer: Accelerometer,
    pub gps: Gps,
    pub timestamp: Timestamp,
}

/// One entry of an ingestion batch, in the nested shape clients send and
/// subscribers receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEntry {
    pub road_state: String,
    pub agent_data: AgentData,
}

/// A validated, flattened row that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub road_state: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl NewRecord {
    /// Attach a store-assigned id
    pub fn with_id(self, id: i64) -> ProcessedRecord {
        ProcessedRecord {
            id,
            road_state: self.road_state,
            x: self.x,
            y: self.y,
            z: self.z,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
        }
    }
}

/// A persisted telemetry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: i64,
    pub road_state: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl ProcessedRecord {
    /// The mutable fields of this record
    pub fn fields(&self) -> NewRecord {
        NewRecord {
            road_state: self.road_state.clone(),
            x: self.x,
            y: self.y,
            z: self.z,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
        }
    }
}
