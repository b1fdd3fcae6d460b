//! Error types for telemetry ingestion and storage

use serde::Serialize;
use thiserror::Error;

/// One step in the location of an offending value, e.g. `["body", 0, "agent_data", "timestamp"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Position within a batch
    Index(usize),
    /// Named object field
    Field(String),
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(name.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Field(name) => write!(f, "{}", name),
        }
    }
}

/// A rejected ingestion payload, naming the offending field
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {message}", display_location(.location))]
pub struct ValidationError {
    /// Path from the request body to the offending value
    pub location: Vec<PathSegment>,
    /// Human-readable reason
    pub message: String,
}

fn display_location(location: &[PathSegment]) -> String {
    location
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

impl ValidationError {
    pub fn new<I, S>(location: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self {
            location: location.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Prefix the location with an outer path segment
    pub fn within(mut self, segment: impl Into<PathSegment>) -> Self {
        self.location.insert(0, segment.into());
        self
    }
}

/// Errors surfaced by the record store and the ingestion service
#[derive(Debug, Error)]
pub enum Error {
    /// Payload failed validation; nothing was persisted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No record with the given id
    #[error("Record {0} not found")]
    NotFound(i64),

    /// Store unreachable, constraint violated or write aborted; nothing was committed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_joins_location() {
        let err = ValidationError::new(["agent_data", "timestamp"], "bad value").within(3);
        assert_eq!(err.to_string(), "3.agent_data.timestamp: bad value");
    }

    #[test]
    fn test_location_serializes_mixed_segments() {
        let err = ValidationError::new(["road_state"], "missing").within(0).within("body");
        let json = serde_json::to_value(&err.location).unwrap();
        assert_eq!(json, serde_json::json!(["body", 0, "road_state"]));
    }
}
