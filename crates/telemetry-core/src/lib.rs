//! Road telemetry core
//!
//! Validates nested vehicle telemetry (accelerometer + GPS + road-state
//! label), persists it as flat rows, and fans accepted batches out to live
//! subscribers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        telemetry-core                         │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌──────────────────┐                                         │
//! │  │  IngestService   │ ← ingest(batch) / get / list / update   │
//! │  └────────┬─────────┘                                         │
//! │           │ 1. validate      2. create          3. broadcast  │
//! │           ▼                  ▼                  ▼ (detached)  │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐ │
//! │  │  validation  │  │  RecordStore     │  │  Subscriber      │ │
//! │  │              │  │                  │  │  Registry        │ │
//! │  │  (pure)      │  │  (SQLite)        │  │  (bounded queues)│ │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod store;
pub mod validation;

pub use error::{Error, PathSegment, Result, ValidationError};
pub use ingest::{IngestService, Ingested};
pub use model::{Accelerometer, AgentData, Gps, IngestionEntry, NewRecord, ProcessedRecord, Timestamp};
pub use registry::{BroadcastReport, Payload, SubscriberId, SubscriberRegistry};
pub use store::{RecordStore, SqliteRecordStore};
