//! Ingestion service
//!
//! Orchestrates validate → persist → broadcast for each incoming batch and
//! exposes the by-id record operations to the gateway.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::model::{IngestionEntry, ProcessedRecord};
use crate::registry::{BroadcastReport, Payload, SubscriberRegistry};
use crate::store::RecordStore;
use crate::validation::{decode_batch, decode_entry, validate_batch, validate_entry};

/// Result of an accepted batch
#[derive(Debug)]
pub struct Ingested {
    /// Generated ids, one per entry in input order
    pub ids: Vec<i64>,
    /// Detached delivery to subscribers, if a broadcast was started
    pub delivery: Option<JoinHandle<BroadcastReport>>,
}

/// Write path for telemetry batches
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn RecordStore>,
    registry: Arc<SubscriberRegistry>,
}

impl IngestService {
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Validate, persist and publish a batch, returning the generated ids
    ///
    /// Returns once the rows are committed; delivery to subscribers continues
    /// in the background.
    pub async fn ingest(&self, batch: Vec<IngestionEntry>) -> Result<Vec<i64>> {
        Ok(self.submit(batch).await?.ids)
    }

    /// Like [`ingest`](Self::ingest) but hands back the delivery task
    pub async fn submit(&self, batch: Vec<IngestionEntry>) -> Result<Ingested> {
        self.commit(&batch, || serde_json::to_string(&batch)).await
    }

    /// Decode an untyped request body, then ingest it
    pub async fn ingest_json(&self, body: Value) -> Result<Vec<i64>> {
        Ok(self.submit_json(body).await?.ids)
    }

    /// Like [`submit`](Self::submit) for an untyped body
    ///
    /// Subscribers receive the body exactly as the client sent it, so number
    /// formatting and unknown fields survive the round trip.
    pub async fn submit_json(&self, body: Value) -> Result<Ingested> {
        let batch = decode_batch(&body)?;
        self.commit(&batch, || Ok(body.to_string())).await
    }

    async fn commit(
        &self,
        batch: &[IngestionEntry],
        encode: impl FnOnce() -> serde_json::Result<String>,
    ) -> Result<Ingested> {
        let rows = validate_batch(batch)?;
        let ids = self.store.create(rows).await?;
        tracing::info!(count = ids.len(), "Persisted telemetry batch");

        let delivery = if batch.is_empty() {
            None
        } else {
            self.publish(encode)
        };
        Ok(Ingested { ids, delivery })
    }

    /// Replace the fields of an existing record from one ingestion entry
    pub async fn update(&self, id: i64, entry: &IngestionEntry) -> Result<ProcessedRecord> {
        let fields = validate_entry(entry)?;
        let record = self.store.update(id, fields).await?;
        tracing::info!(record_id = id, "Updated telemetry record");
        Ok(record)
    }

    /// Decode an untyped request body as one entry, then update
    pub async fn update_json(&self, id: i64, body: Value) -> Result<ProcessedRecord> {
        let entry = decode_entry(&body)?;
        self.update(id, &entry).await
    }

    pub async fn get(&self, id: i64) -> Result<ProcessedRecord> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<ProcessedRecord>> {
        self.store.list().await
    }

    pub async fn delete(&self, id: i64) -> Result<ProcessedRecord> {
        let record = self.store.delete(id).await?;
        tracing::info!(record_id = id, "Deleted telemetry record");
        Ok(record)
    }

    fn publish(
        &self,
        encode: impl FnOnce() -> serde_json::Result<String>,
    ) -> Option<JoinHandle<BroadcastReport>> {
        if self.registry.is_empty() {
            return None;
        }

        let payload: Payload = match encode() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize batch for subscribers");
                return None;
            }
        };

        let registry = Arc::clone(&self.registry);
        Some(tokio::spawn(async move { registry.broadcast(payload).await }))
    }
}
