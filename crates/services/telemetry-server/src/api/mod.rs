//! HTTP API for the telemetry server
//!
//! - `GET /` - Ping
//! - `POST /processed_agent_data/` - Ingest a batch
//! - `GET /processed_agent_data/` - List records
//! - `GET|PUT|DELETE /processed_agent_data/:id` - Single record
//! - `GET /ws/` - WebSocket push of every accepted batch

pub mod push;
pub mod records;

use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use telemetry_core::{Error, IngestService, PathSegment, SqliteRecordStore, SubscriberRegistry};

use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Ingestion and record operations
    pub service: IngestService,
    /// Connected push subscribers
    pub registry: Arc<SubscriberRegistry>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: IngestService, config: Arc<Config>) -> Self {
        Self {
            registry: Arc::clone(service.registry()),
            service,
            config,
        }
    }

    /// Open the configured store and wire up the ingestion service
    pub fn from_config(config: Arc<Config>) -> telemetry_core::Result<Self> {
        let store = Arc::new(SqliteRecordStore::connect(&config.database.url)?);
        let registry = Arc::new(SubscriberRegistry::new(config.broadcast.send_timeout()));
        Ok(Self::new(IngestService::new(store, registry), config))
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route(
            "/processed_agent_data/",
            get(records::list_records).post(records::create_records),
        )
        .route(
            "/processed_agent_data/:id",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/ws/", get(push::subscribe))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::cors::CorsLayer::permissive()),
        )
}

#[derive(Debug, Serialize)]
struct Ping {
    ping: &'static str,
}

/// Ping endpoint
async fn home() -> Json<Ping> {
    Json(Ping { ping: "pong" })
}

/// One field-level validation failure
#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub loc: Vec<PathSegment>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Error body: `detail` is a message, or a list of field failures for 422
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Message { detail: String },
    Validation { detail: Vec<ValidationDetail> },
}

/// Detail returned for storage failures; the cause is only logged
pub const STORAGE_FAILURE: &str = "Internal storage error";

/// Error returned from handlers, rendered as `(status, JSON body)`
#[derive(Debug)]
pub enum ApiError {
    /// Failure from the ingestion service
    Core(Error),
    /// The `:id` segment could not be extracted
    Path(PathRejection),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl From<telemetry_core::ValidationError> for ApiError {
    fn from(e: telemetry_core::ValidationError) -> Self {
        ApiError::Core(Error::Validation(e))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Path(rejection)
    }
}

fn validation_response(loc: Vec<PathSegment>, msg: String, kind: &'static str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody::Validation {
            detail: vec![ValidationDetail { loc, msg, kind }],
        }),
    )
        .into_response()
}

fn message_response(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(ErrorBody::Message {
            detail: detail.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Core(Error::Validation(e)) => {
                let mut loc = vec![PathSegment::from("body")];
                loc.extend(e.location);
                validation_response(loc, e.message, "value_error")
            }
            ApiError::Core(Error::NotFound(id)) => {
                tracing::debug!(record_id = id, "Record not found");
                message_response(StatusCode::NOT_FOUND, "Item not found")
            }
            ApiError::Core(Error::Storage(msg)) => {
                tracing::error!(error = %msg, "Storage failure");
                message_response(StatusCode::INTERNAL_SERVER_ERROR, STORAGE_FAILURE)
            }
            ApiError::Path(PathRejection::FailedToDeserializePathParams(e))
                if e.status() == StatusCode::BAD_REQUEST =>
            {
                validation_response(
                    vec![PathSegment::from("path"), PathSegment::from("id")],
                    e.body_text(),
                    "type_error",
                )
            }
            ApiError::Path(rejection) => {
                tracing::error!(error = %rejection.body_text(), "Path extraction failed");
                message_response(rejection.status(), &rejection.body_text())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::ValidationError;

    fn test_state() -> AppState {
        let mut config = Config::default();
        config.database.url = ":memory:".to_string();
        AppState::from_config(Arc::new(config)).unwrap()
    }

    #[test]
    fn test_app_state_creation() {
        let state = test_state();
        assert_eq!(state.config.server.port, 8000);
        assert!(state.registry.is_empty());
        assert!(Arc::ptr_eq(&state.registry, state.service.registry()));
    }

    #[tokio::test]
    async fn test_home_pings() {
        let Json(ping) = home().await;
        assert_eq!(serde_json::to_value(ping).unwrap(), serde_json::json!({"ping": "pong"}));
    }

    #[test]
    fn test_validation_error_maps_to_422() {
        let err = ValidationError::new(["agent_data", "timestamp"], "bad").within(0);
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::Core(Error::NotFound(3)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_failure_hides_cause() {
        let response =
            ApiError::Core(Error::Storage("disk I/O error: /var/lib/telemetry.db".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({"detail": STORAGE_FAILURE}));
    }

    #[test]
    fn test_error_body_shapes() {
        let message = ErrorBody::Message {
            detail: "Item not found".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"detail": "Item not found"})
        );

        let validation = ErrorBody::Validation {
            detail: vec![ValidationDetail {
                loc: vec![PathSegment::from("body"), PathSegment::from(0usize)],
                msg: "missing field".to_string(),
                kind: "value_error",
            }],
        };
        assert_eq!(
            serde_json::to_value(&validation).unwrap(),
            serde_json::json!({"detail": [{"loc": ["body", 0], "msg": "missing field", "type": "value_error"}]})
        );
    }
}
