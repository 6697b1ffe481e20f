//! Admin HTTP surface: thin wrappers over the engine primitives.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use virdi_engine::{notifier_from_tag, Engine, EngineError, NotifyError};

/// Buffer size for admin-created consumers that declare neither a limit nor
/// a rate.
const DEFAULT_CONSUMER_BUFFER_LIMIT: u64 = 100;

type AdminError = (StatusCode, Json<ErrorBody>);

/// Builds the admin router over a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/resources/produce", post(produce))
        .route("/resources/consume", post(consume))
        .route("/consumers/create", post(create_consumer))
        .route("/health", get(health))
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
struct ProduceRequest {
    resource_id: String,
    amount: u64,
}

#[derive(Debug, Serialize)]
struct ProduceResponse {
    keep_coming: bool,
}

#[derive(Debug, Deserialize)]
struct ConsumeRequest {
    consumer_id: String,
    amount: u64,
}

#[derive(Debug, Serialize)]
struct ConsumeResponse {
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct CreateConsumerRequest {
    consumer_id: String,
    resource_id: String,
    buffer_limit: Option<u64>,
    max_rate: Option<u32>,
    notifier_type: Option<String>,
    notifier_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ConsumerCreated {
    id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn reject(status: StatusCode, detail: impl Into<String>) -> AdminError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

fn engine_reject(error: &EngineError) -> AdminError {
    let status = if error.is_conflict() {
        StatusCode::CONFLICT
    } else {
        // Not-found lookups and the notifier-backed consume refusal both
        // answer 404, matching the admin contract.
        StatusCode::NOT_FOUND
    };
    error!(%error, "admin request rejected");
    reject(status, error.to_string())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn produce(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<ProduceRequest>,
) -> Result<Json<ProduceResponse>, AdminError> {
    let keep_coming = engine
        .produce(&request.resource_id, request.amount)
        .await
        .map_err(|e| engine_reject(&e))?;
    Ok(Json(ProduceResponse { keep_coming }))
}

async fn consume(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, AdminError> {
    let amount = engine
        .consume_manual(&request.consumer_id, request.amount)
        .await
        .map_err(|e| engine_reject(&e))?;
    Ok(Json(ConsumeResponse { amount }))
}

async fn create_consumer(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<CreateConsumerRequest>,
) -> Result<Json<ConsumerCreated>, AdminError> {
    let notifier = match &request.notifier_type {
        Some(tag) => {
            let config = request
                .notifier_config
                .clone()
                .unwrap_or(serde_json::Value::Null);
            let notifier = notifier_from_tag(tag, &config).map_err(|e| match e {
                NotifyError::UnknownType(_) => {
                    reject(StatusCode::NOT_FOUND, "Notifier type does not exist")
                }
                other => reject(StatusCode::BAD_REQUEST, other.to_string()),
            })?;
            Some(notifier)
        }
        None => None,
    };

    let buffer_limit = request
        .buffer_limit
        .or(request.max_rate.map(u64::from))
        .unwrap_or(DEFAULT_CONSUMER_BUFFER_LIMIT);

    let consumer = engine
        .create_consumer(
            &request.consumer_id,
            &request.resource_id,
            buffer_limit,
            request.max_rate,
            notifier,
        )
        .await
        .map_err(|e| engine_reject(&e))?;

    Ok(Json(ConsumerCreated {
        id: consumer.id().to_string(),
    }))
}
