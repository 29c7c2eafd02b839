//! REST API for the delivery-proof ledger
//!
//! Exposes the chain with its integrity verdict and accepts new delivery
//! proofs. Mining and SQLite access are blocking, so every ledger call runs on
//! the blocking thread pool.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, DeliveryProof, IntegrityReport};
use crate::error::ChainError;
use crate::ledger::Ledger;

/// Shared handler state
#[derive(Clone)]
pub struct Node {
    pub ledger: Arc<Ledger>,
    started: Instant,
}

impl Node {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            started: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match &e {
                    ChainError::Validation(_) => StatusCode::BAD_REQUEST,
                    ChainError::StoreConflict { .. } => StatusCode::CONFLICT,
                    ChainError::MiningTimeout { .. } | ChainError::NotInitialized => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_invalid_index: Option<u64>,
}

/// Body of `POST /upload-proof`. Everything is optional at the serde level so
/// a missing field becomes a 400 with a readable message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProofRequest {
    pub ngo_id: Option<String>,
    pub delivery_id: Option<String>,
    pub photo_url: Option<String>,
    pub temperature: Option<f64>,
    pub notes: Option<String>,
}

impl TryFrom<UploadProofRequest> for DeliveryProof {
    type Error = ApiError;

    fn try_from(req: UploadProofRequest) -> Result<Self, Self::Error> {
        fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ApiError::InvalidInput(format!("{} is required", name)))
        }

        Ok(DeliveryProof {
            ngo_id: required(req.ngo_id, "ngoId")?,
            delivery_id: required(req.delivery_id, "deliveryId")?,
            photo_url: required(req.photo_url, "photoUrl")?,
            temperature: req.temperature,
            notes: req.notes,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    height: u64,
    tip_hash: Option<String>,
    uptime_seconds: u64,
    timestamp: String,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Runs a ledger operation on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ChainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalError(format!("Ledger task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/chain", get(get_chain))
        .route("/chain/verify", get(verify_chain))
        .route("/chain/block/:index", get(get_block_by_index))
        .route("/upload-proof", post(upload_proof))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `addr` until the listener fails.
pub async fn run_api_server(node: Arc<Node>, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "api.listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn get_chain(State(node): State<Arc<Node>>) -> Result<Json<ChainResponse>, ApiError> {
    let ledger = node.ledger.clone();
    let (chain, report) = run_blocking(move || ledger.get_chain_with_report()).await?;

    Ok(Json(ChainResponse {
        chain,
        is_valid: report.valid,
        first_invalid_index: report.first_invalid_index,
    }))
}

async fn verify_chain(State(node): State<Arc<Node>>) -> Result<Json<IntegrityReport>, ApiError> {
    let ledger = node.ledger.clone();
    run_blocking(move || ledger.verify_chain_integrity())
        .await
        .map(Json)
}

async fn get_block_by_index(
    State(node): State<Arc<Node>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    let ledger = node.ledger.clone();
    run_blocking(move || ledger.get_block(index))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", index)))
        .map(Json)
}

async fn upload_proof(
    State(node): State<Arc<Node>>,
    payload: Result<Json<UploadProofRequest>, JsonRejection>,
) -> Result<Json<Block>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let proof = DeliveryProof::try_from(request)?;

    let ledger = node.ledger.clone();
    let block = run_blocking(move || ledger.append_proof(&proof)).await?;
    Ok(Json(block))
}

async fn health_check(State(node): State<Arc<Node>>) -> Result<Json<HealthResponse>, ApiError> {
    let ledger = node.ledger.clone();
    let tip = run_blocking(move || ledger.tip()).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        height: tip.as_ref().map(|b| b.index + 1).unwrap_or(0),
        tip_hash: tip.map(|b| b.hash),
        uptime_seconds: node.started.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_requires_fields() {
        let req = UploadProofRequest {
            ngo_id: Some("n1".into()),
            delivery_id: Some("d1".into()),
            photo_url: None,
            ..Default::default()
        };
        match DeliveryProof::try_from(req) {
            Err(ApiError::InvalidInput(msg)) => assert!(msg.contains("photoUrl")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.ngo_id)),
        }
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = ApiError::from(ChainError::Validation("bad".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            ApiError::from(ChainError::MiningTimeout { attempts: 1, elapsed_ms: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
