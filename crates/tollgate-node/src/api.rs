//! HTTP API for the Tollgate node.
//!
//! Public surface: a liveness probe, address generation, and payment status
//! checks. Admin
//! surface: immediate scan and operator-driven sweep retry. Both the
//! generate endpoint and the admin endpoints are guarded by the `X-Api-Key`
//! allow-list.
//!
//! The payment endpoints keep the legacy response contract: outcomes are
//! carried in the body (`{"status": …}` / `{"error": …}`), and a chain node
//! outage during generation is reported as a success-shaped error body.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tollgate_core::{Address, Wei};
use tollgate_engine::{CheckOutcome, IssueError, SweepError};

use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({ "error": message }))
}

// --- Handlers ---

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    if !state.key_is_valid(api_key(&headers)) {
        return (StatusCode::UNAUTHORIZED, error_body("invalid api key"));
    }

    let Ok(Json(body)) = payload else {
        return (StatusCode::BAD_REQUEST, error_body("amount is required"));
    };
    let Some(raw_amount) = body.get("amount") else {
        return (StatusCode::BAD_REQUEST, error_body("amount is required"));
    };
    let amount: Wei = match serde_json::from_value(raw_amount.clone()) {
        Ok(amount) => amount,
        Err(_) => return (StatusCode::BAD_REQUEST, error_body("invalid amount")),
    };

    // Probe the chain node before issuing: an address nobody can ever poll
    // is worse than telling the caller to come back.
    if let Err(e) = state.chain.client_version().await {
        tracing::warn!(error = %e, "chain node unreachable, refusing to issue");
        return (StatusCode::OK, error_body("blockchain node unreachable"));
    }

    match state.issuer.issue(amount) {
        Ok(issued) => (
            StatusCode::OK,
            Json(json!({
                "payment_address": issued.address.to_checksum(),
                "valid_until": issued.expires_at.timestamp(),
            })),
        ),
        Err(IssueError::InvalidAmount(msg)) => (StatusCode::BAD_REQUEST, error_body(&msg)),
        Err(e) => {
            tracing::error!(error = %e, "address issuance failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("failed to issue payment address"),
            )
        }
    }
}

async fn handle_check(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> (StatusCode, Json<Value>) {
    let Ok(address) = Address::from_str(&address) else {
        return (StatusCode::OK, error_body("Invalid payment address"));
    };

    let body = match state.ledger.check(address, chrono::Utc::now()) {
        CheckOutcome::Confirmed { balance } => {
            json!({ "status": "1", "balance": balance })
        }
        CheckOutcome::Pending => json!({ "status": "0" }),
        CheckOutcome::Expired => json!({ "error": "Payment expired" }),
        CheckOutcome::Unknown => json!({ "error": "Invalid payment address" }),
    };
    (StatusCode::OK, Json(body))
}

async fn handle_scan_now(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !state.key_is_valid(api_key(&headers)) {
        return (StatusCode::UNAUTHORIZED, error_body("invalid api key"));
    }

    let summary = state.scheduler.scan_once().await;
    (
        StatusCode::OK,
        Json(serde_json::to_value(summary).unwrap_or_else(|_| json!({}))),
    )
}

async fn handle_sweep_address(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    if !state.key_is_valid(api_key(&headers)) {
        return (StatusCode::UNAUTHORIZED, error_body("invalid api key"));
    }

    let Ok(Json(body)) = payload else {
        return (StatusCode::BAD_REQUEST, error_body("address is required"));
    };
    let Some(raw_address) = body.get("address").and_then(Value::as_str) else {
        return (StatusCode::BAD_REQUEST, error_body("address is required"));
    };
    let Ok(address) = Address::from_str(raw_address) else {
        return (StatusCode::BAD_REQUEST, error_body("Invalid payment address"));
    };

    match state.sweeper.sweep_with_fresh_balance(address).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "address": receipt.address,
                "tx_hash": receipt.tx_hash,
                "net_amount": receipt.net_amount,
                "fee_reserve": receipt.fee_reserve,
            })),
        ),
        Err(e) => sweep_error_response(e),
    }
}

/// Error displays never carry key material, so they are safe to return.
fn sweep_error_response(err: SweepError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        SweepError::NotFound(_) => StatusCode::NOT_FOUND,
        SweepError::AlreadySettling(_)
        | SweepError::NotSweepable { .. }
        | SweepError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        SweepError::Chain(_) | SweepError::BroadcastFailed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_body(&err.to_string()))
}

// --- Router ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/generate_payment_address", post(handle_generate))
        .route("/check_payment/{address}", get(handle_check))
        .route("/admin/scan_now", post(handle_scan_now))
        .route("/admin/sweep_address", post(handle_sweep_address))
        .with_state(state)
}
