//! HTTP surface of the ledger.
//!
//! | method | path                                 | success                 |
//! |--------|--------------------------------------|-------------------------|
//! | POST   | `/api/v1/wallet`                     | 201 `{id, balance}`     |
//! | POST   | `/api/v1/wallet/:wallet_id/send`     | 200, empty body         |
//! | GET    | `/api/v1/wallet/:wallet_id/history`  | 200 `[{from, to, amount, time}]` |
//! | GET    | `/api/v1/wallet/:wallet_id`          | 200 `{id, balance}`     |
//!
//! A missing source wallet is 404; a missing destination wallet or a rejected
//! transfer is 400. Store failures are 500 and never stop the process.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::Amount;
use crate::engine::{Engine, EngineError, TransferError};
use crate::model::{HistoryEntry, TransferRequest, Wallet, WalletId};

/// Build the router over a shared engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/v1/wallet", post(create_wallet))
        .route("/api/v1/wallet/:wallet_id", get(get_wallet))
        .route("/api/v1/wallet/:wallet_id/send", post(send))
        .route("/api/v1/wallet/:wallet_id/history", get(history))
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
struct SendBody {
    to: WalletId,
    amount: Amount,
}

/// Error response. Only malformed input carries a body.
#[derive(Debug)]
pub enum ApiError {
    Malformed(String),
    BadRequest,
    NotFound,
    Internal,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) | EngineError::Transfer(TransferError::SourceNotFound(_)) => {
                ApiError::NotFound
            }
            EngineError::Transfer(TransferError::DestinationUnavailable(_))
            | EngineError::Transfer(TransferError::InvalidTransfer { .. }) => ApiError::BadRequest,
            EngineError::Transfer(TransferError::Store(_))
            | EngineError::Store(_)
            | EngineError::Entropy(_)
            | EngineError::IdSpaceExhausted { .. } => {
                error!(reason = %e, "request failed");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "malformed request body");
        ApiError::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Malformed(reason) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
            }
            ApiError::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn create_wallet(
    State(engine): State<Arc<Engine>>,
) -> Result<(StatusCode, Json<Wallet>), ApiError> {
    let wallet = engine.create_wallet().await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

async fn get_wallet(
    State(engine): State<Arc<Engine>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<Wallet>, ApiError> {
    let wallet = engine.wallet(&WalletId::from(wallet_id)).await?;
    Ok(Json(wallet))
}

async fn send(
    State(engine): State<Arc<Engine>>,
    Path(wallet_id): Path<String>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    let request = TransferRequest::new(wallet_id, body.to, body.amount);
    engine.transfer(request).await?;
    Ok(StatusCode::OK)
}

async fn history(
    State(engine): State<Arc<Engine>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let entries = engine.history(&WalletId::from(wallet_id)).await?;
    Ok(Json(entries))
}
