//! RPC error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use shield_ingest::IngestError;
use shield_ledger::LedgerError;
use shield_types::{AssetId, Points};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing or invalid x-user-id header")]
    Unauthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upload carries the mark of asset {matched_asset_id}")]
    Conflict {
        matched_asset_id: AssetId,
        matched_asset_name: String,
        score: f64,
    },

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Points, available: Points },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    fn status(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::Conflict { .. } => StatusCode::CONFLICT,
            RpcError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            RpcError::InvalidRequest(_) => "invalid_request",
            RpcError::Unauthenticated => "unauthenticated",
            RpcError::NotFound(_) => "not_found",
            RpcError::Conflict { .. } => "conflict",
            RpcError::InsufficientBalance { .. } => "insufficient_balance",
            RpcError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            RpcError::Conflict {
                matched_asset_id,
                matched_asset_name,
                score,
            } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "matched_asset_id": matched_asset_id.get(),
                "matched_asset_name": matched_asset_name,
                "score": score,
            }),
            RpcError::InsufficientBalance { needed, available } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "needed": needed.get(),
                "available": available.get(),
            }),
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for RpcError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::InvalidUpload(msg) => RpcError::InvalidRequest(msg),
            IngestError::Conflict { evidence, .. } => RpcError::Conflict {
                matched_asset_id: evidence.asset_id,
                matched_asset_name: evidence.asset_name,
                score: evidence.score,
            },
            other @ IngestError::Pipeline { .. } => {
                tracing::error!(error = %other, "ingestion failed");
                RpcError::Internal("upload could not be processed".into())
            }
        }
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AssetNotFound(id) => RpcError::NotFound(format!("asset {id}")),
            LedgerError::AccountNotFound(user) => RpcError::NotFound(format!("account {user}")),
            LedgerError::InsufficientBalance { needed, available } => {
                RpcError::InsufficientBalance { needed, available }
            }
            LedgerError::Storage(e) => {
                tracing::error!(error = %e, "ledger storage failure");
                RpcError::Internal(e.to_string())
            }
        }
    }
}

impl From<shield_store::StoreError> for RpcError {
    fn from(e: shield_store::StoreError) -> Self {
        match e {
            shield_store::StoreError::NotFound(key) => RpcError::NotFound(key),
            other => RpcError::Internal(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for RpcError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        RpcError::InvalidRequest(format!("malformed multipart body: {e}"))
    }
}
