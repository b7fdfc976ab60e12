//! HTTP request handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use shield_ingest::{IngestError, Upload};
use shield_ledger::DownloadOutcome;
use shield_store::ShieldStore;
use shield_types::{Asset, AssetId, ContentRef, Points, UserId};

use crate::identity::CallerId;
use crate::server::RpcState;
use crate::RpcError;

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AssetResponse {
    pub id: u64,
    pub file_url: String,
    pub original_url: String,
    pub meta_url: Option<String>,
    pub caption: String,
    pub category: String,
    pub points: u64,
    pub owner: u64,
    pub created_at: u64,
}

impl From<&Asset> for AssetResponse {
    fn from(asset: &Asset) -> Self {
        Self {
            id: asset.id.get(),
            file_url: url(&asset.content),
            original_url: url(&asset.original),
            meta_url: asset.mark_descriptor.as_ref().map(url),
            caption: asset.caption.clone(),
            category: asset.category.clone(),
            points: asset.price.get(),
            owner: asset.owner.get(),
            created_at: asset.created_at.as_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub status: &'static str,
    pub checked: u32,
    pub inconclusive: u32,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
    pub download_url: String,
    pub points_spent: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: u64,
    pub points: u64,
}

/// Public URL of stored content, served from the content root.
fn url(content: &ContentRef) -> String {
    format!("/{}", content.as_str())
}

// ── Multipart ────────────────────────────────────────────────────────────

#[derive(Default)]
struct UploadForm {
    image: Option<(String, Vec<u8>)>,
    caption: String,
    category: String,
    points: u64,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, RpcError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.image = Some((file_name, bytes.to_vec()));
            }
            "caption" => form.caption = field.text().await?,
            "category" => form.category = field.text().await?,
            "points" => {
                let text = field.text().await?;
                form.points = text.trim().parse().map_err(|_| {
                    RpcError::InvalidRequest(format!("points must be a non-negative integer, got {text:?}"))
                })?;
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(form)
}

fn record_scan<S>(state: &RpcState<S>, elapsed: Duration, inconclusive: u32) {
    state
        .metrics
        .scan_duration_ms
        .observe(elapsed.as_secs_f64() * 1000.0);
    state
        .metrics
        .candidate_checks_inconclusive
        .inc_by(u64::from(inconclusive));
}

fn record_ingest_error<S>(state: &RpcState<S>, e: &IngestError) {
    match e {
        IngestError::Conflict {
            inconclusive,
            elapsed,
            ..
        } => {
            state.metrics.uploads_rejected.inc();
            record_scan(state, *elapsed, *inconclusive);
        }
        IngestError::Pipeline { .. } => state.metrics.uploads_failed.inc(),
        IngestError::InvalidUpload(_) => {}
    }
}

/// Run a blocking store read off the async runtime.
async fn blocking<T, F>(task: F) -> Result<T, RpcError>
where
    F: FnOnce() -> Result<T, RpcError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| RpcError::Internal(format!("store task failed: {e}")))?
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// `POST /files/upload/image`
pub async fn upload_image<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
    CallerId(owner): CallerId,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AssetResponse>), RpcError> {
    let form = read_form(multipart).await?;
    let (file_name, bytes) = form
        .image
        .ok_or_else(|| RpcError::InvalidRequest("file is required".into()))?;
    let upload = Upload {
        file_name,
        bytes,
        caption: form.caption,
        category: form.category,
        price: Points::new(form.points),
        owner,
    };

    // Detached from the request: a disconnecting client must not abort a
    // run halfway through its rollback.
    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::spawn(async move { pipeline.ingest(upload).await })
        .await
        .map_err(|e| RpcError::Internal(format!("ingestion task failed: {e}")))?;

    match result {
        Ok(ingested) => {
            state.metrics.uploads_committed.inc();
            let report = &ingested.report;
            record_scan(&state, report.elapsed, report.inconclusive);
            Ok((StatusCode::CREATED, Json(AssetResponse::from(&ingested.asset))))
        }
        Err(e) => {
            record_ingest_error(&state, &e);
            Err(e.into())
        }
    }
}

/// `POST /files/check/image`
pub async fn check_image<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
    multipart: Multipart,
) -> Result<Json<CheckResponse>, RpcError> {
    let form = read_form(multipart).await?;
    let (file_name, bytes) = form
        .image
        .ok_or_else(|| RpcError::InvalidRequest("file is required".into()))?;
    state.metrics.probe_checks.inc();

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::spawn(async move { pipeline.check(&file_name, &bytes).await })
        .await
        .map_err(|e| RpcError::Internal(format!("check task failed: {e}")))?;

    match result {
        Ok(report) => {
            record_scan(&state, report.elapsed, report.inconclusive);
            Ok(Json(CheckResponse {
                status: "safe",
                checked: report.checked,
                inconclusive: report.inconclusive,
            }))
        }
        Err(e) => {
            if let IngestError::Conflict {
                inconclusive,
                elapsed,
                ..
            } = &e
            {
                record_scan(&state, *elapsed, *inconclusive);
            }
            Err(e.into())
        }
    }
}

/// `GET /images/:id`
pub async fn get_image<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
    Path(id): Path<u64>,
) -> Result<Json<AssetResponse>, RpcError> {
    let store = Arc::clone(&state.store);
    let asset = blocking(move || Ok(store.get_asset(AssetId::new(id))?)).await?;
    Ok(Json(AssetResponse::from(&asset)))
}

/// `POST /images/:id/download`
pub async fn download_image<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
    CallerId(downloader): CallerId,
    Path(id): Path<u64>,
) -> Result<Json<DownloadResponse>, RpcError> {
    let ledger = Arc::clone(&state.ledger);
    let result = tokio::task::spawn_blocking(move || ledger.download(downloader, AssetId::new(id)))
        .await
        .map_err(|e| RpcError::Internal(format!("download task failed: {e}")))?;

    let grant = match result {
        Ok(grant) => grant,
        Err(e) => {
            if matches!(e, shield_ledger::LedgerError::InsufficientBalance { .. }) {
                state.metrics.downloads_refused.inc();
            }
            return Err(e.into());
        }
    };
    match grant.outcome {
        DownloadOutcome::Charged { price } => {
            state.metrics.downloads_charged.inc();
            state.metrics.points_transferred.inc_by(price.get());
        }
        DownloadOutcome::AlreadyDownloaded => state.metrics.downloads_repeat.inc(),
        DownloadOutcome::OwnerFreeAccess => state.metrics.downloads_owner.inc(),
    }
    Ok(Json(DownloadResponse {
        outcome: grant.outcome,
        download_url: url(&grant.content),
        points_spent: grant.outcome.points_spent().get(),
    }))
}

/// `GET /users/:id/balance`
pub async fn get_balance<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
    Path(id): Path<u64>,
) -> Result<Json<BalanceResponse>, RpcError> {
    let user = UserId::new(id);
    let ledger = Arc::clone(&state.ledger);
    let points = blocking(move || Ok(ledger.balance(user)?)).await?;
    Ok(Json(BalanceResponse {
        user_id: user.get(),
        points: points.get(),
    }))
}

/// `GET /metrics`
pub async fn metrics<S: ShieldStore>(
    State(state): State<Arc<RpcState<S>>>,
) -> Result<impl IntoResponse, RpcError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
