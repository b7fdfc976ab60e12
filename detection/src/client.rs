//! HTTP client for the detection server.
//!
//! The server exposes two multipart endpoints:
//! - `POST /embed`: files `cover`, `watermark`; fields `output_img_path`,
//!   `output_meta_path`. Answers `{"success": bool}`; the artifacts are written
//!   by the server to the requested paths on the shared filesystem.
//! - `POST /check`: files `uploaded`, `cover`, `meta`, `watermark`. Answers
//!   `{"detected": bool, "score": float}` or `{"error": string}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    CheckReport, CheckRequest, DetectionBackend, DetectionError, EmbedRequest, MarkedArtifacts,
};

/// Default request timeout. Detection is compute-heavy, so this is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Detection backend reached over HTTP.
pub struct HttpDetectionBackend {
    base_url: String,
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    detected: Option<bool>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpDetectionBackend {
    /// Create a backend client with the default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DetectionError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a backend client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DetectionError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| DetectionError::RequestFailed(format!("building HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, endpoint: &str, form: Form) -> Result<reqwest::Response, DetectionError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%url, "detection request");
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(classify_send_error)?;

        if !response.status().is_success() {
            tracing::warn!(%url, status = %response.status(), "detection server returned an error status");
            return Err(DetectionError::RequestFailed(format!(
                "{endpoint}: HTTP status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl DetectionBackend for HttpDetectionBackend {
    async fn embed(&self, request: EmbedRequest<'_>) -> Result<MarkedArtifacts, DetectionError> {
        let form = Form::new()
            .part("cover", file_part(request.cover).await?)
            .part("watermark", file_part(request.mark.path()).await?)
            .text("output_img_path", wire_path(request.marked_output))
            .text("output_meta_path", wire_path(request.descriptor_output));

        let body: EmbedResponse = self.post("embed", form).await?.json().await.map_err(|e| {
            DetectionError::InvalidResponse(format!("failed to parse embed response: {e}"))
        })?;

        if let Some(error) = body.error {
            return Err(DetectionError::EmbedRejected(error));
        }
        if !body.success {
            return Err(DetectionError::EmbedRejected("backend reported success=false".into()));
        }

        Ok(MarkedArtifacts {
            content: request.marked_output.to_path_buf(),
            descriptor: request.descriptor_output.to_path_buf(),
        })
    }

    async fn check(&self, request: CheckRequest<'_>) -> Result<CheckReport, DetectionError> {
        let form = Form::new()
            .part("uploaded", file_part(request.probe).await?)
            .part("cover", file_part(request.cover).await?)
            .part("meta", file_part(request.descriptor).await?)
            .part("watermark", file_part(request.mark.path()).await?);

        let body: CheckResponse = self.post("check", form).await?.json().await.map_err(|e| {
            DetectionError::InvalidResponse(format!("failed to parse check response: {e}"))
        })?;
        parse_check(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn parse_check(body: CheckResponse) -> Result<CheckReport, DetectionError> {
    if let Some(error) = body.error {
        return Err(DetectionError::InvalidResponse(error));
    }
    match (body.detected, body.score) {
        (Some(detected), Some(score)) => CheckReport::new(detected, score)
            .ok_or_else(|| DetectionError::InvalidResponse("score is NaN".into())),
        _ => Err(DetectionError::InvalidResponse(
            "check response lacks detected/score".into(),
        )),
    }
}

fn classify_send_error(e: reqwest::Error) -> DetectionError {
    if e.is_timeout() {
        DetectionError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        DetectionError::Unreachable(format!("connection failed: {e}"))
    } else {
        DetectionError::RequestFailed(e.to_string())
    }
}

async fn file_part(path: &Path) -> Result<Part, DetectionError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(name))
}

/// Paths travel with forward slashes regardless of the host platform.
fn wire_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
