//! Axum-based HTTP server.

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shield_ingest::IngestPipeline;
use shield_ledger::DownloadLedger;
use shield_store::ShieldStore;

use crate::handlers;
use crate::metrics::RpcMetrics;
use crate::RpcError;

/// Default request body limit (20 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state for every handler.
pub struct RpcState<S> {
    pub store: Arc<S>,
    pub pipeline: Arc<IngestPipeline<S>>,
    pub ledger: Arc<DownloadLedger<S>>,
    pub metrics: Arc<RpcMetrics>,
    pub max_upload_bytes: usize,
}

/// Build the application router.
pub fn router<S: ShieldStore>(state: Arc<RpcState<S>>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/files/upload/image", post(handlers::upload_image::<S>))
        .route("/files/check/image", post(handlers::check_image::<S>))
        .route("/images/:id", get(handlers::get_image::<S>))
        .route("/images/:id/download", post(handlers::download_image::<S>))
        .route("/users/:id/balance", get(handlers::get_balance::<S>))
        .route("/metrics", get(handlers::metrics::<S>))
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// The HTTP server, configured with a port and shared state.
pub struct RpcServer<S> {
    pub port: u16,
    pub state: Arc<RpcState<S>>,
}

impl<S: ShieldStore> RpcServer<S> {
    pub fn with_state(port: u16, state: Arc<RpcState<S>>) -> Self {
        Self { port, state }
    }

    /// Serve until `shutdown` resolves. In-flight requests are allowed to
    /// finish.
    pub async fn start(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let app = router(Arc::clone(&self.state));
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Internal(format!("failed to bind {addr}: {e}")))?;
        tracing::info!(%addr, "HTTP server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))
    }
}
