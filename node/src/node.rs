//! The Photo Shield node: wires storage, detection, verification,
//! ingestion, the ledger, and the HTTP API together.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use shield_detection::{DetectionBackend, HttpDetectionBackend, ProtectionMark};
use shield_ingest::{IngestPipeline, StorageLayout};
use shield_ledger::DownloadLedger;
use shield_rpc::{RpcError, RpcMetrics, RpcServer, RpcState};
use shield_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use shield_types::{Clock, SystemClock};
use shield_verification::VerificationOrchestrator;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

/// Number of named LMDB databases.
const MAX_DBS: u32 = 8;
/// How long `stop` waits for in-flight requests to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ShieldNode {
    config: NodeConfig,
    store: Arc<LmdbEnvironment>,
    state: Arc<RpcState<LmdbEnvironment>>,
    shutdown: Arc<ShutdownController>,
    server: Option<JoinHandle<Result<(), RpcError>>>,
}

impl ShieldNode {
    /// Build a node that talks to the detection server named in `config`.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let backend =
            HttpDetectionBackend::with_timeout(&config.detection_url, config.detection_timeout())?;
        tracing::info!(url = %backend.base_url(), "detection backend configured");
        Self::with_backend(config, Arc::new(backend))
    }

    /// Build a node around an already constructed detection backend.
    pub fn with_backend(
        config: NodeConfig,
        backend: Arc<dyn DetectionBackend>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let store = Arc::new(open_store(&config)?);

        let mark = ProtectionMark::load(&config.protection_mark)?;
        let layout = StorageLayout::create(&config.public_dir)?;
        tracing::debug!(root = %layout.root().display(), "content root ready");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let orchestrator = Arc::new(
            VerificationOrchestrator::new(
                Arc::clone(&store),
                backend,
                mark,
                layout.root(),
            )
            .with_page_size(config.scan_page_size),
        );
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&store),
            orchestrator,
            layout,
            Arc::clone(&clock),
        ));
        let ledger = Arc::new(DownloadLedger::new(Arc::clone(&store), clock));

        let state = Arc::new(RpcState {
            store: Arc::clone(&store),
            pipeline,
            ledger,
            metrics: Arc::new(RpcMetrics::new()),
            max_upload_bytes: config.max_upload_bytes,
        });

        Ok(Self {
            config,
            store,
            state,
            shutdown: Arc::new(ShutdownController::new()),
            server: None,
        })
    }

    /// Serve the HTTP API until a shutdown signal arrives.
    ///
    /// Returns early with an error if the server exits on its own, e.g.
    /// because the port is taken.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        tracing::info!(
            port = self.config.rpc_port,
            data_dir = %self.config.data_dir.display(),
            public_dir = %self.config.public_dir.display(),
            "Photo Shield node starting"
        );

        let server = RpcServer::with_state(self.config.rpc_port, Arc::clone(&self.state));
        let shutdown = self.shutdown.signalled();
        let mut handle = tokio::spawn(async move {
            let result = server.start(shutdown).await;
            match &result {
                Ok(()) => tracing::info!("HTTP server exited"),
                Err(e) => tracing::error!("HTTP server error: {e}"),
            }
            result
        });

        tokio::select! {
            _ = self.shutdown.wait_for_signal() => {
                self.server = Some(handle);
                Ok(())
            }
            joined = &mut handle => {
                self.shutdown.shutdown();
                match joined {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(NodeError::Rpc(e.to_string())),
                    Err(e) => Err(NodeError::Rpc(format!("server task failed: {e}"))),
                }
            }
        }
    }

    /// Stop serving, flush storage, and wait for in-flight requests.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        self.shutdown.shutdown();

        let drained = match self.server.take() {
            Some(handle) => tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_ok(),
            None => true,
        };

        if let Err(e) = self.store.env().force_sync() {
            tracing::warn!("LMDB force_sync failed: {e}");
        } else {
            tracing::info!("LMDB flushed to disk");
        }

        if !drained {
            tracing::warn!(
                "shutdown timeout ({:?}), some requests may still be running",
                SHUTDOWN_TIMEOUT
            );
            return Err(NodeError::ShutdownTimeout);
        }
        tracing::info!("Photo Shield node stopped");
        Ok(())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LmdbEnvironment> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline<LmdbEnvironment>> {
        &self.state.pipeline
    }

    pub fn ledger(&self) -> &Arc<DownloadLedger<LmdbEnvironment>> {
        &self.state.ledger
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        &self.state.metrics
    }

    /// Handle for triggering shutdown from outside `start`.
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }
}

/// Open the LMDB environment named in `config` and report on its health.
///
/// Integrity problems are logged, not fatal: the operator decides.
pub fn open_store(config: &NodeConfig) -> Result<LmdbEnvironment, NodeError> {
    check_data_dir(&config.data_dir).map_err(NodeError::Storage)?;
    let store = LmdbEnvironment::open(&config.data_dir, MAX_DBS, config.lmdb_map_size)?;

    let report = check_integrity(&store)?;
    if report.is_healthy() {
        tracing::info!(
            databases = report.databases_checked,
            entries = report.total_entries,
            "LMDB integrity check passed"
        );
    } else {
        for error in &report.errors {
            tracing::warn!(%error, "LMDB integrity problem");
        }
    }
    Ok(store)
}
