//! Prometheus metrics for the Photo Shield service.
//!
//! [`RpcMetrics`] owns a dedicated [`Registry`] that the `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Central collection of all service-level Prometheus metrics.
pub struct RpcMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Ingestion ───────────────────────────────────────────────────────
    pub uploads_committed: IntCounter,
    /// Uploads refused because they carry the mark of a published asset.
    pub uploads_rejected: IntCounter,
    /// Uploads rolled back after an unexpected failure.
    pub uploads_failed: IntCounter,
    pub probe_checks: IntCounter,
    /// Candidates skipped because the detection backend failed on them.
    pub candidate_checks_inconclusive: IntCounter,

    // ── Downloads ───────────────────────────────────────────────────────
    pub downloads_charged: IntCounter,
    pub downloads_repeat: IntCounter,
    pub downloads_owner: IntCounter,
    /// Downloads refused for insufficient balance.
    pub downloads_refused: IntCounter,
    pub points_transferred: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Duration of one verification scan, in milliseconds.
    pub scan_duration_ms: Histogram,
}

impl RpcMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
                .expect("metric names are unique and valid")
        };

        let uploads_committed = counter(
            "shield_uploads_committed_total",
            "Uploads verified, marked, and committed as assets",
        );
        let uploads_rejected = counter(
            "shield_uploads_rejected_total",
            "Uploads rejected because they carry an existing mark",
        );
        let uploads_failed = counter(
            "shield_uploads_failed_total",
            "Uploads rolled back after a pipeline failure",
        );
        let probe_checks = counter(
            "shield_probe_checks_total",
            "Check-only verification requests",
        );
        let candidate_checks_inconclusive = counter(
            "shield_candidate_checks_inconclusive_total",
            "Candidate checks skipped because the detection backend failed",
        );
        let downloads_charged = counter(
            "shield_downloads_charged_total",
            "Downloads that moved points from downloader to owner",
        );
        let downloads_repeat = counter(
            "shield_downloads_repeat_total",
            "Downloads of an already purchased asset",
        );
        let downloads_owner = counter(
            "shield_downloads_owner_total",
            "Downloads by the asset owner",
        );
        let downloads_refused = counter(
            "shield_downloads_refused_total",
            "Downloads refused for insufficient balance",
        );
        let points_transferred = counter(
            "shield_points_transferred_total",
            "Points moved from downloaders to owners",
        );

        // Exponential buckets covering 1 ms → ~65 s.
        let scan_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "shield_scan_duration_ms",
                "Verification scan duration in milliseconds"
            )
            .buckets(
                prometheus::exponential_buckets(1.0, 2.0, 17)
                    .expect("bucket parameters are valid")
            ),
            registry
        )
        .expect("failed to register scan_duration_ms histogram");

        Self {
            registry,
            uploads_committed,
            uploads_rejected,
            uploads_failed,
            probe_checks,
            candidate_checks_inconclusive,
            downloads_charged,
            downloads_repeat,
            downloads_owner,
            downloads_refused,
            points_transferred,
            scan_duration_ms,
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for RpcMetrics {
    fn default() -> Self {
        Self::new()
    }
}
