//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use shield_utils::LogFormat;

use crate::NodeError;

/// Configuration for a Photo Shield node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Public content root. Originals, marked images, and descriptors live
    /// under `uploads/` inside it.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// The canonical protection mark embedded into every published image.
    #[serde(default = "default_protection_mark")]
    pub protection_mark: PathBuf,

    /// Base URL of the detection server.
    #[serde(default = "default_detection_url")]
    pub detection_url: String,

    /// Per-request timeout for detection calls, in seconds.
    #[serde(default = "default_detection_timeout_secs")]
    pub detection_timeout_secs: u64,

    /// HTTP API port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Request body limit for uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Candidates fetched per registry read during a scan.
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./shield_data")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}

fn default_protection_mark() -> PathBuf {
    PathBuf::from("./public/assets/logo-watermark.png")
}

fn default_detection_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_detection_timeout_secs() -> u64 {
    600
}

fn default_rpc_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    shield_rpc::DEFAULT_MAX_UPLOAD_BYTES
}

fn default_scan_page_size() -> usize {
    shield_verification::DEFAULT_SCAN_PAGE_SIZE
}

fn default_lmdb_map_size() -> usize {
    1024 * 1024 * 1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Smallest LMDB map the node will open.
const MIN_LMDB_MAP_SIZE: usize = 1024 * 1024;

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format
            .parse()
            .map_err(|e: shield_utils::UnknownLogFormat| NodeError::Config(e.to_string()))
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_secs(self.detection_timeout_secs)
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if !(self.detection_url.starts_with("http://") || self.detection_url.starts_with("https://"))
        {
            return Err(NodeError::Config(format!(
                "detection_url must be an http(s) URL, got {:?}",
                self.detection_url
            )));
        }
        if self.detection_timeout_secs == 0 {
            return Err(NodeError::Config("detection_timeout_secs must be positive".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(NodeError::Config("max_upload_bytes must be positive".into()));
        }
        if self.scan_page_size == 0 {
            return Err(NodeError::Config("scan_page_size must be positive".into()));
        }
        if self.lmdb_map_size < MIN_LMDB_MAP_SIZE {
            return Err(NodeError::Config(format!(
                "lmdb_map_size must be at least {MIN_LMDB_MAP_SIZE} bytes"
            )));
        }
        self.log_format()?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            public_dir: default_public_dir(),
            protection_mark: default_protection_mark(),
            detection_url: default_detection_url(),
            detection_timeout_secs: default_detection_timeout_secs(),
            rpc_port: default_rpc_port(),
            max_upload_bytes: default_max_upload_bytes(),
            scan_page_size: default_scan_page_size(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
