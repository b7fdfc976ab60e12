//! HTTP API of the Photo Shield service.
//!
//! Provides endpoints for:
//! - Upload with verification and marking, and check-only verification
//! - Asset metadata
//! - Paid downloads and balances
//! - Prometheus metrics and health

pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod server;

pub use error::RpcError;
pub use identity::{CallerId, USER_ID_HEADER};
pub use metrics::RpcMetrics;
pub use server::{router, RpcServer, RpcState, DEFAULT_MAX_UPLOAD_BYTES};
