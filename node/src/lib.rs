//! Photo Shield node: configuration, wiring, and graceful shutdown.
//!
//! The node owns:
//! - The LMDB store shared by the registry, pipeline, and ledger
//! - The detection backend client
//! - The HTTP API server and its metrics
//! - The shutdown controller

pub mod config;
pub mod error;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{open_store, ShieldNode};
pub use shutdown::ShutdownController;
