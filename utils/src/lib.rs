//! Shared utilities for Photo Shield services.

pub mod logging;

pub use logging::{init_logging, LogFormat, UnknownLogFormat};
