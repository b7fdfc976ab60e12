//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! All external dependencies (clock, storage, detection backend) are
//! abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod detector;
pub mod store;

pub use clock::NullClock;
pub use detector::{CheckScript, EmbedMode, NullDetector};
pub use store::NullStore;
