//! Lightweight in-process metrics.
//!
//! Stored as atomics; callers decide where to expose the rendered text.

pub mod metrics;

pub use metrics::ClientMetrics;
