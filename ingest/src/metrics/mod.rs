//! Metrics and instrumentation for block ingestion.
//!
//! Typical usage:
//!
//! ```ignore
//! use ingest::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new("ingest")?;
//! let provider = CompositeStreamFileProvider::new(backends)
//!     .with_metrics(registry.ingest.clone());
//!
//! // Elsewhere, e.g. from an admin endpoint:
//! let body = registry.gather_text();
//! ```

pub mod prometheus;

pub use prometheus::{IngestMetrics, MetricsRegistry};
