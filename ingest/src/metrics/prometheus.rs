//! Prometheus-backed ingest metrics.
//!
//! [`MetricsRegistry`] owns a Prometheus registry and the strongly-typed
//! [`IngestMetrics`] registered in it. Exposition is left to the embedding
//! process through [`MetricsRegistry::gather_text`].

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

/// Block ingestion metrics.
#[derive(Clone)]
pub struct IngestMetrics {
    /// Time to verify one block file in seconds, labelled by `success`.
    pub stream_verification_seconds: HistogramVec,
    /// Delay between a block's last consensus timestamp and its
    /// verification, in seconds.
    pub stream_close_latency_seconds: Histogram,
    pub blocks_verified: IntCounter,
    pub blocks_rejected: IntCounter,
    /// Backends marked unhealthy by the composite provider, labelled by
    /// `provider`.
    pub provider_failovers: IntCounterVec,
}

impl IngestMetrics {
    /// Registers ingest metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let stream_verification_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stream_verification_seconds",
                "Time to verify a block stream file in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["success"],
        )?;
        registry.register(Box::new(stream_verification_seconds.clone()))?;

        let stream_close_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "stream_close_latency_seconds",
                "Delay between the end of a block and its verification in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(stream_close_latency_seconds.clone()))?;

        let blocks_verified = IntCounter::with_opts(Opts::new(
            "blocks_verified",
            "Total number of block files verified and persisted",
        ))?;
        registry.register(Box::new(blocks_verified.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "blocks_rejected",
            "Total number of block files rejected by verification",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let provider_failovers = IntCounterVec::new(
            Opts::new(
                "provider_failovers",
                "Total number of times a stream file provider was marked unhealthy",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_failovers.clone()))?;

        Ok(Self {
            stream_verification_seconds,
            stream_close_latency_seconds,
            blocks_verified,
            blocks_rejected,
            provider_failovers,
        })
    }

    pub(crate) fn observe_verification(&self, success: bool, seconds: f64) {
        let label = if success { "true" } else { "false" };
        self.stream_verification_seconds
            .with_label_values(&[label])
            .observe(seconds);
        if success {
            self.blocks_verified.inc();
        } else {
            self.blocks_rejected.inc();
        }
    }
}

/// Wrapper around a Prometheus registry and the ingest metrics.
///
/// Cheap to clone; clones share the underlying registry.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub ingest: IngestMetrics,
}

impl MetricsRegistry {
    /// Creates a registry whose metric names are prefixed by `namespace`.
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(namespace.to_string()), None)?;
        let ingest = IngestMetrics::register(&registry)?;
        Ok(Self { registry, ingest })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
