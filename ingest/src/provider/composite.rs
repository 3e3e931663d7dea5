//! Ordered failover across stream file providers.
//!
//! Each backend carries a readmit time. Calls go to the first healthy
//! backend; a retryable failure marks it unhealthy for its backoff and the
//! call moves on to the next healthy one. The last healthy backend is never
//! marked, so a later call always has somewhere to go.
//!
//! Health is shared by all concurrent callers. A backend becomes healthy
//! again lazily, the first time someone checks it after its readmit time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{ProviderError, StreamFileProvider};
use crate::metrics::IngestMetrics;
use crate::types::{ConsensusNode, StreamFileData, StreamFilename};

/// One backend and its health.
struct ProviderHealth {
    provider: Box<dyn StreamFileProvider>,
    backoff: Duration,
    /// Milliseconds since the composite's epoch, plus one, at which the
    /// backend is readmitted. Zero means healthy.
    readmit_at: AtomicU64,
}

impl ProviderHealth {
    fn is_healthy(&self, now_millis: u64) -> bool {
        let readmit_at = self.readmit_at.load(Ordering::Acquire);
        if readmit_at == 0 {
            return true;
        }
        if readmit_at - 1 <= now_millis {
            // Losing the race means another caller already readmitted it.
            let _ = self.readmit_at.compare_exchange(
                readmit_at,
                0,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            return true;
        }
        false
    }

    fn mark_unhealthy(&self, now_millis: u64) {
        let backoff = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        let readmit_at = now_millis.saturating_add(backoff).saturating_add(1);
        self.readmit_at.store(readmit_at, Ordering::Release);
    }
}

pub struct CompositeStreamFileProvider {
    providers: Vec<ProviderHealth>,
    epoch: Instant,
    metrics: Option<IngestMetrics>,
}

impl CompositeStreamFileProvider {
    /// Backends in priority order, each with the time it stays out of
    /// rotation after failing.
    pub fn new(providers: Vec<(Box<dyn StreamFileProvider>, Duration)>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|(provider, backoff)| ProviderHealth {
                    provider,
                    backoff,
                    readmit_at: AtomicU64::new(0),
                })
                .collect(),
            epoch: Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: IngestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether any backend is currently eligible.
    pub fn is_healthy(&self) -> bool {
        let now = self.now_millis();
        self.providers.iter().any(|p| p.is_healthy(now))
    }

    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// First healthy backend at or after `from`.
    fn next_healthy(&self, from: usize, now_millis: u64) -> Option<usize> {
        (from..self.providers.len()).find(|&i| self.providers[i].is_healthy(now_millis))
    }

    async fn dispatch<'a, T, F>(&'a self, operation: F) -> Result<T, ProviderError>
    where
        T: Send,
        F: Fn(&'a dyn StreamFileProvider) -> BoxFuture<'a, Result<T, ProviderError>> + Send,
    {
        let Some(last) = self.providers.len().checked_sub(1) else {
            return Err(ProviderError::NonRetryable(
                "No stream file providers configured".to_string(),
            ));
        };

        let mut current = self.next_healthy(0, self.now_millis()).unwrap_or(last);

        for attempt in 1..=self.providers.len() {
            let backend = &self.providers[current];
            let err = match operation(backend.provider.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            warn!(provider = backend.provider.name(), "Attempt #{attempt} failed: {err}");
            if !err.is_retryable() {
                return Err(err);
            }

            let now = self.now_millis();
            let Some(next) = self.next_healthy(current + 1, now) else {
                return Err(err);
            };

            backend.mark_unhealthy(now);
            if let Some(metrics) = &self.metrics {
                metrics
                    .provider_failovers
                    .with_label_values(&[backend.provider.name()])
                    .inc();
            }
            info!(
                provider = backend.provider.name(),
                backoff_ms = backend.backoff.as_millis() as u64,
                next = self.providers[next].provider.name(),
                "marked stream file provider unhealthy"
            );
            current = next;
        }

        Err(ProviderError::NonRetryable(
            "All stream file providers failed".to_string(),
        ))
    }
}

#[async_trait]
impl StreamFileProvider for CompositeStreamFileProvider {
    fn name(&self) -> &str {
        "composite"
    }

    async fn get(&self, filename: &StreamFilename) -> Result<StreamFileData, ProviderError> {
        self.dispatch(|p| p.get(filename)).await
    }

    async fn list(
        &self,
        node: &ConsensusNode,
        last: &StreamFilename,
    ) -> Result<Vec<StreamFileData>, ProviderError> {
        self.dispatch(|p| p.list(node, last)).await
    }

    async fn list_networks(&self) -> Result<Vec<String>, ProviderError> {
        self.dispatch(|p| p.list_networks()).await
    }
}
