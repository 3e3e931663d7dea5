// src/main.rs
//
// Demo ingest process that wires up the ingest library:
//
// - configuration from an optional JSON file argument
// - local / HTTP stream file sources behind a failover composite
// - ledger-anchored threshold signature verification
// - block stream verification into an in-memory sink
// - polling loop until ctrl-c

use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ingest::{
    BlockFileReader, BlockIngestor, BlockStreamVerifier, CompositeStreamFileProvider,
    DefaultBlockIngestor, HttpStreamFileProvider, InMemoryBlockFileSink, InMemoryLedgerRepository,
    IngestConfig, IngestorOptions, LocalStreamFileProvider, MetricsRegistry, SourceKind,
    StreamFileProvider, ThresholdSignatureVerifier,
};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => IngestConfig::from_json_file(&path)
            .map_err(|e| format!("failed to load config from {path}: {e}"))?,
        None => IngestConfig::default(),
    };

    // ---------------------------
    // Metrics registry
    // ---------------------------

    let metrics = if cfg.metrics.enabled {
        Some(
            MetricsRegistry::new(&cfg.metrics.namespace)
                .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
        )
    } else {
        None
    };

    // ---------------------------
    // Stream file sources
    // ---------------------------

    let mut sources: Vec<(Box<dyn StreamFileProvider>, Duration)> = Vec::new();
    for source in &cfg.sources {
        let provider: Box<dyn StreamFileProvider> = match source.kind {
            SourceKind::Local => {
                Box::new(LocalStreamFileProvider::new(&source.uri, source.batch_size))
            }
            SourceKind::Http => Box::new(
                HttpStreamFileProvider::new(&source.uri, source.timeout(), source.batch_size)
                    .map_err(|e| format!("failed to create HTTP source {}: {e}", source.uri))?,
            ),
        };
        info!(source = provider.name(), backoff_secs = source.backoff_secs, "configured stream file source");
        sources.push((provider, source.backoff()));
    }

    let mut provider = CompositeStreamFileProvider::new(sources);
    if let Some(metrics) = &metrics {
        provider = provider.with_metrics(metrics.ingest.clone());
    }

    // ---------------------------
    // Verifiers
    // ---------------------------

    let configured_ledger = cfg
        .block
        .ledger
        .as_ref()
        .map(|ledger| ledger.to_ledger())
        .transpose()
        .map_err(|e| format!("invalid configured ledger: {e}"))?;
    if configured_ledger.is_none() {
        warn!("no ledger configured, blocks verify once a ledger has been persisted");
    }

    let tss = ThresholdSignatureVerifier::new(InMemoryLedgerRepository::new(), configured_ledger);
    let mut verifier = BlockStreamVerifier::new(tss, InMemoryBlockFileSink::metadata_only());
    if let Some(metrics) = &metrics {
        verifier = verifier.with_metrics(metrics.ingest.clone());
    }

    let ingestor: DefaultBlockIngestor = BlockIngestor::new(
        provider,
        BlockFileReader::new(cfg.block.persist_bytes).with_max_size(cfg.block.max_size_bytes),
        verifier,
        IngestorOptions::from(&cfg),
    );

    info!(network = %cfg.network, sources = cfg.sources.len(), "starting block ingest");

    // ---------------------------
    // Main poll loop
    // ---------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let idle = tokio::select! {
            _ = &mut shutdown => break,
            polled = ingestor.poll() => match polled {
                Ok(verified) => verified == 0,
                Err(e) => {
                    error!("block ingest failed: {e}");
                    true
                }
            },
        };

        if idle {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    if let Some(metrics) = &metrics {
        info!("final metrics:\n{}", metrics.gather_text());
    }
    info!("shutting down");
    Ok(())
}
