//! Block file source.
//!
//! [`BlockIngestor`] pulls block files from a [`StreamFileProvider`] in
//! block number order. Each poll downloads a window of consecutive blocks
//! concurrently, then hands them to the [`BlockStreamVerifier`] one at a
//! time in order. The first block that is not there yet ends the poll.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::provider::{ProviderError, StreamFileProvider};
use crate::reader::BlockFileReader;
use crate::storage::{BlockFileSink, LedgerRepository};
use crate::types::{BlockFile, Compression, StreamFilename, StreamType};
use crate::verifier::BlockStreamVerifier;

/// Ingest tuning, usually derived from [`IngestConfig`].
#[derive(Clone, Debug)]
pub struct IngestorOptions {
    pub network: String,
    pub resettable: bool,
    pub compression: Option<Compression>,
    pub start_block_number: u64,
    /// Blocks downloaded ahead of verification.
    pub concurrency: usize,
    pub download_timeout: Duration,
}

impl From<&IngestConfig> for IngestorOptions {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            network: cfg.network.clone(),
            resettable: cfg.resettable,
            compression: cfg.block.compression(),
            start_block_number: cfg.block.start_block_number,
            concurrency: cfg.block.concurrency,
            download_timeout: cfg.download_timeout(),
        }
    }
}

pub struct BlockIngestor<P, R, S>
where
    P: StreamFileProvider,
    R: LedgerRepository,
    S: BlockFileSink,
{
    provider: P,
    reader: BlockFileReader,
    verifier: BlockStreamVerifier<R, S>,
    options: IngestorOptions,
    network_folder: OnceCell<String>,
}

impl<P, R, S> BlockIngestor<P, R, S>
where
    P: StreamFileProvider,
    R: LedgerRepository,
    S: BlockFileSink,
{
    pub fn new(
        provider: P,
        reader: BlockFileReader,
        verifier: BlockStreamVerifier<R, S>,
        options: IngestorOptions,
    ) -> Self {
        Self {
            provider,
            reader,
            verifier,
            options,
            network_folder: OnceCell::new(),
        }
    }

    pub fn verifier(&self) -> &BlockStreamVerifier<R, S> {
        &self.verifier
    }

    /// Folder holding the network's files, discovered on first use.
    pub async fn network_folder(&self) -> Result<&str> {
        let folder = self
            .network_folder
            .get_or_try_init(|| async {
                self.provider
                    .discover_network(&self.options.network, self.options.resettable)
                    .await
                    .map_err(IngestError::from)
            })
            .await?;
        Ok(folder.as_str())
    }

    /// Block after the last verified one, or the configured start block.
    pub fn next_block_number(&self) -> Result<u64> {
        Ok(match self.verifier.last_block()? {
            Some(last) => last.index + 1,
            None => self.options.start_block_number,
        })
    }

    pub async fn block_filename(&self, block_number: u64) -> Result<StreamFilename> {
        let directory = format!("{}/{}", self.network_folder().await?, StreamType::Block.path());
        let block_number = i64::try_from(block_number).map_err(|_| {
            IngestError::IllegalArgument(format!("Block number {block_number} out of range"))
        })?;
        StreamFilename::from_block_number(&directory, block_number, self.options.compression)
    }

    /// Downloads, verifies and persists the blocks available after the last
    /// verified one. Returns how many were verified; zero means caught up.
    pub async fn poll(&self) -> Result<usize> {
        let first = self.next_block_number()?;
        let window = self.options.concurrency.max(1);

        let mut downloads = stream::iter(first..first.saturating_add(window as u64))
            .map(|block_number| self.download(block_number))
            .buffered(window);

        let mut verified = 0;
        while let Some(download) = downloads.next().await {
            let Some((filename, block_file)) = download? else {
                break;
            };
            self.verifier
                .verify(block_file)
                .map_err(|e| verification_failed(&filename, e))?;
            verified += 1;
        }

        if verified > 0 {
            info!(first, verified, "ingested block files");
        } else {
            debug!(next = first, "no new block files");
        }
        Ok(verified)
    }

    /// Fetches and parses one block. `None` when it is not published yet.
    async fn download(&self, block_number: u64) -> Result<Option<(StreamFilename, BlockFile)>> {
        let filename = self.block_filename(block_number).await?;
        let timeout = self.options.download_timeout;

        let data = match tokio::time::timeout(timeout, self.provider.get(&filename)).await {
            Ok(Ok(data)) => data,
            Ok(Err(ProviderError::NotFound(_))) => return Ok(None),
            Ok(Err(err)) => return Err(download_failed(&filename, err.into())),
            Err(_) => {
                return Err(download_failed(
                    &filename,
                    ProviderError::Timeout(timeout).into(),
                ));
            }
        };

        let block_file = self
            .reader
            .read(&data)
            .map_err(|e| download_failed(&filename, e))?;
        Ok(Some((filename, block_file)))
    }
}

fn download_failed(filename: &StreamFilename, source: IngestError) -> IngestError {
    IngestError::BlockStream {
        message: format!("Failed to download block file {}", filename.filename()),
        source: Box::new(source),
    }
}

fn verification_failed(filename: &StreamFilename, source: IngestError) -> IngestError {
    IngestError::BlockStream {
        message: format!("Failed to verify block file {}", filename.filename()),
        source: Box::new(source),
    }
}
