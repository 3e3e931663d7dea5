//! Stream file providers.
//!
//! A [`StreamFileProvider`] abstracts where block and record stream files
//! come from. Backends:
//!
//! - [`LocalStreamFileProvider`]: a directory tree on the local filesystem,
//! - [`HttpStreamFileProvider`]: an HTTP mirror of the same tree,
//! - [`CompositeStreamFileProvider`]: ordered failover across backends with
//!   per-backend health tracking.

pub mod composite;
pub mod http;
pub mod local;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::types::filename::parse_instant;
use crate::types::{ConsensusNode, StreamFileData, StreamFilename};

pub use composite::CompositeStreamFileProvider;
pub use http::HttpStreamFileProvider;
pub use local::LocalStreamFileProvider;

/// Errors surfaced by stream file providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested file or folder does not exist on this backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// A failure that would repeat on any backend.
    #[error("{0}")]
    NonRetryable(String),

    /// A backend-side failure that another backend may not have.
    #[error("{0}")]
    Transient(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether failing over to another backend is worthwhile.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::NotFound(_) | ProviderError::NonRetryable(_) => false,
            ProviderError::Transient(_)
            | ProviderError::Io(_)
            | ProviderError::Http(_)
            | ProviderError::Timeout(_) => true,
        }
    }
}

/// Source of stream files.
#[async_trait]
pub trait StreamFileProvider: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &str;

    /// Downloads one file. Fails with [`ProviderError::NotFound`] when it
    /// does not exist.
    async fn get(&self, filename: &StreamFilename) -> Result<StreamFileData, ProviderError>;

    /// Files of the same kind as `last`, in its folder, whose names sort
    /// strictly after it. At most one batch is returned.
    async fn list(
        &self,
        node: &ConsensusNode,
        last: &StreamFilename,
    ) -> Result<Vec<StreamFileData>, ProviderError>;

    /// Top-level network folders.
    async fn list_networks(&self) -> Result<Vec<String>, ProviderError>;

    /// Resolves the folder holding `network`'s files.
    ///
    /// Resettable networks are re-created under `{network}-{instant}`
    /// folders; the latest one wins.
    async fn discover_network(
        &self,
        network: &str,
        resettable: bool,
    ) -> Result<String, ProviderError> {
        if !resettable {
            return Ok(network.to_string());
        }

        let networks = self.list_networks().await?;
        let folder = select_network_folder(network, &networks).ok_or_else(|| {
            ProviderError::NonRetryable(format!(
                "Failed to discover network folder for '{network}'"
            ))
        })?;

        info!(network, folder = %folder, provider = self.name(), "discovered network folder");
        Ok(folder)
    }
}

/// Greatest `{network}-{RFC 3339 instant}` folder, else `network` itself.
fn select_network_folder(network: &str, folders: &[String]) -> Option<String> {
    let prefix = format!("{network}-");
    folders
        .iter()
        .filter(|folder| {
            folder
                .strip_prefix(&prefix)
                .is_some_and(|instant| parse_instant(instant).is_some())
        })
        .max()
        .or_else(|| folders.iter().find(|folder| *folder == network))
        .cloned()
}
