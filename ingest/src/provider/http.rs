//! HTTP mirror provider.
//!
//! Talks to a plain HTTP server that mirrors the bucket layout:
//!
//! ```text
//! GET {base}/{network}/blockstreams/0000000000000000042.blk
//! GET {base}/networks          newline-delimited network folders
//! ```
//!
//! Plain HTTP has no listing, so [`StreamFileProvider::list`] is only
//! supported for block streams, whose names are predictable: consecutive
//! block numbers are requested in turn until one is missing or the batch is
//! full.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{ProviderError, StreamFileProvider};
use crate::types::{ConsensusNode, StreamFileData, StreamFilename, StreamType};

const NETWORKS_INDEX: &str = "networks";

pub struct HttpStreamFileProvider {
    base_url: String,
    client: Client,
    timeout: Duration,
    batch_size: usize,
}

impl HttpStreamFileProvider {
    /// `base_url` is the root of the mirror, e.g. `"http://127.0.0.1:8080"`.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            timeout,
            batch_size,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(url));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Transient(format!(
                "GET {url} returned HTTP status {status}"
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::NonRetryable(format!(
                "GET {url} returned HTTP status {status}"
            )));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(body.to_vec())
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Http(err)
        }
    }
}

#[async_trait]
impl StreamFileProvider for HttpStreamFileProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, filename: &StreamFilename) -> Result<StreamFileData, ProviderError> {
        let bytes = self.fetch(&filename.file_path()).await?;
        debug!(file = %filename, size = bytes.len(), "downloaded stream file");
        Ok(StreamFileData::new(filename.clone(), bytes))
    }

    async fn list(
        &self,
        node: &ConsensusNode,
        last: &StreamFilename,
    ) -> Result<Vec<StreamFileData>, ProviderError> {
        if last.stream_type() != StreamType::Block {
            return Err(ProviderError::NonRetryable(format!(
                "Listing {} files is not supported over HTTP",
                last.stream_type()
            )));
        }

        let mut files = Vec::new();
        for offset in 1..=self.batch_size as i64 {
            let filename = StreamFilename::from_block_number(
                last.path(),
                last.ordinal() + offset,
                last.compression(),
            )
            .map_err(|e| ProviderError::NonRetryable(e.to_string()))?;

            match self.get(&filename).await {
                Ok(data) => files.push(data),
                Err(ProviderError::NotFound(_)) => break,
                Err(e) => return Err(e),
            }
        }

        debug!(node = node.node_id, count = files.len(), "listed block files");
        Ok(files)
    }

    async fn list_networks(&self) -> Result<Vec<String>, ProviderError> {
        let body = self.fetch(NETWORKS_INDEX).await?;
        let text = String::from_utf8(body)
            .map_err(|e| ProviderError::NonRetryable(format!("invalid networks index: {e}")))?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
