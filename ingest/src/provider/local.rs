//! Local filesystem provider.
//!
//! Files are laid out exactly like the remote buckets:
//! `{root}/{network}/{stream path}/{node folder}/{file}`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ProviderError, StreamFileProvider};
use crate::types::{ConsensusNode, StreamFileData, StreamFilename};

pub struct LocalStreamFileProvider {
    root: PathBuf,
    name: String,
    batch_size: usize,
}

impl LocalStreamFileProvider {
    pub fn new(root: impl Into<PathBuf>, batch_size: usize) -> Self {
        let root = root.into();
        Self {
            name: format!("local:{}", root.display()),
            root,
            batch_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, filename: StreamFilename) -> Result<StreamFileData, ProviderError> {
        let path = self.root.join(filename.file_path());
        let bytes = fs::read(&path).await.map_err(|e| not_found_or_io(e, &path))?;
        let last_modified = fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());

        debug!(file = %filename, size = bytes.len(), "read local stream file");
        Ok(StreamFileData {
            stream_filename: filename,
            bytes,
            last_modified,
        })
    }
}

fn not_found_or_io(err: io::Error, path: &Path) -> ProviderError {
    if err.kind() == io::ErrorKind::NotFound {
        ProviderError::NotFound(path.display().to_string())
    } else {
        ProviderError::Io(err)
    }
}

#[async_trait]
impl StreamFileProvider for LocalStreamFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, filename: &StreamFilename) -> Result<StreamFileData, ProviderError> {
        self.read(filename.clone()).await
    }

    async fn list(
        &self,
        node: &ConsensusNode,
        last: &StreamFilename,
    ) -> Result<Vec<StreamFileData>, ProviderError> {
        let directory = self.root.join(last.path());
        let mut entries = match fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProviderError::Io(e)),
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(filename) = StreamFilename::parse(last.path(), &name) else {
                continue;
            };
            if filename.same_kind(last) && filename.filename() > last.filename() {
                candidates.push(filename);
            }
        }
        candidates.sort();
        candidates.truncate(self.batch_size);

        debug!(
            node = node.node_id,
            directory = %directory.display(),
            count = candidates.len(),
            "listed local stream files"
        );

        let mut files = Vec::with_capacity(candidates.len());
        for filename in candidates {
            files.push(self.read(filename).await?);
        }
        Ok(files)
    }

    async fn list_networks(&self) -> Result<Vec<String>, ProviderError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| not_found_or_io(e, &self.root))?;

        let mut networks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    networks.push(name);
                }
            }
        }
        networks.sort();
        Ok(networks)
    }
}
