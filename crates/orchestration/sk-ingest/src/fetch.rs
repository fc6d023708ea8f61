//! Object fetch: streaming download, integrity verification, cleanup.

use crate::store::{BlobStore, FetchedObject};
use async_compression::tokio::bufread::GzipDecoder;
use sk_error::{Result, StoreError};
use sk_types::Record;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Downloads objects into the scratch directory and owns their cleanup.
///
/// Scratch files are named deterministically from the object key's base
/// name, so concurrent units working on distinct keys never collide. Two
/// units handed the same key by two different messages may collide on the
/// path; that duplicate-delivery window is accepted, not locked against.
pub struct ObjectFetcher {
    store: Arc<dyn BlobStore>,
    scratch_dir: PathBuf,
    delete_on_success: bool,
}

impl ObjectFetcher {
    /// Create a fetcher writing into the given scratch directory.
    pub fn new(store: Arc<dyn BlobStore>, scratch_dir: impl Into<PathBuf>, delete_on_success: bool) -> Self {
        Self {
            store,
            scratch_dir: scratch_dir.into(),
            delete_on_success,
        }
    }

    /// Download the record's object to the scratch directory, transparently
    /// decompressing gzip-marked objects, and verify the written byte count
    /// against the size declared by the notification.
    ///
    /// On success the record's local path is set. On any failure the partial
    /// scratch file is removed and the record keeps no local path.
    pub async fn download(&self, record: &mut Record) -> Result<()> {
        let path = self.scratch_path(&record.key);
        let object = self.store.fetch(&record.bucket, &record.key).await?;
        let compressed = object.is_gzip();

        let written = match self.copy_to_scratch(object, &path, compressed).await {
            Ok(written) => written,
            Err(e) => {
                self.remove_scratch_file(&path).await;
                return Err(e);
            }
        };

        if let Some(expected) = record.size {
            if expected != written {
                self.remove_scratch_file(&path).await;
                return Err(StoreError::SizeMismatch {
                    key: record.key.clone(),
                    expected,
                    actual: written,
                }
                .into());
            }
        }

        debug!(
            bucket = %record.bucket,
            key = %record.key,
            bytes = written,
            gzip = compressed,
            path = %path.display(),
            "Downloaded object"
        );
        record.set_local_path(path);
        Ok(())
    }

    /// Remove the record's scratch file, unconditionally. Local disk must
    /// never accumulate stale files across iterations.
    pub async fn cleanup_local(&self, record: &mut Record) {
        if let Some(path) = record.take_local_path() {
            self.remove_scratch_file(&path).await;
        }
    }

    /// Delete the source object, when configured to do so. Only called
    /// after a completed verdict; failed records always leave the remote
    /// object in place for inspection.
    pub async fn cleanup_remote(&self, record: &Record) {
        if !self.delete_on_success {
            return;
        }

        if let Err(e) = self.store.delete(&record.bucket, &record.key).await {
            warn!(
                bucket = %record.bucket,
                key = %record.key,
                error = %e,
                "Failed to delete source object"
            );
        } else {
            debug!(bucket = %record.bucket, key = %record.key, "Deleted source object");
        }
    }

    /// Scratch path for an object key: the key's base name under the
    /// scratch directory.
    fn scratch_path(&self, key: &str) -> PathBuf {
        let base = key
            .rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or("object");
        self.scratch_dir.join(base)
    }

    async fn copy_to_scratch(
        &self,
        object: FetchedObject,
        path: &Path,
        compressed: bool,
    ) -> Result<u64> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| StoreError::Io(format!("create '{}': {e}", path.display())))?;

        let written = if compressed {
            let mut decoder = GzipDecoder::new(object.body);
            tokio::io::copy(&mut decoder, &mut file)
                .await
                .map_err(|e| StoreError::Decompression(e.to_string()))?
        } else {
            let mut body = object.body;
            tokio::io::copy(&mut body, &mut file)
                .await
                .map_err(|e| StoreError::Download(e.to_string()))?
        };

        file.flush()
            .await
            .map_err(|e| StoreError::Io(format!("flush '{}': {e}", path.display())))?;
        Ok(written)
    }

    async fn remove_scratch_file(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}
