//! Blob-store access behind a seam trait.
//!
//! The fetcher consumes [`BlobStore`]; production wires [`S3BlobStore`]
//! over the per-bucket client resolver, tests substitute an in-memory
//! implementation.

use crate::client::StoreClientResolver;
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use sk_error::{Result, StoreError};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncBufRead;

/// A fetched object: its byte stream plus the metadata the fetcher needs.
pub struct FetchedObject {
    /// Streaming object body
    pub body: Pin<Box<dyn AsyncBufRead + Send>>,

    /// Stored byte count, when the service reports it
    pub content_length: Option<u64>,

    /// Content encoding, when the object carries one
    pub content_encoding: Option<String>,
}

impl FetchedObject {
    /// True when the object's metadata marks it as gzip-compressed.
    pub fn is_gzip(&self) -> bool {
        matches!(
            self.content_encoding.as_deref(),
            Some("gzip") | Some("x-gzip")
        )
    }
}

/// Blob-store operations needed by the fetch stage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a streaming download of one object.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject>;

    /// Delete one object.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Blob store backed by S3, with clients resolved per bucket.
pub struct S3BlobStore {
    resolver: Arc<StoreClientResolver>,
}

impl S3BlobStore {
    /// Create a store over the given client resolver.
    pub fn new(resolver: Arc<StoreClientResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject> {
        let client = self.resolver.client_for(bucket).await?;

        let response = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.as_service_error();
                if service.map(|s| s.is_no_such_key()).unwrap_or(false) {
                    StoreError::NotFound(format!("{bucket}/{key}"))
                } else if service.and_then(|s| s.code()) == Some("AccessDenied") {
                    StoreError::AccessDenied(format!("{bucket}/{key}"))
                } else {
                    StoreError::Download(format!("{bucket}/{key}: {e}"))
                }
            })?;

        Ok(FetchedObject {
            content_length: response.content_length.and_then(|len| u64::try_from(len).ok()),
            content_encoding: response.content_encoding,
            body: Box::pin(response.body.into_async_read()),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let client = self.resolver.client_for(bucket).await?;

        client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete(format!("{bucket}/{key}: {e}")))?;
        Ok(())
    }
}
