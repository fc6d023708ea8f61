//! Error types for the skimmer ingest pipeline.
//!
//! This crate provides:
//! - [`SkError`] - Top-level error enum for all pipeline errors
//! - Domain-specific errors ([`QueueError`], [`StoreError`], [`DecodeError`], [`SinkError`])
//! - The [`Result`] alias used throughout the workspace

use thiserror::Error;

/// Top-level error type for the skimmer pipeline.
#[derive(Error, Debug)]
pub enum SkError {
    /// Notification-queue errors (receive, delete, visibility)
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Blob-store errors (client resolution, download, integrity, delete)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Content decoding errors (malformed content for the resolved format)
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Downstream sink errors (congestion, closed channel)
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Notification-queue errors.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Failed to resolve a queue name to a queue URL
    #[error("Queue URL resolution failed: {0}")]
    ResolveUrl(String),

    /// Failed to receive messages
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Failed to delete a message
    #[error("Delete failed: {0}")]
    Delete(String),

    /// Failed to change a message's visibility timeout
    #[error("Visibility change failed: {0}")]
    Visibility(String),

    /// Message body could not be parsed as a store-event notification
    #[error("Malformed notification body: {0}")]
    MalformedBody(String),
}

/// Blob-store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Access denied
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Download failed mid-stream
    #[error("Download failed: {0}")]
    Download(String),

    /// Downloaded byte count does not match the size declared by the notification
    #[error("Size mismatch for '{key}': expected {expected} bytes, wrote {actual}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Decompression of a compressed object failed
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Failed to delete the remote object
    #[error("Remote delete failed: {0}")]
    Delete(String),

    /// Local scratch-file I/O error
    #[error("Scratch I/O error: {0}")]
    Io(String),
}

/// Content decoding errors.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A line or document was not valid JSON for a JSON format
    #[error("Invalid JSON at line {line}: {message}")]
    InvalidJson { line: usize, message: String },

    /// Content was not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    Utf8(String),

    /// I/O error while reading the fetched file
    #[error("Read failed: {0}")]
    Io(String),
}

/// Downstream sink errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The sink refused or blocked beyond tolerance; the caller should stop
    /// decoding and retain the message for redelivery
    #[error("Sink congested")]
    Congested,

    /// The sink has been closed by the host
    #[error("Sink closed")]
    Closed,
}

/// Result type alias using SkError.
pub type Result<T> = std::result::Result<T, SkError>;
