//! sk-ingest - blob-store notification ingest pipeline.
//!
//! Consumes object-created notifications from a shared queue, fetches each
//! object, and streams its decoded contents to a downstream event sink with
//! at-least-once delivery:
//!
//! - Long-polling queue consumer with envelope unwrapping and a
//!   delete-on-success / retain-on-failure message lifecycle
//! - Streaming object fetch with byte-count verification and transparent
//!   gzip decompression
//! - Per-bucket, per-path format resolution (ordered regex rules)
//! - Incremental decode and dispatch with congestion-aware early exit
//! - N independent consumer loops with cooperative-then-forced shutdown
//!
//! # Example
//!
//! ```ignore
//! use sk_ingest::{
//!     ChannelSink, ContentDispatcher, FormatResolver, IngestConfig, IngestStats,
//!     ObjectFetcher, S3BlobStore, SqsQueue, SqsQueueConfig, StoreClientResolver,
//!     WorkerPool,
//! };
//! use std::sync::Arc;
//!
//! let config = IngestConfig::new(queue_url)
//!     .with_consumer_count(4)
//!     .with_scratch_dir("/var/tmp/skimmer");
//!
//! let resolver = Arc::new(StoreClientResolver::new(&config));
//! let store = Arc::new(S3BlobStore::new(resolver));
//! let fetcher = Arc::new(ObjectFetcher::new(store, &config.scratch_dir, config.delete_on_success));
//! let dispatcher = Arc::new(ContentDispatcher::new(FormatResolver::from_config(&config)?));
//! let stats = Arc::new(IngestStats::new());
//!
//! let pool = WorkerPool::start(&config, queue, fetcher, dispatcher, sink, stats);
//! // ... on shutdown:
//! pool.stop().await;
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod poller;
pub mod pool;
pub mod resolve;
pub mod sink;
pub mod source;
pub mod stats;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use client::StoreClientResolver;
pub use config::{BucketConfig, IngestConfig, PatternRule};
pub use dispatch::ContentDispatcher;
pub use fetch::ObjectFetcher;
pub use poller::{NotificationPoller, RecordHandler};
pub use pool::{PipelineHandler, WorkerPool};
pub use resolve::{FormatResolver, ResolvedFormat};
pub use sink::{ChannelSink, CollectorSink, EventSink};
pub use source::{NotificationQueue, QueueMessage, SqsQueue, SqsQueueConfig};
pub use stats::{IngestStats, StatsSnapshot};
pub use store::{BlobStore, FetchedObject, S3BlobStore};
