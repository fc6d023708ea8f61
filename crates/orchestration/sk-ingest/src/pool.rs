//! Worker pool: N independent consumer loops and the shutdown model.

use crate::config::IngestConfig;
use crate::dispatch::ContentDispatcher;
use crate::fetch::ObjectFetcher;
use crate::poller::{NotificationPoller, RecordHandler};
use crate::sink::EventSink;
use crate::source::NotificationQueue;
use crate::stats::IngestStats;
use async_trait::async_trait;
use futures::future::join_all;
use sk_types::{Record, Verdict};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Wires fetch, dispatch, and cleanup for one record.
///
/// The local scratch file is removed whatever the outcome; the remote
/// object is only ever cleaned up after a completed verdict.
pub struct PipelineHandler {
    fetcher: Arc<ObjectFetcher>,
    dispatcher: Arc<ContentDispatcher>,
    sink: Arc<dyn EventSink>,
    stats: Arc<IngestStats>,
}

impl PipelineHandler {
    /// Create a handler over shared pipeline stages.
    pub fn new(
        fetcher: Arc<ObjectFetcher>,
        dispatcher: Arc<ContentDispatcher>,
        sink: Arc<dyn EventSink>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            fetcher,
            dispatcher,
            sink,
            stats,
        }
    }
}

#[async_trait]
impl RecordHandler for PipelineHandler {
    async fn handle(&self, mut record: Record) -> bool {
        if let Err(e) = self.fetcher.download(&mut record).await {
            error!(
                bucket = %record.bucket,
                key = %record.key,
                receipt_handle = %record.receipt_handle,
                error = %e,
                "Download failed; message retained, remote object untouched"
            );
            self.fetcher.cleanup_local(&mut record).await;
            self.stats.record_failed();
            return false;
        }

        let verdict = self.dispatcher.process(&record, self.sink.as_ref()).await;
        self.fetcher.cleanup_local(&mut record).await;

        match verdict {
            Verdict::Completed => {
                self.fetcher.cleanup_remote(&record).await;
                self.stats.record_completed();
                true
            }
            Verdict::Failed => {
                self.stats.record_failed();
                false
            }
            Verdict::Aborted => {
                self.stats.record_aborted();
                false
            }
        }
    }
}

/// Runs the configured number of consumer loops and manages their
/// graceful-then-forced shutdown.
///
/// Units are fully independent; the queue service arbitrates which unit
/// receives which message, so no cross-unit coordination exists beyond the
/// shared read-only configuration, the sink, and the client cache.
pub struct WorkerPool {
    token: CancellationToken,
    grace: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// Launch the consumer loops.
    pub fn start<Q: NotificationQueue + 'static>(
        config: &IngestConfig,
        queue: Arc<Q>,
        fetcher: Arc<ObjectFetcher>,
        dispatcher: Arc<ContentDispatcher>,
        sink: Arc<dyn EventSink>,
        stats: Arc<IngestStats>,
    ) -> Self {
        let token = CancellationToken::new();
        let mut handles = Vec::with_capacity(config.consumer_count);

        info!(consumers = config.consumer_count, "Starting worker pool");
        for unit in 0..config.consumer_count {
            let poller = NotificationPoller::new(
                queue.clone(),
                config.wrapped_envelope,
                config.skip_delete,
                stats.clone(),
            );
            let handler = PipelineHandler::new(
                fetcher.clone(),
                dispatcher.clone(),
                sink.clone(),
                stats.clone(),
            );
            let unit_token = token.child_token();

            handles.push(tokio::spawn(async move {
                debug!(unit, "Consumer loop started");
                poller.run(&handler, unit_token).await;
                debug!(unit, "Consumer loop stopped");
            }));
        }

        Self {
            token,
            grace: config.shutdown_grace,
            handles: Mutex::new(handles),
            stopped: AtomicBool::new(false),
        }
    }

    /// Request cooperative shutdown, then force-terminate stragglers.
    ///
    /// Idempotent, and bounded by the configured grace period: units stuck
    /// past the grace (e.g. a receive that never observes the cancel) are
    /// aborted rather than waited on forever.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Stopping worker pool");
        self.token.cancel();

        let mut handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };

        match tokio::time::timeout(self.grace, join_all(handles.iter_mut())).await {
            Ok(results) => {
                for (unit, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        if !e.is_cancelled() {
                            error!(unit, error = %e, "Consumer loop panicked");
                        }
                    }
                }
                info!("Worker pool stopped");
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs_f64(),
                    "Shutdown grace period exceeded; forcing consumer termination"
                );
                for handle in &handles {
                    handle.abort();
                }
            }
        }
    }
}
