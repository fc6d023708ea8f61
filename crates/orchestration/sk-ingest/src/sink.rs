//! Downstream event sinks.
//!
//! The host owns the real output buffer; [`ChannelSink`] adapts a bounded
//! channel to the [`EventSink`] seam. [`CollectorSink`] records events in
//! memory and can simulate congestion, for tests and throughput probes.

use async_trait::async_trait;
use sk_error::SinkError;
use sk_types::SinkEvent;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Downstream sink accepting decoded events.
///
/// Push may block under host backpressure; that blocking is the pipeline's
/// only flow-control mechanism. A sink that refuses beyond tolerance
/// reports [`SinkError::Congested`].
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn push(&self, event: SinkEvent) -> std::result::Result<(), SinkError>;
}

/// Sink over a bounded channel owned by the host.
///
/// A full channel is tolerated up to `push_timeout`, then reported as
/// congestion so the dispatcher can stop decoding and retain the message.
pub struct ChannelSink {
    sender: mpsc::Sender<SinkEvent>,
    push_timeout: Duration,
}

impl ChannelSink {
    /// Wrap a channel sender with the given congestion tolerance.
    pub fn new(sender: mpsc::Sender<SinkEvent>, push_timeout: Duration) -> Self {
        Self {
            sender,
            push_timeout,
        }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn push(&self, event: SinkEvent) -> std::result::Result<(), SinkError> {
        self.sender
            .send_timeout(event, self.push_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SinkError::Congested,
                SendTimeoutError::Closed(_) => SinkError::Closed,
            })
    }
}

/// In-memory sink that records pushed events.
///
/// With a congestion threshold set, pushes beyond the threshold report
/// [`SinkError::Congested`], which exercises the dispatcher's early-exit
/// path without a real backpressured host.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<SinkEvent>>,
    congest_after: Option<usize>,
}

impl CollectorSink {
    /// Create an unbounded collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report congestion once the given number of events has been accepted.
    pub fn with_congestion_after(mut self, accepted: usize) -> Self {
        self.congest_after = Some(accepted);
        self
    }

    /// Snapshot of the accepted events.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of accepted events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no events have been accepted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSink for CollectorSink {
    async fn push(&self, event: SinkEvent) -> std::result::Result<(), SinkError> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(limit) = self.congest_after {
            if events.len() >= limit {
                return Err(SinkError::Congested);
            }
        }
        events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn event(n: usize) -> SinkEvent {
        SinkEvent::new("logs", format!("key-{n}"), None, Value::Null)
    }

    #[tokio::test]
    async fn test_channel_sink_reports_congestion_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx, Duration::from_millis(10));

        sink.push(event(0)).await.unwrap();
        let error = sink.push(event(1)).await.unwrap_err();
        assert_eq!(error, SinkError::Congested);
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelSink::new(tx, Duration::from_millis(10));

        let error = sink.push(event(0)).await.unwrap_err();
        assert_eq!(error, SinkError::Closed);
    }

    #[tokio::test]
    async fn test_collector_sink_congestion_threshold() {
        let sink = CollectorSink::new().with_congestion_after(2);

        sink.push(event(0)).await.unwrap();
        sink.push(event(1)).await.unwrap();
        assert_eq!(sink.push(event(2)).await.unwrap_err(), SinkError::Congested);
        assert_eq!(sink.len(), 2);
    }
}
