//! Content decoding and dispatch to the downstream sink.

use crate::resolve::{FormatResolver, ResolvedFormat};
use crate::sink::EventSink;
use serde_json::Value;
use sk_error::{DecodeError, Result, SinkError, SkError};
use sk_types::{DecodeFormat, Record, SinkEvent, Verdict};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, error, warn};

/// Decodes a fetched file and pushes one event per decoded unit.
///
/// Events already pushed before a failure are never retracted; a retried
/// message may therefore re-deliver them downstream, which the at-least-once
/// contract accepts.
pub struct ContentDispatcher {
    resolver: FormatResolver,
}

impl ContentDispatcher {
    /// Create a dispatcher over the given format resolver.
    pub fn new(resolver: FormatResolver) -> Self {
        Self { resolver }
    }

    /// Decode the record's fetched file and push its events to the sink.
    ///
    /// Sink congestion stops decoding immediately and yields
    /// [`Verdict::Aborted`]; decode and I/O errors yield
    /// [`Verdict::Failed`]; a full decode yields [`Verdict::Completed`].
    pub async fn process(&self, record: &Record, sink: &dyn EventSink) -> Verdict {
        let Some(path) = record.local_path() else {
            error!(
                bucket = %record.bucket,
                key = %record.key,
                "Record has no fetched file to dispatch"
            );
            return Verdict::Failed;
        };

        let resolved = self.resolver.resolve(&record.bucket, &record.key);
        debug!(
            bucket = %record.bucket,
            key = %record.key,
            format = %resolved.format,
            event_type = resolved.event_type.as_deref().unwrap_or(""),
            "Dispatching file"
        );

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                error!(
                    bucket = %record.bucket,
                    key = %record.key,
                    path = %path.display(),
                    error = %e,
                    "Failed to open fetched file"
                );
                return Verdict::Failed;
            }
        };

        let result = match resolved.format {
            DecodeFormat::Plain => self.dispatch_lines(file, record, &resolved, sink, false).await,
            DecodeFormat::JsonLines => self.dispatch_lines(file, record, &resolved, sink, true).await,
            DecodeFormat::Json => self.dispatch_document(file, record, &resolved, sink).await,
        };

        match result {
            Ok(count) => {
                debug!(bucket = %record.bucket, key = %record.key, events = count, "File dispatched");
                Verdict::Completed
            }
            Err(SkError::Sink(SinkError::Congested)) => {
                warn!(
                    bucket = %record.bucket,
                    key = %record.key,
                    receipt_handle = %record.receipt_handle,
                    "Sink congested, aborting dispatch; message retained for redelivery"
                );
                Verdict::Aborted
            }
            Err(e) => {
                error!(
                    bucket = %record.bucket,
                    key = %record.key,
                    receipt_handle = %record.receipt_handle,
                    error = %e,
                    "Dispatch failed"
                );
                Verdict::Failed
            }
        }
    }

    /// Line-oriented decode: one event per line, optionally parsed as JSON.
    async fn dispatch_lines(
        &self,
        file: File,
        record: &Record,
        resolved: &ResolvedFormat,
        sink: &dyn EventSink,
        parse_json: bool,
    ) -> Result<u64> {
        let mut lines = BufReader::new(file).lines();
        let mut count = 0u64;
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await.map_err(read_error)? {
            line_number += 1;

            let data = if parse_json {
                serde_json::from_str(&line).map_err(|e| DecodeError::InvalidJson {
                    line: line_number,
                    message: e.to_string(),
                })?
            } else {
                Value::String(line)
            };

            self.push_event(record, resolved, sink, data).await?;
            count += 1;
        }

        Ok(count)
    }

    /// Whole-file decode: the file is a single JSON document and yields a
    /// single event.
    async fn dispatch_document(
        &self,
        mut file: File,
        record: &Record,
        resolved: &ResolvedFormat,
        sink: &dyn EventSink,
    ) -> Result<u64> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .map_err(read_error)?;

        let data: Value = serde_json::from_str(&contents).map_err(|e| DecodeError::InvalidJson {
            line: e.line(),
            message: e.to_string(),
        })?;

        self.push_event(record, resolved, sink, data).await?;
        Ok(1)
    }

    async fn push_event(
        &self,
        record: &Record,
        resolved: &ResolvedFormat,
        sink: &dyn EventSink,
        data: Value,
    ) -> Result<()> {
        let event = SinkEvent::new(
            record.bucket.clone(),
            record.key.clone(),
            resolved.event_type.clone(),
            data,
        );
        sink.push(event).await.map_err(SkError::from)
    }
}

fn read_error(e: std::io::Error) -> SkError {
    if e.kind() == std::io::ErrorKind::InvalidData {
        DecodeError::Utf8(e.to_string()).into()
    } else {
        DecodeError::Io(e.to_string()).into()
    }
}
