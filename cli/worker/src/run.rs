//! Worker wiring and execution.

use crate::args::{Cli, LogLevel};
use anyhow::{bail, Context, Result};
use aws_config::{BehaviorVersion, Region};
use sk_ingest::{
    BucketConfig, ChannelSink, ContentDispatcher, FormatResolver, IngestConfig, IngestStats,
    ObjectFetcher, S3BlobStore, SqsQueue, SqsQueueConfig, StatsSnapshot, StoreClientResolver,
    WorkerPool,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Initialize logging with the specified level.
///
/// Logs are written to stderr so stdout stays clean for the event stream.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_writer(std::io::stderr)
        .init();
}

/// Run the worker until interrupted, returning the final statistics.
pub async fn execute(args: Cli) -> Result<StatsSnapshot> {
    let buckets = load_buckets(&args)?;
    let sqs_client = build_sqs_client(&args).await;
    let queue = resolve_queue(&args, sqs_client).await?;

    let config = build_config(&args, queue.queue_url().to_string(), buckets);
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .with_context(|| format!("creating scratch dir '{}'", config.scratch_dir.display()))?;

    let resolver = Arc::new(StoreClientResolver::new(&config));
    let store = Arc::new(S3BlobStore::new(resolver));
    let fetcher = Arc::new(ObjectFetcher::new(
        store,
        config.scratch_dir.clone(),
        config.delete_on_success,
    ));
    let dispatcher = Arc::new(ContentDispatcher::new(FormatResolver::from_config(&config)?));
    let stats = Arc::new(IngestStats::new());

    // Bounded output channel: the drain task writes JSONL to stdout, and a
    // full channel is the backpressure the dispatcher reacts to.
    let (tx, mut rx) = mpsc::channel(args.channel_capacity);
    let sink = Arc::new(ChannelSink::new(tx, Duration::from_secs(args.push_timeout)));
    let drain = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            }
        }
    });

    let pool = WorkerPool::start(
        &config,
        Arc::new(queue),
        fetcher,
        dispatcher,
        sink,
        stats.clone(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("listening for interrupt")?;
    info!("Interrupt received; shutting down");
    pool.stop().await;
    drop(pool);

    // The pool held the last sink handles; the drain ends once they drop.
    if tokio::time::timeout(Duration::from_secs(5), drain).await.is_err() {
        warn!("Output drain did not finish within 5s");
    }

    Ok(stats.snapshot())
}

/// Load per-bucket configuration from the JSON file, when given.
fn load_buckets(args: &Cli) -> Result<HashMap<String, BucketConfig>> {
    let Some(path) = &args.buckets_config else {
        return Ok(HashMap::new());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading buckets config '{}'", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing buckets config '{}'", path.display()))
}

async fn build_sqs_client(args: &Cli) -> aws_sdk_sqs::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &args.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &args.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    aws_sdk_sqs::Client::new(&loader.load().await)
}

async fn resolve_queue(args: &Cli, client: aws_sdk_sqs::Client) -> Result<SqsQueue> {
    let queue_config = SqsQueueConfig::new(args.queue_url.clone().unwrap_or_default())
        .with_wait_time(args.wait_time)
        .with_visibility_timeout(args.visibility_timeout)
        .with_max_batch_size(args.max_batch_size);

    match (&args.queue_url, &args.queue_name) {
        (Some(_), _) => Ok(SqsQueue::new(client, queue_config)),
        (None, Some(name)) => Ok(SqsQueue::from_queue_name(
            client,
            name,
            args.queue_owner_account_id.as_deref(),
            queue_config,
        )
        .await?),
        (None, None) => bail!("either --queue-url or --queue-name is required"),
    }
}

fn build_config(
    args: &Cli,
    queue_url: String,
    buckets: HashMap<String, BucketConfig>,
) -> IngestConfig {
    let mut config = IngestConfig::new(queue_url)
        .with_wrapped_envelope(args.wrapped_envelope)
        .with_skip_delete(args.skip_delete)
        .with_delete_on_success(args.delete_on_success)
        .with_visibility_timeout(args.visibility_timeout)
        .with_wait_time(args.wait_time)
        .with_max_batch_size(args.max_batch_size)
        .with_scratch_dir(&args.scratch_dir)
        .with_consumer_count(args.consumers)
        .with_shutdown_grace(Duration::from_secs(args.shutdown_grace))
        .with_default_format(args.default_format.into());

    config.queue_owner_account_id = args.queue_owner_account_id.clone();
    if let Some(region) = &args.region {
        config = config.with_region(region);
    }
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    for (name, bucket) in buckets {
        config = config.with_bucket(name, bucket);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(extra: &[&str]) -> Cli {
        let mut argv = vec!["sk-worker", "--queue-url", "https://example/queue"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_build_config_carries_flags() {
        let args = cli(&[
            "--wrapped-envelope",
            "--delete-on-success",
            "--consumers",
            "3",
            "--region",
            "eu-west-1",
        ]);
        let config = build_config(&args, "https://example/queue".to_string(), HashMap::new());

        assert!(config.wrapped_envelope);
        assert!(config.delete_on_success);
        assert!(!config.skip_delete);
        assert_eq!(config.consumer_count, 3);
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_buckets_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"logs": {{"rules": [{{"pattern": "^elb/", "format": "plain", "event_type": "elb"}}]}}}}"#
        )
        .unwrap();

        let args = cli(&["--buckets-config", file.path().to_str().unwrap()]);
        let buckets = load_buckets(&args).unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets["logs"].rules[0].event_type.as_deref(), Some("elb"));
    }

    #[test]
    fn test_missing_buckets_file_is_an_error() {
        let args = cli(&["--buckets-config", "/nonexistent/buckets.json"]);
        assert!(load_buckets(&args).is_err());
    }

    #[test]
    fn test_no_buckets_config_yields_empty_map() {
        let args = cli(&[]);
        assert!(load_buckets(&args).unwrap().is_empty());
    }
}
