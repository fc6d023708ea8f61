//! CLI argument definitions for sk-worker.

use clap::{Parser, ValueEnum};
use sk_types::DecodeFormat;
use std::path::PathBuf;

/// Notification-queue ingest worker.
///
/// Consumes object-created notifications from an SQS queue, downloads each
/// object from S3, decodes it per the configured bucket rules, and streams
/// the decoded events to stdout as JSONL.
///
/// ## Examples
///
/// Consume a queue by URL with four consumers:
///   sk-worker --queue-url https://sqs.us-east-1.amazonaws.com/123/objects -c 4
///
/// Consume a queue owned by another account, with per-bucket rules:
///   sk-worker --queue-name object-created --queue-owner-account-id 123456789012 \
///       --buckets-config buckets.json
#[derive(Parser, Debug)]
#[command(name = "sk-worker")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Queue ===
    /// Notification queue URL
    #[arg(long, env = "SK_QUEUE_URL")]
    pub queue_url: Option<String>,

    /// Notification queue name (resolved to a URL at startup)
    #[arg(long, env = "SK_QUEUE_NAME", conflicts_with = "queue_url")]
    pub queue_name: Option<String>,

    /// Account id owning the queue, when resolving by name
    #[arg(long)]
    pub queue_owner_account_id: Option<String>,

    /// Message bodies are pub/sub envelopes wrapping the store event
    #[arg(long)]
    pub wrapped_envelope: bool,

    /// Never delete queue messages (external/manual management)
    #[arg(long)]
    pub skip_delete: bool,

    /// Visibility timeout requested on receive, in seconds
    #[arg(long, default_value = "300")]
    pub visibility_timeout: i32,

    /// Long-poll wait time in seconds (1-20)
    #[arg(long, default_value = "20", value_parser = parse_wait_time)]
    pub wait_time: i32,

    /// Maximum messages per receive call (1-10)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(i32).range(1..=10))]
    pub max_batch_size: i32,

    // === Processing ===
    /// Delete source objects after their records complete
    #[arg(long)]
    pub delete_on_success: bool,

    /// Scratch directory for downloaded objects
    #[arg(long, default_value_os_t = std::env::temp_dir())]
    pub scratch_dir: PathBuf,

    /// Number of consumer loops (must be >= 1)
    #[arg(short = 'c', long, default_value = "1", value_parser = parse_positive_usize)]
    pub consumers: usize,

    /// Shutdown grace period in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub shutdown_grace: u64,

    /// Decoding format used when no bucket rule matches
    #[arg(long, value_enum, default_value = "plain")]
    pub default_format: FormatArg,

    /// Path to a JSON file of per-bucket configuration
    #[arg(long)]
    pub buckets_config: Option<PathBuf>,

    // === Output ===
    /// Capacity of the bounded output channel
    #[arg(long, default_value = "1000", value_parser = parse_positive_usize)]
    pub channel_capacity: usize,

    /// Seconds to tolerate a full output channel before aborting a file
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub push_timeout: u64,

    // === AWS Configuration ===
    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom service endpoint URL (for LocalStack)
    #[arg(long, env = "SK_ENDPOINT")]
    pub endpoint: Option<String>,

    // === Logging ===
    /// Log level
    #[arg(short = 'l', long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Decoding format argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// One event per line of plain text
    Plain,
    /// One parsed JSON event per line
    JsonLines,
    /// The whole file as a single JSON document
    Json,
}

impl From<FormatArg> for DecodeFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => DecodeFormat::Plain,
            FormatArg::JsonLines => DecodeFormat::JsonLines,
            FormatArg::Json => DecodeFormat::Json,
        }
    }
}

/// Log level argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Parse a positive usize (>= 1).
fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}

/// Parse the long-poll wait time (1-20 seconds).
fn parse_wait_time(s: &str) -> Result<i32, String> {
    let value: i32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if !(1..=20).contains(&value) {
        return Err(format!("{} is not in 1..=20", value));
    }
    Ok(value)
}
