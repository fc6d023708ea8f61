//! Configuration types for the ingest pipeline.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sk_types::DecodeFormat;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default visibility timeout for received messages (seconds).
pub const DEFAULT_VISIBILITY_TIMEOUT: i32 = 300;

/// Default grace period for cooperative shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Configuration for the ingest pipeline.
///
/// The hosting layer validates and parses its own configuration surface,
/// then hands these plain values to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Notification queue URL
    pub queue_url: String,

    /// Account id of the queue owner, when resolving a queue by name
    pub queue_owner_account_id: Option<String>,

    /// Message bodies are pub/sub envelopes wrapping the store event
    pub wrapped_envelope: bool,

    /// Never delete queue messages; leave them for external management
    pub skip_delete: bool,

    /// Delete the source object after a record completes
    pub delete_on_success: bool,

    /// Visibility timeout requested on receive (seconds)
    pub visibility_timeout: i32,

    /// Long-polling wait time (1-20 seconds)
    pub wait_time_seconds: i32,

    /// Maximum messages per receive call (1-10)
    pub max_batch_size: i32,

    /// Writable scratch directory for downloaded objects
    pub scratch_dir: PathBuf,

    /// Number of independent consumer loops
    pub consumer_count: usize,

    /// Grace period before consumers are forcibly terminated
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,

    /// Default AWS region for queue and store clients
    pub region: Option<String>,

    /// Custom service endpoint (for LocalStack)
    pub endpoint: Option<String>,

    /// Decoding format used when no bucket rule matches
    pub default_format: DecodeFormat,

    /// Per-bucket credentials and path-pattern rules
    #[serde(default)]
    pub buckets: HashMap<String, BucketConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            queue_owner_account_id: None,
            wrapped_envelope: false,
            skip_delete: false,
            delete_on_success: false,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            wait_time_seconds: 20,
            max_batch_size: 10,
            scratch_dir: std::env::temp_dir(),
            consumer_count: 1,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            region: None,
            endpoint: None,
            default_format: DecodeFormat::Plain,
            buckets: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Create a configuration for the given queue URL, with defaults.
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            ..Default::default()
        }
    }

    /// Enable pub/sub envelope unwrapping.
    pub fn with_wrapped_envelope(mut self, wrapped: bool) -> Self {
        self.wrapped_envelope = wrapped;
        self
    }

    /// Leave messages on the queue even after success.
    pub fn with_skip_delete(mut self, skip: bool) -> Self {
        self.skip_delete = skip;
        self
    }

    /// Delete source objects after their records complete.
    pub fn with_delete_on_success(mut self, delete: bool) -> Self {
        self.delete_on_success = delete;
        self
    }

    /// Set the visibility timeout requested on receive.
    pub fn with_visibility_timeout(mut self, seconds: i32) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    /// Set the long-polling wait time, clamped to 1-20 seconds.
    pub fn with_wait_time(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds.clamp(1, 20);
        self
    }

    /// Set the receive batch size, clamped to 1-10.
    pub fn with_max_batch_size(mut self, size: i32) -> Self {
        self.max_batch_size = size.clamp(1, 10);
        self
    }

    /// Set the scratch directory for downloads.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Set the number of consumer loops.
    pub fn with_consumer_count(mut self, count: usize) -> Self {
        self.consumer_count = count;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the default AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom service endpoint (for LocalStack).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the fallback decoding format.
    pub fn with_default_format(mut self, format: DecodeFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Add a bucket configuration.
    pub fn with_bucket(mut self, name: impl Into<String>, bucket: BucketConfig) -> Self {
        self.buckets.insert(name.into(), bucket);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_url.is_empty() {
            return Err("queue_url must be set".to_string());
        }
        if self.consumer_count == 0 {
            return Err("consumer_count must be at least 1".to_string());
        }
        if !(1..=20).contains(&self.wait_time_seconds) {
            return Err("wait_time_seconds must be in 1..=20".to_string());
        }
        if !(1..=10).contains(&self.max_batch_size) {
            return Err("max_batch_size must be in 1..=10".to_string());
        }
        if self.visibility_timeout < 1 {
            return Err("visibility_timeout must be at least 1 second".to_string());
        }
        if self.scratch_dir.as_os_str().is_empty() {
            return Err("scratch_dir must be set".to_string());
        }
        for (name, bucket) in &self.buckets {
            bucket
                .validate()
                .map_err(|e| format!("bucket '{name}': {e}"))?;
        }
        Ok(())
    }
}

/// Per-bucket credentials and path-pattern rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Region override for this bucket
    pub region: Option<String>,

    /// Explicit access key (paired with `secret_key`)
    pub access_key: Option<String>,

    /// Explicit secret key (paired with `access_key`)
    pub secret_key: Option<String>,

    /// Role to assume for this bucket's client
    pub role_arn: Option<String>,

    /// Session name used when assuming the role
    pub session_name: Option<String>,

    /// Ordered path-pattern rules; first match wins
    #[serde(default)]
    pub rules: Vec<PatternRule>,
}

impl BucketConfig {
    /// Create an empty bucket configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a region override.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set a role to assume.
    pub fn with_role(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set the assume-role session name.
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Append a path-pattern rule.
    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validate credentials pairing and rule patterns.
    pub fn validate(&self) -> Result<(), String> {
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err("access_key and secret_key must be set together".to_string());
        }
        if self.role_arn.is_some() && self.access_key.is_some() {
            return Err("role_arn and explicit keys are mutually exclusive".to_string());
        }
        for rule in &self.rules {
            Regex::new(&rule.pattern)
                .map_err(|e| format!("invalid pattern '{}': {e}", rule.pattern))?;
        }
        Ok(())
    }
}

/// One ordered path-pattern rule: a regular expression matched against the
/// object key, supplying a format and/or a logical type label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRule {
    /// Regular expression matched against the object key
    pub pattern: String,

    /// Decoding format; falls back to the process default when absent
    pub format: Option<DecodeFormat>,

    /// Logical type label stamped on emitted events; unset when absent
    pub event_type: Option<String>,
}

impl PatternRule {
    /// Create a rule for the given pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            format: None,
            event_type: None,
        }
    }

    /// Set the decoding format.
    pub fn with_format(mut self, format: DecodeFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the logical type label.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }
}

/// Serde helper storing Duration as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
