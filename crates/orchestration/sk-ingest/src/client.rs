//! Per-bucket store-client resolution and caching.

use crate::config::{BucketConfig, IngestConfig};
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use sk_error::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Session name used for assumed-role credentials when none is configured.
const DEFAULT_SESSION_NAME: &str = "skimmer-ingest";

/// Resolves a store client for a bucket, configured with that bucket's
/// credentials/region/assumed role, memoized per bucket.
///
/// The cache is shared by all consumer loops. Lookup takes a read lock;
/// the first resolution for a bucket upgrades to a write lock and builds
/// the client while holding it, so concurrent first uses construct exactly
/// one client per bucket.
pub struct StoreClientResolver {
    region: Option<String>,
    endpoint: Option<String>,
    buckets: HashMap<String, BucketConfig>,
    cache: RwLock<HashMap<String, Client>>,
}

impl StoreClientResolver {
    /// Build a resolver from the pipeline configuration.
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            buckets: config.buckets.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the client for a bucket, building and caching it on first use.
    pub async fn client_for(&self, bucket: &str) -> Result<Client> {
        {
            let cache = self.cache.read().await;
            if let Some(client) = cache.get(bucket) {
                return Ok(client.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(client) = cache.get(bucket) {
            return Ok(client.clone());
        }

        debug!(bucket = bucket, "Building store client");
        let client = self.build_client(bucket).await?;
        cache.insert(bucket.to_string(), client.clone());
        Ok(client)
    }

    /// Number of clients currently cached.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn build_client(&self, bucket: &str) -> Result<Client> {
        let bucket_config = self.buckets.get(bucket);

        let region = bucket_config
            .and_then(|b| b.region.clone())
            .or_else(|| self.region.clone());

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some(bucket_config) = bucket_config {
            if let (Some(access_key), Some(secret_key)) =
                (&bucket_config.access_key, &bucket_config.secret_key)
            {
                let credentials = aws_sdk_s3::config::Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    DEFAULT_SESSION_NAME,
                );
                loader = loader.credentials_provider(credentials);
            } else if let Some(role_arn) = &bucket_config.role_arn {
                let session_name = bucket_config
                    .session_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());

                debug!(bucket = bucket, role = %role_arn, "Assuming role for bucket");
                let mut builder =
                    AssumeRoleProvider::builder(role_arn.clone()).session_name(session_name);
                if let Some(region) = region {
                    builder = builder.region(Region::new(region));
                }
                loader = loader.credentials_provider(builder.build().await);
            }
        }

        let shared_config = loader.load().await;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);

        // Path-style addressing for custom endpoints (LocalStack)
        if self.endpoint.is_some() {
            s3_builder = s3_builder.force_path_style(true);
        }

        Ok(Client::from_conf(s3_builder.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BucketConfig;

    fn test_config() -> IngestConfig {
        IngestConfig::new("https://sqs.us-east-1.amazonaws.com/123/objects")
            .with_region("us-east-1")
            .with_bucket(
                "logs",
                BucketConfig::new().with_credentials("AKIATEST", "secret"),
            )
            .with_bucket(
                "metrics",
                BucketConfig::new()
                    .with_region("eu-west-1")
                    .with_credentials("AKIATEST2", "secret2"),
            )
    }

    #[tokio::test]
    async fn test_client_is_memoized_per_bucket() {
        let resolver = StoreClientResolver::new(&test_config());

        resolver.client_for("logs").await.unwrap();
        resolver.client_for("logs").await.unwrap();
        assert_eq!(resolver.cached_count().await, 1);

        resolver.client_for("metrics").await.unwrap();
        assert_eq!(resolver.cached_count().await, 2);
    }

    #[tokio::test]
    async fn test_unconfigured_bucket_uses_defaults() {
        let resolver = StoreClientResolver::new(&test_config());

        // No per-bucket entry: falls back to process-wide settings.
        resolver.client_for("unknown-bucket").await.unwrap();
        assert_eq!(resolver.cached_count().await, 1);
    }
}
