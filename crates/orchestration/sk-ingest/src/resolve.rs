//! Per-bucket, per-path format resolution.

use crate::config::IngestConfig;
use regex::Regex;
use sk_error::{Result, SkError};
use sk_types::DecodeFormat;
use std::collections::HashMap;

/// The decoding format and logical type label resolved for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormat {
    pub format: DecodeFormat,
    pub event_type: Option<String>,
}

struct CompiledRule {
    pattern: Regex,
    format: Option<DecodeFormat>,
    event_type: Option<String>,
}

/// Maps a (bucket, key) pair to a decoding format and type label.
///
/// Each bucket carries an ordered list of (pattern, format, type) rules,
/// kept as declared; resolution is a linear first-match scan, so pattern
/// order is the tie-break. Patterns are compiled once at construction.
pub struct FormatResolver {
    default_format: DecodeFormat,
    rules: HashMap<String, Vec<CompiledRule>>,
}

impl FormatResolver {
    /// Compile the resolver from the pipeline configuration.
    ///
    /// Invalid rule patterns are configuration errors.
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        let mut rules = HashMap::new();

        for (bucket, bucket_config) in &config.buckets {
            let compiled: Vec<CompiledRule> = bucket_config
                .rules
                .iter()
                .map(|rule| {
                    let pattern = Regex::new(&rule.pattern).map_err(|e| {
                        SkError::Config(format!(
                            "bucket '{bucket}': invalid pattern '{}': {e}",
                            rule.pattern
                        ))
                    })?;
                    Ok(CompiledRule {
                        pattern,
                        format: rule.format,
                        event_type: rule.event_type.clone(),
                    })
                })
                .collect::<Result<_>>()?;
            rules.insert(bucket.clone(), compiled);
        }

        Ok(Self {
            default_format: config.default_format,
            rules,
        })
    }

    /// Resolve the format and type for one object key.
    ///
    /// The first matching rule wins. A matching rule may leave either field
    /// unset: an absent format falls back to the process-wide default, an
    /// absent type stays unset. No rules or no match yields the default
    /// format and no type.
    pub fn resolve(&self, bucket: &str, key: &str) -> ResolvedFormat {
        let matched = self
            .rules
            .get(bucket)
            .and_then(|rules| rules.iter().find(|rule| rule.pattern.is_match(key)));

        match matched {
            Some(rule) => ResolvedFormat {
                format: rule.format.unwrap_or(self.default_format),
                event_type: rule.event_type.clone(),
            },
            None => ResolvedFormat {
                format: self.default_format,
                event_type: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BucketConfig, PatternRule};

    fn logs_config() -> IngestConfig {
        IngestConfig::new("https://sqs.us-east-1.amazonaws.com/123/objects").with_bucket(
            "logs",
            BucketConfig::new()
                .with_rule(
                    PatternRule::new("^elb/")
                        .with_format(DecodeFormat::Plain)
                        .with_event_type("elb"),
                )
                .with_rule(
                    PatternRule::new("^app/")
                        .with_format(DecodeFormat::Json)
                        .with_event_type("app"),
                ),
        )
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let resolver = FormatResolver::from_config(&logs_config()).unwrap();

        let resolved = resolver.resolve("logs", "elb/2024/01/01/file.log.gz");
        assert_eq!(resolved.format, DecodeFormat::Plain);
        assert_eq!(resolved.event_type.as_deref(), Some("elb"));

        let resolved = resolver.resolve("logs", "app/service.json");
        assert_eq!(resolved.format, DecodeFormat::Json);
        assert_eq!(resolved.event_type.as_deref(), Some("app"));
    }

    #[test]
    fn test_no_match_falls_back_to_default() {
        let resolver = FormatResolver::from_config(&logs_config()).unwrap();

        let resolved = resolver.resolve("logs", "unknown/file.log");
        assert_eq!(resolved.format, DecodeFormat::Plain);
        assert!(resolved.event_type.is_none());
    }

    #[test]
    fn test_unconfigured_bucket_falls_back_to_default() {
        let config = logs_config().with_default_format(DecodeFormat::JsonLines);
        let resolver = FormatResolver::from_config(&config).unwrap();

        let resolved = resolver.resolve("other-bucket", "anything");
        assert_eq!(resolved.format, DecodeFormat::JsonLines);
        assert!(resolved.event_type.is_none());
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let config = IngestConfig::new("url").with_bucket(
            "logs",
            BucketConfig::new()
                .with_rule(PatternRule::new("^data/").with_event_type("first"))
                .with_rule(PatternRule::new("^data/nested/").with_event_type("second")),
        );
        let resolver = FormatResolver::from_config(&config).unwrap();

        // Both patterns match; the earlier declaration wins.
        let resolved = resolver.resolve("logs", "data/nested/file.log");
        assert_eq!(resolved.event_type.as_deref(), Some("first"));
    }

    #[test]
    fn test_rule_fields_fall_back_independently() {
        let config = IngestConfig::new("url")
            .with_default_format(DecodeFormat::JsonLines)
            .with_bucket(
                "logs",
                BucketConfig::new()
                    .with_rule(PatternRule::new("^typed/").with_event_type("typed"))
                    .with_rule(PatternRule::new("^formatted/").with_format(DecodeFormat::Json)),
            );
        let resolver = FormatResolver::from_config(&config).unwrap();

        let resolved = resolver.resolve("logs", "typed/file");
        assert_eq!(resolved.format, DecodeFormat::JsonLines);
        assert_eq!(resolved.event_type.as_deref(), Some("typed"));

        let resolved = resolver.resolve("logs", "formatted/file");
        assert_eq!(resolved.format, DecodeFormat::Json);
        assert!(resolved.event_type.is_none());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let resolver = FormatResolver::from_config(&logs_config()).unwrap();

        let first = resolver.resolve("logs", "elb/file.log");
        for _ in 0..10 {
            assert_eq!(resolver.resolve("logs", "elb/file.log"), first);
        }
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let config = IngestConfig::new("url")
            .with_bucket("logs", BucketConfig::new().with_rule(PatternRule::new("^elb/(")));

        assert!(FormatResolver::from_config(&config).is_err());
    }
}
