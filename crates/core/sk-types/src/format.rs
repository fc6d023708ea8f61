//! Content decoding formats.

use serde::{Deserialize, Serialize};

/// How the fetched file content is decoded into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFormat {
    /// Line-oriented plain text; one event per line
    #[default]
    Plain,

    /// Newline-delimited JSON; one parsed event per line
    JsonLines,

    /// A single JSON document for the whole file
    Json,
}

impl std::fmt::Display for DecodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeFormat::Plain => write!(f, "plain"),
            DecodeFormat::JsonLines => write!(f, "json_lines"),
            DecodeFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serde_names() {
        assert_eq!(
            serde_json::to_string(&DecodeFormat::JsonLines).unwrap(),
            r#""json_lines""#
        );
        let format: DecodeFormat = serde_json::from_str(r#""plain""#).unwrap();
        assert_eq!(format, DecodeFormat::Plain);
    }

    #[test]
    fn test_default_is_plain() {
        assert_eq!(DecodeFormat::default(), DecodeFormat::Plain);
    }
}
