//! Unit configuration sources.
//!
//! Deployment descriptors carry configuration as an opaque JSON blob. The
//! blob is declared either inline or as a `file:`-prefixed path reference,
//! and is handed to the platform unmodified once resolved.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving a configuration source.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The referenced configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid JSON.
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where a unit's configuration blob comes from.
///
/// Parsed from the declarative string form with [`ConfigSource::parse`]:
/// a `file:` prefix references a file on disk, anything else is taken as
/// inline JSON text, and the empty string means "no configuration".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// No configuration; resolves to JSON `null`.
    #[default]
    None,

    /// Inline JSON text.
    Inline(String),

    /// Path to a UTF-8 JSON file.
    File(PathBuf),
}

impl ConfigSource {
    /// Interpret a declarative config string.
    ///
    /// `file:<path>` becomes [`ConfigSource::File`]; any other non-empty
    /// value is [`ConfigSource::Inline`]; the empty string is
    /// [`ConfigSource::None`].
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        if spec.is_empty() {
            Self::None
        } else if let Some(path) = spec.strip_prefix("file:") {
            Self::File(PathBuf::from(path))
        } else {
            Self::Inline(spec.to_owned())
        }
    }

    /// Inline JSON text source.
    #[must_use]
    pub fn inline(text: impl Into<String>) -> Self {
        Self::Inline(text.into())
    }

    /// File-backed source.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// Resolve the source to a JSON value.
    ///
    /// File sources are read as UTF-8 bytes and the decoded text is parsed
    /// as JSON; inline sources are parsed directly; [`ConfigSource::None`]
    /// resolves to `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if a referenced file cannot be read, or
    /// [`ConfigError::Parse`] if the text is not valid JSON.
    pub fn resolve(&self) -> Result<serde_json::Value, ConfigError> {
        match self {
            Self::None => Ok(serde_json::Value::Null),
            Self::Inline(text) => Ok(serde_json::from_str(text)?),
            Self::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(serde_json::from_str(&text)?)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_recognizes_file_prefix() {
        assert_eq!(
            ConfigSource::parse("file:/tmp/config.json"),
            ConfigSource::File(PathBuf::from("/tmp/config.json"))
        );
    }

    #[test]
    fn parse_treats_other_text_as_inline() {
        assert_eq!(
            ConfigSource::parse(r#"{"port": 8080}"#),
            ConfigSource::Inline(r#"{"port": 8080}"#.to_owned())
        );
    }

    #[test]
    fn parse_empty_is_none() {
        assert_eq!(ConfigSource::parse(""), ConfigSource::None);
    }

    #[test]
    fn none_resolves_to_null() {
        #[allow(clippy::unwrap_used)] // Test code: resolution cannot fail for None
        let value = ConfigSource::None.resolve().unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn inline_resolves_to_parsed_value() {
        #[allow(clippy::unwrap_used)] // Test code: literal is valid JSON
        let value = ConfigSource::inline(r#"{"name": "widget", "count": 3}"#)
            .resolve()
            .unwrap();
        assert_eq!(value["name"], "widget");
        assert_eq!(value["count"], 3);
    }

    #[test]
    fn file_resolves_to_file_content() {
        #[allow(clippy::unwrap_used)] // Test code: tempfile setup
        {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, r#"{{"loaded": true}}"#).unwrap();

            let value = ConfigSource::file(file.path()).resolve().unwrap();
            assert_eq!(value["loaded"], true);
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = ConfigSource::file("/nonexistent/gantry-config.json").resolve();
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn malformed_inline_is_a_parse_error() {
        let result = ConfigSource::inline("{not json").resolve();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
