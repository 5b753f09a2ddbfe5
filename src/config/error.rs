//! Error type for configuration parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the main or a product configuration file.
///
/// Variants that wrap another failure keep it as `source`, and the ones the
/// registry reports to operators carry human-readable `details` separately
/// from the error class.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting type for '{key}'")]
    UnsupportedType { key: String },

    #[error("setting '{key}' not found")]
    MissingSetting { key: String },

    #[error("setting '{key}' is not {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("include directive under '{key}' nested deeper than {depth} levels")]
    IncludeCycle { key: String, depth: usize },

    #[error("{message}")]
    Section { message: String },

    #[error("error processing product configuration file {}", path.display())]
    Product {
        path: PathBuf,
        details: Vec<String>,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("error reading configuration file {}", path.display())]
    MainConfig {
        path: PathBuf,
        details: Vec<String>,
        #[source]
        source: Option<Box<ConfigError>>,
    },
}

impl ConfigError {
    pub(crate) fn section(message: impl Into<String>) -> Self {
        ConfigError::Section {
            message: message.into(),
        }
    }

    pub(crate) fn product(path: impl Into<PathBuf>, detail: impl Into<String>, source: ConfigError) -> Self {
        ConfigError::Product {
            path: path.into(),
            details: vec![detail.into()],
            source: Box::new(source),
        }
    }

    /// Diagnostic details attached to the error, outermost first.
    pub fn details(&self) -> &[String] {
        match self {
            ConfigError::Product { details, .. } | ConfigError::MainConfig { details, .. } => details,
            _ => &[],
        }
    }

    /// First attached detail, falling back to the error's own message.
    pub fn summary(&self) -> String {
        self.details()
            .first()
            .cloned()
            .unwrap_or_else(|| self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_are_separate_from_message() {
        let err = ConfigError::product(
            "/etc/textgen/a.toml",
            "Product configuration file '/etc/textgen/a.toml' not found, please check the filename!",
            ConfigError::MissingSetting { key: "mask".into() },
        );

        assert_eq!(err.details().len(), 1);
        assert!(err.to_string().contains("/etc/textgen/a.toml"));
        assert!(err.summary().starts_with("Product configuration file"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_summary_falls_back_to_message() {
        let err = ConfigError::section("mask-section missing, cannot continue!");
        assert!(err.details().is_empty());
        assert_eq!(err.summary(), "mask-section missing, cannot continue!");
    }
}
