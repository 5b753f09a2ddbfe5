//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::error::ConfigError;

/// A parsed configuration file.
///
/// Settings are addressed with dotted paths (`misc.language`,
/// `geometry_tables.additional_tables`), the same way the sections are named
/// in the files themselves.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    root: Table,
}

impl Document {
    /// Load and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse `content` as if it had been read from `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let root: Table = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Table {
        &self.root
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Look up a setting by dotted path.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut node = self.root.get(parts.next()?)?;
        for part in parts {
            node = node.as_table()?.get(part)?;
        }
        Some(node)
    }

    /// String value at `key`; `None` if missing or not a string.
    pub fn lookup_str(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(Value::as_str)
    }

    /// Integer value at `key`; `None` if missing or not an integer.
    pub fn lookup_i64(&self, key: &str) -> Option<i64> {
        self.lookup(key).and_then(Value::as_integer)
    }

    /// Flag at `key`, accepting either a boolean or an integer (non-zero is true).
    pub fn lookup_flag(&self, key: &str) -> Option<bool> {
        match self.lookup(key)? {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// String value at `key`, failing if it is missing or has another type.
    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self.lookup(key) {
            None => Err(ConfigError::MissingSetting { key: key.to_string() }),
            Some(value) => value.as_str().ok_or_else(|| ConfigError::WrongType {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }
}
