//! The main configuration file: which products exist and where they live.
//!
//! ```toml
//! url = "/textgen"
//! forecast_text_cache_size = 20
//! products = ["default.toml", "products/helsinki.toml"]
//!
//! [watch]
//! poll_interval_secs = 5
//! ```
//!
//! Instead of `products`, a `[product_config]` table may map product names
//! to files. Relative paths are resolved against the main file's directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::error::ConfigError;
use crate::config::loader::Document;
use crate::config::tree::{flatten, ConfigItemVector, ALLOW_ALL};

pub const DEFAULT_URL: &str = "/textgen";
pub const DEFAULT_FORECAST_TEXT_CACHE_SIZE: usize = 20;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Product file names the watcher reacts to.
pub const DEFAULT_FILE_PATTERN: &str = r"^[\w,\s-]+\.[A-Za-z]+$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub file_pattern: String,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainConfig {
    pub path: PathBuf,
    /// Product name → absolute product file path.
    pub products: BTreeMap<String, PathBuf>,
    pub url: String,
    pub forecast_text_cache_size: usize,
    pub watch: WatchSettings,
}

impl MainConfig {
    /// Read the main configuration file.
    ///
    /// Every failure becomes [`ConfigError::MainConfig`] with a detail telling
    /// whether the file is missing or malformed.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let path = absolute(path);
        Self::read_inner(&path).map_err(|source| {
            let detail = if path.exists() {
                format!("Syntax error in file '{}'!", path.display())
            } else {
                format!("File '{}' does not exist!", path.display())
            };
            ConfigError::MainConfig {
                path: path.clone(),
                details: vec![detail],
                source: Some(Box::new(source)),
            }
        })
    }

    fn read_inner(path: &Path) -> Result<Self, ConfigError> {
        let doc = Document::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("/"));

        let mut products = BTreeMap::new();
        for (name, file) in product_items(&doc)? {
            let file = PathBuf::from(file);
            let file = if file.is_relative() { base.join(file) } else { file };
            products.insert(name, absolute(&file));
        }

        let url = doc.lookup_str("url").unwrap_or(DEFAULT_URL).to_string();
        let forecast_text_cache_size = match doc.lookup_i64("forecast_text_cache_size") {
            None => DEFAULT_FORECAST_TEXT_CACHE_SIZE,
            Some(size) => usize::try_from(size).map_err(|_| ConfigError::WrongType {
                key: "forecast_text_cache_size".to_string(),
                expected: "a non-negative integer",
            })?,
        };

        let mut watch = WatchSettings::default();
        if let Some(secs) = doc.lookup_i64("watch.poll_interval_secs") {
            let secs = u64::try_from(secs).ok().filter(|s| *s > 0).ok_or(ConfigError::WrongType {
                key: "watch.poll_interval_secs".to_string(),
                expected: "a positive integer",
            })?;
            watch.poll_interval = Duration::from_secs(secs);
        }
        if let Some(pattern) = doc.lookup_str("watch.file_pattern") {
            watch.file_pattern = pattern.to_string();
        }

        Ok(Self {
            path: path.to_path_buf(),
            products,
            url,
            forecast_text_cache_size,
            watch,
        })
    }

    /// Parent directories of every product file.
    pub fn directories_to_monitor(&self) -> BTreeSet<PathBuf> {
        self.products
            .values()
            .filter_map(|file| file.parent())
            .map(Path::to_path_buf)
            .collect()
    }
}

/// `(product name, file)` pairs, from `products` or `product_config`.
fn product_items(doc: &Document) -> Result<ConfigItemVector, ConfigError> {
    let mut items = ConfigItemVector::new();

    if let Some(products) = doc.lookup("products") {
        let Some(files) = products.as_array() else {
            return Ok(items);
        };
        for (i, file) in files.iter().enumerate() {
            let file = file.as_str().ok_or_else(|| ConfigError::WrongType {
                key: format!("products[{i}]"),
                expected: "a string",
            })?;
            let name = Path::new(file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            items.push((name, file.to_string()));
        }
        return Ok(items);
    }

    let mut flat = ConfigItemVector::new();
    flatten(doc, "product_config", &[ALLOW_ALL.to_string()], &mut flat)?;
    for (key, file) in flat {
        let name = key.split_once('.').map_or(key.as_str(), |(_, rest)| rest).to_string();
        items.push((name, file));
    }
    Ok(items)
}

/// Absolute form of `path` without touching the file system.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
