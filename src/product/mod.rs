//! Product configuration.
//!
//! # Data Flow
//! ```text
//! product file
//!     → parse.rs   (ParsedProduct: plain data, nothing inherited)
//!     → resolve.rs (ProductConfig: default product applied, hard-coded fallbacks)
//!     → shared via Arc inside a registry snapshot
//! ```
//!
//! A resolved [`ProductConfig`] is immutable. The registry stamps its
//! last-modified time before publishing it.

pub mod geometry;
pub mod parse;
pub mod resolve;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::tree::{ConfigItem, ConfigItemVector};

pub use geometry::{GeometryIdentifier, GeometryTables};
pub use parse::{MySqlDictionary, ParsedProduct};

/// Name of the product every other product inherits from.
pub const DEFAULT_PRODUCT: &str = "default";

pub const DEFAULT_LANGUAGE: &str = "fi";
pub const DEFAULT_LOCALE: &str = "fi_FI.UTF-8";
pub const DEFAULT_FORMATTER: &str = "html";
pub const DEFAULT_TIME_FORMAT: &str = "iso";
pub const DEFAULT_DICTIONARY: &str = "multimysql";
pub const DEFAULT_TIMEZONE: &str = "Europe/Helsinki";

pub(crate) const TIMEZONE_PREFIX: &str = "qdtext::timezone::";
pub(crate) const TIMEZONE_DEFAULT_KEY: &str = "qdtext::timezone::default";

/// Errors from product accessors.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("ProductConfig::{function}(index)-function invalid index parameter: {index} (size {len})")]
    IndexOutOfRange {
        function: &'static str,
        index: usize,
        len: usize,
    },

    #[error("product '{product}' has no geometry identifiers")]
    NoGeometryIdentifier { product: String },
}

/// One product's fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductConfig {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) language: String,
    pub(crate) formatter: String,
    pub(crate) locale: String,
    pub(crate) time_format: String,
    pub(crate) dictionary: String,
    pub(crate) file_dictionaries: String,
    pub(crate) forest_fire_warning_directory: String,
    pub(crate) frost_season: bool,
    pub(crate) mysql: MySqlDictionary,
    pub(crate) parameter_mappings: BTreeMap<String, String>,
    pub(crate) geometry: GeometryTables,
    pub(crate) masks: ConfigItemVector,
    pub(crate) fire_warning_area_codes: ConfigItemVector,
    pub(crate) forecast_data: ConfigItemVector,
    pub(crate) unit_formats: ConfigItemVector,
    pub(crate) output_document: ConfigItemVector,
    pub(crate) area: ConfigItemVector,
    pub(crate) area_timezones: BTreeMap<String, String>,
    /// Epoch seconds; zero when the file has not changed since start-up.
    pub(crate) last_modified: u64,
}

fn item_at<'a>(items: &'a [ConfigItem], function: &'static str, index: usize) -> Result<&'a ConfigItem, ProductError> {
    items.get(index).ok_or(ProductError::IndexOutOfRange {
        function,
        index,
        len: items.len(),
    })
}

impl ProductConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn formatter(&self) -> &str {
        &self.formatter
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn dictionary(&self) -> &str {
        &self.dictionary
    }

    pub fn file_dictionaries(&self) -> &str {
        &self.file_dictionaries
    }

    pub fn forest_fire_warning_directory(&self) -> &str {
        &self.forest_fire_warning_directory
    }

    pub fn is_frost_season(&self) -> bool {
        self.frost_season
    }

    pub fn mysql_dictionary(&self) -> &MySqlDictionary {
        &self.mysql
    }

    pub fn parameter_mappings(&self) -> &BTreeMap<String, String> {
        &self.parameter_mappings
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    pub(crate) fn with_last_modified(mut self, epoch_secs: u64) -> Self {
        self.last_modified = epoch_secs;
        self
    }

    /// Time zone for `area`, or the product's default time zone.
    pub fn area_time_zone(&self, area: &str) -> &str {
        self.area_timezones
            .get(&format!("{TIMEZONE_PREFIX}{area}"))
            .or_else(|| self.area_timezones.get(TIMEZONE_DEFAULT_KEY))
            .map_or(DEFAULT_TIMEZONE, String::as_str)
    }

    pub fn area_time_zones(&self) -> &BTreeMap<String, String> {
        &self.area_timezones
    }

    // Geometry

    pub fn geometry_tables(&self) -> &GeometryTables {
        &self.geometry
    }

    pub fn number_of_geometry_identifiers(&self) -> usize {
        self.geometry.len()
    }

    pub fn geometry_identifiers(&self) -> Vec<GeometryIdentifier> {
        self.geometry.identifiers().cloned().collect()
    }

    pub fn default_geometry_identifier(&self) -> Result<&GeometryIdentifier, ProductError> {
        self.geometry
            .default_identifier()
            .ok_or_else(|| ProductError::NoGeometryIdentifier {
                product: self.name.clone(),
            })
    }

    // Counted, index-checked views

    pub fn number_of_forecast_data_configs(&self) -> usize {
        self.forecast_data.len()
    }

    /// `(forecast name, query data)` pair at `index`.
    pub fn forecast_data_config(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.forecast_data, "getForecastDataConfig", index)
    }

    pub fn forecast_data_configs(&self) -> &[ConfigItem] {
        &self.forecast_data
    }

    pub fn number_of_unit_format_configs(&self) -> usize {
        self.unit_formats.len()
    }

    /// `(unit name, format)` pair at `index`, e.g. `("celsius", "SI")`.
    pub fn unit_format_config(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.unit_formats, "getUnitFormatConfig", index)
    }

    pub fn unit_format_configs(&self) -> &[ConfigItem] {
        &self.unit_formats
    }

    pub fn number_of_output_document_configs(&self) -> usize {
        self.output_document.len()
    }

    pub fn output_document_config(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.output_document, "getOutputDocumentConfig", index)
    }

    pub fn output_document_configs(&self) -> &[ConfigItem] {
        &self.output_document
    }

    pub fn number_of_area_configs(&self) -> usize {
        self.area.len()
    }

    pub fn area_config(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.area, "getAreaConfig", index)
    }

    pub fn area_configs(&self) -> &[ConfigItem] {
        &self.area
    }

    pub fn number_of_masks(&self) -> usize {
        self.masks.len()
    }

    /// `(mask name, value)` at `index`; the value is a geometry name or an SVG file path.
    pub fn mask(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.masks, "getMask", index)
    }

    pub fn masks(&self) -> &[ConfigItem] {
        &self.masks
    }

    pub fn number_of_fire_warning_area_codes(&self) -> usize {
        self.fire_warning_area_codes.len()
    }

    pub fn fire_warning_area_code(&self, index: usize) -> Result<&ConfigItem, ProductError> {
        item_at(&self.fire_warning_area_codes, "getFireWarningAreaCode", index)
    }

    pub fn fire_warning_area_codes(&self) -> &[ConfigItem] {
        &self.fire_warning_area_codes
    }

    /// Whether the backing file changed within the last `interval` seconds.
    pub fn is_modified(&self, interval: u64) -> bool {
        self.is_modified_at(interval, SystemClock.now())
    }

    pub fn is_modified_at(&self, interval: u64, now: u64) -> bool {
        now.saturating_sub(self.last_modified) <= interval
    }
}
