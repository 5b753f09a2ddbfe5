//! Second pass: inheritance from the default product.
//!
//! The default product is taken as written: no fallbacks, no required
//! sections. Those apply only to the products resolved against it.
//!
//! # Rules
//! - parameter mappings and area time zones: union, the product wins
//! - geometry identifiers, forecast data, masks, unit formats, area settings:
//!   taken wholesale from the parent when the product has none
//! - forecast data and masks are mandatory once inheritance is done
//! - scalars: own value, else parent's, else the hard-coded default

use crate::config::error::ConfigError;
use crate::product::parse::ParsedProduct;
use crate::product::{
    ProductConfig, DEFAULT_DICTIONARY, DEFAULT_FORMATTER, DEFAULT_LANGUAGE, DEFAULT_LOCALE, DEFAULT_TIME_FORMAT,
};

fn pick(own: Option<String>, inherited: Option<&str>, fallback: &str) -> String {
    own.filter(|v| !v.is_empty())
        .or_else(|| inherited.filter(|v| !v.is_empty()).map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

impl ProductConfig {
    /// The default product, exactly as its file states it.
    pub fn resolve_default(name: &str, parsed: ParsedProduct) -> Self {
        ProductConfig {
            name: name.to_string(),
            path: parsed.path,
            language: parsed.language.unwrap_or_default(),
            formatter: parsed.formatter.unwrap_or_default(),
            locale: parsed.locale.unwrap_or_default(),
            time_format: parsed.time_format.unwrap_or_default(),
            dictionary: parsed.dictionary.unwrap_or_default(),
            file_dictionaries: parsed.file_dictionaries.unwrap_or_default(),
            forest_fire_warning_directory: parsed.forest_fire_warning_directory.unwrap_or_default(),
            frost_season: parsed.frost_season,
            mysql: parsed.mysql,
            parameter_mappings: parsed.parameter_mappings,
            geometry: parsed.geometry,
            masks: parsed.masks,
            fire_warning_area_codes: parsed.fire_warning_area_codes,
            forecast_data: parsed.forecast_data,
            unit_formats: parsed.unit_formats,
            output_document: parsed.output_document,
            area: parsed.area,
            area_timezones: parsed.area_timezones,
            last_modified: 0,
        }
    }

    /// Resolve `parsed` against the default product.
    ///
    /// With `parent = None` (no default product declared) only the
    /// hard-coded fallbacks apply.
    pub fn resolve(name: &str, parsed: ParsedProduct, parent: Option<&ProductConfig>) -> Result<Self, ConfigError> {
        let ParsedProduct {
            path,
            language,
            formatter,
            locale,
            time_format,
            dictionary,
            file_dictionaries,
            forest_fire_warning_directory,
            frost_season,
            mut mysql,
            mut parameter_mappings,
            mut geometry,
            geometry_base: _,
            mut masks,
            fire_warning_area_codes,
            mut forecast_data,
            mut unit_formats,
            output_document,
            mut area,
            mut area_timezones,
        } = parsed;

        if let Some(parent) = parent {
            for (key, value) in &parent.parameter_mappings {
                parameter_mappings.entry(key.clone()).or_insert_with(|| value.clone());
            }
            if geometry.is_empty() {
                geometry = parent.geometry.clone();
            }
        }

        if forecast_data.is_empty() {
            match parent.filter(|p| !p.forecast_data.is_empty()) {
                Some(p) => forecast_data = p.forecast_data.clone(),
                None => return Err(ConfigError::section("forecast_data-section missing, cannot continue!")),
            }
        }

        if masks.is_empty() {
            match parent.filter(|p| !p.masks.is_empty()) {
                Some(p) => masks = p.masks.clone(),
                None => return Err(ConfigError::section("mask-section missing, cannot continue!")),
            }
        }

        if let Some(parent) = parent {
            if mysql.host.is_empty() {
                mysql.host = parent.mysql.host.clone();
            }
            if mysql.database.is_empty() {
                mysql.database = parent.mysql.database.clone();
            }
            if mysql.username.is_empty() {
                mysql.username = parent.mysql.username.clone();
            }
            if mysql.password.is_empty() {
                mysql.password = parent.mysql.password.clone();
            }
            if unit_formats.is_empty() {
                unit_formats = parent.unit_formats.clone();
            }
            if area.is_empty() {
                area = parent.area.clone();
            }
            for (key, value) in &parent.area_timezones {
                area_timezones.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let inherited = |f: fn(&ProductConfig) -> &str| parent.map(f);

        Ok(ProductConfig {
            name: name.to_string(),
            path,
            language: pick(language, inherited(|p| p.language.as_str()), DEFAULT_LANGUAGE),
            formatter: pick(formatter, inherited(|p| p.formatter.as_str()), DEFAULT_FORMATTER),
            locale: pick(locale, inherited(|p| p.locale.as_str()), DEFAULT_LOCALE),
            time_format: pick(time_format, inherited(|p| p.time_format.as_str()), DEFAULT_TIME_FORMAT),
            dictionary: pick(dictionary, inherited(|p| p.dictionary.as_str()), DEFAULT_DICTIONARY),
            file_dictionaries: pick(file_dictionaries, inherited(|p| p.file_dictionaries.as_str()), ""),
            forest_fire_warning_directory: forest_fire_warning_directory.unwrap_or_default(),
            frost_season,
            mysql,
            parameter_mappings,
            geometry,
            masks,
            fire_warning_area_codes,
            forecast_data,
            unit_formats,
            output_document,
            area,
            area_timezones,
            last_modified: 0,
        })
    }
}
