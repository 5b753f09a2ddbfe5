//! Flat text-generator settings for one product.
//!
//! The text generator reads its settings as `key = value` strings. This
//! module turns a resolved [`ProductConfig`] into that list, applying
//! per-request overrides to unit formats and output-document settings.

use serde::Serialize;

use crate::product::ProductConfig;

/// Ordered `(key, value)` settings, later entries win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextgenSettings {
    entries: Vec<(String, String)>,
}

impl TextgenSettings {
    /// Settings for `product`.
    ///
    /// An override `(name, value)` applies to every overridable key ending
    /// in `name`, compared case-insensitively; the first matching override
    /// wins. Each override that changes a value is appended to `modified`
    /// as `;key=value`.
    pub fn from_product(product: &ProductConfig, overrides: &[(String, String)], modified: &mut String) -> Self {
        let mut settings = TextgenSettings::default();

        settings.set("textgen::frostseason", product.is_frost_season().to_string());

        for (key, value) in product.parameter_mappings() {
            settings.set(key, value.clone());
        }

        for (name, data) in product.forecast_data_configs() {
            settings.set(format!("textgen::{name}"), data.clone());
        }

        for (unit, format) in product.unit_format_configs() {
            let value = overridden(unit, format, overrides, modified);
            settings.set(format!("textgen::units::{unit}::format"), value);
        }

        for (key, value) in product.output_document_configs() {
            let value = overridden(key, value, overrides, modified);
            settings.set(key.clone(), value);
        }

        for (key, value) in product.area_configs() {
            settings.set(key.clone(), value.clone());
        }

        settings.set(
            "qdtext::forestfirewarning::directory",
            product.forest_fire_warning_directory().to_string(),
        );
        for (key, code) in product.fire_warning_area_codes() {
            settings.set(key.clone(), code.clone());
        }

        settings
    }

    fn set(&mut self, key: impl Into<String>, value: String) {
        self.entries.push((key.into(), value));
    }

    /// Effective value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn ends_with_ignore_case(key: &str, suffix: &str) -> bool {
    key.len() >= suffix.len()
        && key.is_char_boundary(key.len() - suffix.len())
        && key[key.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn overridden(key: &str, default: &str, overrides: &[(String, String)], modified: &mut String) -> String {
    let Some((_, value)) = overrides
        .iter()
        .find(|(name, _)| !name.is_empty() && ends_with_ignore_case(key, name))
    else {
        return default.to_string();
    };

    if value != default {
        modified.push(';');
        modified.push_str(key);
        modified.push('=');
        modified.push_str(value);
    }
    value.clone()
}
