//! One immutable generation of the registry.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::product::{GeometryIdentifier, ParsedProduct, ProductConfig};
use crate::registry::geometry::{normalize_name, GeometryStorage, WeatherArea, WeatherAreas};
use crate::registry::RegistryError;

/// Products, geometries and masks built together by one rebuild.
///
/// Readers take an `Arc<Snapshot>` once per request and read everything
/// from it, so all three always belong to the same generation.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub(crate) products: BTreeMap<String, Arc<ProductConfig>>,
    /// First-pass records by file, reused by the next rebuild for files that did not change.
    pub(crate) parsed: HashMap<PathBuf, Arc<ParsedProduct>>,
    pub(crate) geometries: GeometryStorage,
    pub(crate) masks: BTreeMap<String, WeatherAreas>,
    pub(crate) default_url: String,
    pub(crate) forecast_text_cache_size: usize,
    pub(crate) active: bool,
}

impl Snapshot {
    /// Empty snapshot published when the main configuration cannot be read.
    pub fn inactive(default_url: impl Into<String>, forecast_text_cache_size: usize) -> Self {
        Self {
            default_url: default_url.into(),
            forecast_text_cache_size,
            active: false,
            ..Default::default()
        }
    }

    /// `false` after a failed hot reload emptied the registry.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn product_config(&self, name: &str) -> Result<&Arc<ProductConfig>, RegistryError> {
        self.products.get(name).ok_or_else(|| RegistryError::ProductNotFound {
            name: name.to_string(),
        })
    }

    pub fn product_config_exists(&self, name: &str) -> bool {
        self.products.contains_key(name)
    }

    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.products.keys().map(String::as_str)
    }

    pub fn products(&self) -> &BTreeMap<String, Arc<ProductConfig>> {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product_masks(&self, name: &str) -> Result<&WeatherAreas, RegistryError> {
        self.masks.get(name).ok_or_else(|| RegistryError::MaskSetNotFound {
            name: name.to_string(),
        })
    }

    pub fn geometries(&self) -> &GeometryStorage {
        &self.geometries
    }

    /// Whether `name` exists in the geometry source `areasource`.
    pub fn geo_object_exists(&self, name: &str, areasource: &str) -> bool {
        self.geometries.geo_object_exists(&format!("{name}{areasource}"))
    }

    /// Area for a named geometry; the area takes the normalized `name`.
    pub fn make_postgis_area(&self, name: &str, areasource: &str) -> Result<WeatherArea, RegistryError> {
        self.geometries
            .make_area(&format!("{name}{areasource}"), name)
            .ok_or_else(|| RegistryError::GeometryNotFound {
                name: normalize_name(&format!("{name}{areasource}")),
            })
    }

    pub fn default_url(&self) -> &str {
        &self.default_url
    }

    pub fn forecast_text_cache_size(&self) -> usize {
        self.forecast_text_cache_size
    }

    pub fn is_frost_season(&self, product: &str) -> Result<bool, RegistryError> {
        Ok(self.product_config(product)?.is_frost_season())
    }

    pub fn area_time_zone(&self, product: &str, area: &str) -> Result<&str, RegistryError> {
        Ok(self.product_config(product)?.area_time_zone(area))
    }

    pub fn default_geometry_identifier(&self, product: &str) -> Result<&GeometryIdentifier, RegistryError> {
        Ok(self.product_config(product)?.default_geometry_identifier()?)
    }
}
