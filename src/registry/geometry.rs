//! Geometry storage, weather areas and the GIS collaborator.
//!
//! # Responsibilities
//! - Hold the polygons (SVG path strings) and points fetched from the GIS
//!   backend, keyed by normalized name
//! - Turn a stored geometry or an SVG mask file into a [`WeatherArea`]
//! - Define the [`GisEngine`] seam the registry fetches geometries through
//!
//! # Design Decisions
//! - Names are normalized on insert and on lookup, so callers may pass
//!   either form
//! - The GIS engine only ever writes into a storage owned by one rebuild;
//!   published storages are never mutated

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::product::GeometryIdentifier;

/// Lowercase `name` and fold accented Latin letters to their base letter.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'ä' | 'å' | 'á' | 'à' | 'â' | 'ã' => out.push('a'),
            'ö' | 'ø' | 'ó' | 'ò' | 'ô' | 'õ' => out.push('o'),
            'ü' | 'ú' | 'ù' | 'û' => out.push('u'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'í' | 'ì' | 'î' | 'ï' => out.push('i'),
            'ý' | 'ÿ' => out.push('y'),
            'ç' => out.push('c'),
            'ñ' => out.push('n'),
            'š' => out.push('s'),
            'ž' => out.push('z'),
            'æ' => out.push_str("ae"),
            'ß' => out.push_str("ss"),
            other => out.push(other),
        }
    }
    out
}

/// A geographic area a forecast text can be generated for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WeatherArea {
    Polygon { svg_path: String, name: String },
    Point { lon: f64, lat: f64, name: String },
    /// SVG mask file, optionally followed by `:<radius>`.
    File { spec: String, name: String },
}

impl WeatherArea {
    pub fn name(&self) -> &str {
        match self {
            WeatherArea::Polygon { name, .. } | WeatherArea::Point { name, .. } | WeatherArea::File { name, .. } => {
                name
            }
        }
    }
}

/// Mask name → area, for one product.
pub type WeatherAreas = BTreeMap<String, WeatherArea>;

/// Polygons and points keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct GeometryStorage {
    polygons: HashMap<String, String>,
    points: HashMap<String, (f64, f64)>,
}

impl GeometryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_polygon(&mut self, name: &str, svg_path: impl Into<String>) {
        self.polygons.insert(normalize_name(name), svg_path.into());
    }

    pub fn insert_point(&mut self, name: &str, lon: f64, lat: f64) {
        self.points.insert(normalize_name(name), (lon, lat));
    }

    pub fn geo_object_exists(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.polygons.contains_key(&key) || self.points.contains_key(&key)
    }

    pub fn is_polygon(&self, name: &str) -> bool {
        self.polygons.contains_key(&normalize_name(name))
    }

    pub fn svg_path(&self, name: &str) -> Option<&str> {
        self.polygons.get(&normalize_name(name)).map(String::as_str)
    }

    /// `(lon, lat)` of a stored point.
    pub fn point(&self, name: &str) -> Option<(f64, f64)> {
        self.points.get(&normalize_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.polygons.len() + self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Area for the geometry stored under `key`, named `area_name` (normalized).
    ///
    /// A polygon wins over a point stored under the same key.
    pub fn make_area(&self, key: &str, area_name: &str) -> Option<WeatherArea> {
        let name = normalize_name(area_name);
        if let Some(svg_path) = self.svg_path(key) {
            return Some(WeatherArea::Polygon {
                svg_path: svg_path.to_string(),
                name,
            });
        }
        self.point(key).map(|(lon, lat)| WeatherArea::Point { lon, lat, name })
    }
}

#[derive(Debug, Error)]
pub enum GisError {
    #[error("failed to read geometry file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse geometry file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("geometry entry '{name}' has neither svg nor point")]
    EmptyGeometry { name: String },

    #[error("GIS backend error: {0}")]
    Backend(String),
}

/// Source of polygon and point geometries.
pub trait GisEngine: Send + Sync {
    /// Add every geometry reachable through `identifiers` to `storage`.
    fn populate_geometry_storage(
        &self,
        identifiers: &[GeometryIdentifier],
        storage: &mut GeometryStorage,
    ) -> Result<(), GisError>;
}

/// A GIS engine that serves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGisEngine;

impl GisEngine for NoGisEngine {
    fn populate_geometry_storage(&self, _: &[GeometryIdentifier], _: &mut GeometryStorage) -> Result<(), GisError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StaticGeometry {
    name: String,
    /// Geometry source name; matched against [`GeometryIdentifier::source_name`].
    #[serde(default)]
    source: String,
    svg: Option<String>,
    /// `[lon, lat]`
    point: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StaticGeometryFile {
    #[serde(default)]
    geometry: Vec<StaticGeometry>,
}

/// Geometries read from a TOML file instead of a database:
///
/// ```toml
/// [[geometry]]
/// name = "Uusimaa"
/// source = "regions"
/// svg = "M 24.0 60.1 L 25.5 60.2 Z"
///
/// [[geometry]]
/// name = "Helsinki"
/// point = [24.94, 60.17]
/// ```
///
/// Each geometry is stored under `name + source`. Geometries with a source
/// are only served when some requested identifier has that source name.
#[derive(Debug, Clone, Default)]
pub struct StaticGisEngine {
    geometries: Vec<StaticGeometry>,
}

impl StaticGisEngine {
    pub fn from_file(path: &Path) -> Result<Self, GisError> {
        let content = fs::read_to_string(path).map_err(|source| GisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &content)
    }

    pub fn from_toml(path: &Path, content: &str) -> Result<Self, GisError> {
        let file: StaticGeometryFile = toml::from_str(content).map_err(|source| GisError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(g) = file.geometry.iter().find(|g| g.svg.is_none() && g.point.is_none()) {
            return Err(GisError::EmptyGeometry { name: g.name.clone() });
        }
        Ok(Self {
            geometries: file.geometry,
        })
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

impl GisEngine for StaticGisEngine {
    fn populate_geometry_storage(
        &self,
        identifiers: &[GeometryIdentifier],
        storage: &mut GeometryStorage,
    ) -> Result<(), GisError> {
        let served = |g: &&StaticGeometry| g.source.is_empty() || identifiers.iter().any(|id| id.source_name == g.source);

        for g in self.geometries.iter().filter(served) {
            let key = format!("{}{}", g.name, g.source);
            match (&g.svg, g.point) {
                (Some(svg), _) => storage.insert_polygon(&key, svg.clone()),
                (None, Some([lon, lat])) => storage.insert_point(&key, lon, lat),
                (None, None) => {}
            }
        }
        Ok(())
    }
}
