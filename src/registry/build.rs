//! Building a new snapshot from the main configuration.
//!
//! # Data Flow
//! ```text
//! MainConfig
//!     → update_product_configs (default product first, then the rest against it)
//!     → load_geometries        (GIS engine fills a fresh storage)
//!     → read_masks             (mask values → weather areas)
//!     → Snapshot
//! ```
//!
//! Cancellation is checked between files, between GIS calls and before the
//! snapshot is handed back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::config::error::ConfigError;
use crate::config::watcher::ChangeSet;
use crate::lifecycle::CancelFlag;
use crate::observability::metrics;
use crate::product::{GeometryIdentifier, ParsedProduct, ProductConfig, DEFAULT_PRODUCT};
use crate::registry::geometry::{GeometryStorage, GisEngine, WeatherArea, WeatherAreas};
use crate::registry::main_config::MainConfig;
use crate::registry::snapshot::Snapshot;
use crate::registry::RegistryError;

pub(crate) struct Builder<'a> {
    pub gis: &'a dyn GisEngine,
    pub clock: &'a dyn Clock,
    pub cancel: &'a CancelFlag,
}

/// Products of one rebuild, with the first-pass records they came from.
pub(crate) struct ProductSet {
    pub products: BTreeMap<String, Arc<ProductConfig>>,
    pub parsed: HashMap<PathBuf, Arc<ParsedProduct>>,
}

impl Builder<'_> {
    /// Build a complete snapshot.
    ///
    /// `changes` is `None` for the initial load. With `previous`, first-pass
    /// records of files outside `changes` are reused.
    pub fn build(
        &self,
        main: &MainConfig,
        changes: Option<&ChangeSet>,
        previous: Option<&Snapshot>,
    ) -> Result<Snapshot, RegistryError> {
        let ProductSet { products, parsed } = self.update_product_configs(main, changes, previous)?;
        let geometries = self.load_geometries(&products)?;
        let masks = self.read_masks(&geometries, &products)?;
        self.cancel.checkpoint()?;

        Ok(Snapshot {
            products,
            parsed,
            geometries,
            masks,
            default_url: main.url.clone(),
            forecast_text_cache_size: main.forecast_text_cache_size,
            active: true,
        })
    }

    /// Read every declared product.
    ///
    /// A default product file that cannot be read fails the whole rebuild.
    /// Any other broken product is logged and left out.
    pub fn update_product_configs(
        &self,
        main: &MainConfig,
        changes: Option<&ChangeSet>,
        previous: Option<&Snapshot>,
    ) -> Result<ProductSet, RegistryError> {
        self.cancel.checkpoint()?;

        let mut set = ProductSet {
            products: BTreeMap::new(),
            parsed: HashMap::new(),
        };
        let mut erroneous: BTreeSet<&Path> = BTreeSet::new();

        let default = match main.products.get(DEFAULT_PRODUCT) {
            Some(path) => {
                let product = self.build_product(DEFAULT_PRODUCT, path, None, changes, previous, &mut set)?;
                set.products.insert(DEFAULT_PRODUCT.to_string(), Arc::clone(&product));
                Some(product)
            }
            None => None,
        };

        for (name, path) in &main.products {
            if name == DEFAULT_PRODUCT {
                continue;
            }
            self.cancel.checkpoint()?;

            match self.build_product(name, path, default.as_deref(), changes, previous, &mut set) {
                Ok(product) => {
                    set.products.insert(name.clone(), product);
                }
                Err(e) => {
                    error!(product = %name, path = %path.display(), error = %e, "{}", e.summary());
                    metrics::record_product_error();
                    erroneous.insert(path);
                }
            }
        }

        if let Some(changes) = changes {
            for f in &changes.deleted {
                info!(path = %f.display(), "File '{}' deleted!", f.display());
            }
            for f in changes.modified.iter().filter(|f| !erroneous.contains(f.as_path())) {
                info!(path = %f.display(), "File '{}' updated!", f.display());
            }
            for f in changes.created.iter().filter(|f| !erroneous.contains(f.as_path())) {
                info!(path = %f.display(), "New file '{}' created!", f.display());
            }
        }

        self.cancel.checkpoint()?;
        Ok(set)
    }

    fn build_product(
        &self,
        name: &str,
        path: &Path,
        parent: Option<&ProductConfig>,
        changes: Option<&ChangeSet>,
        previous: Option<&Snapshot>,
        set: &mut ProductSet,
    ) -> Result<Arc<ProductConfig>, ConfigError> {
        let base = parent.and_then(|p| p.default_geometry_identifier().ok());
        let parsed = self.parse(path, base, changes, previous)?;

        let product = if name == DEFAULT_PRODUCT {
            ProductConfig::resolve_default(name, (*parsed).clone())
        } else {
            ProductConfig::resolve(name, (*parsed).clone(), parent).map_err(|e| match e {
                e @ ConfigError::Product { .. } => e,
                e => {
                    let detail = format!("{e} ({})", path.display());
                    ConfigError::product(path, detail, e)
                }
            })?
        };

        let last_modified = match changes {
            Some(changes) if changes.touched(path) => self.clock.now(),
            _ => previous
                .and_then(|s| s.products.get(name))
                .filter(|p| p.path() == path)
                .map_or(0, |p| p.last_modified()),
        };

        set.parsed.insert(path.to_path_buf(), parsed);
        Ok(Arc::new(product.with_last_modified(last_modified)))
    }

    fn parse(
        &self,
        path: &Path,
        base: Option<&GeometryIdentifier>,
        changes: Option<&ChangeSet>,
        previous: Option<&Snapshot>,
    ) -> Result<Arc<ParsedProduct>, ConfigError> {
        let unchanged = changes.is_some_and(|c| !c.contains(path));
        if unchanged {
            if let Some(cached) = previous.and_then(|s| s.parsed.get(path)) {
                if cached.geometry_base.as_ref() == base {
                    debug!(path = %path.display(), "Reusing unchanged product file");
                    return Ok(Arc::clone(cached));
                }
            }
        }
        ParsedProduct::from_file(path, base).map(Arc::new)
    }

    /// Fetch the geometries of every product into a fresh storage.
    pub fn load_geometries(
        &self,
        products: &BTreeMap<String, Arc<ProductConfig>>,
    ) -> Result<GeometryStorage, RegistryError> {
        let mut storage = GeometryStorage::new();
        for product in products.values() {
            self.cancel.checkpoint()?;
            self.gis
                .populate_geometry_storage(&product.geometry_identifiers(), &mut storage)?;
        }
        self.cancel.checkpoint()?;
        Ok(storage)
    }

    /// Resolve each product's masks.
    ///
    /// A mask value naming a stored geometry becomes that geometry. Otherwise
    /// it is taken as an SVG file, optionally followed by `:<radius>`, and
    /// kept if the file exists. Anything else is dropped.
    pub fn read_masks(
        &self,
        storage: &GeometryStorage,
        products: &BTreeMap<String, Arc<ProductConfig>>,
    ) -> Result<BTreeMap<String, WeatherAreas>, RegistryError> {
        let mut all = BTreeMap::new();

        for (product_name, product) in products {
            let mut areas = WeatherAreas::new();
            for (name, value) in product.masks() {
                self.cancel.checkpoint()?;

                if let Some(area) = storage.make_area(value, value) {
                    areas.insert(name.clone(), area);
                    continue;
                }
                let file = value.split_once(':').map_or(value.as_str(), |(file, _)| file);
                if Path::new(file).exists() {
                    areas.insert(
                        name.clone(),
                        WeatherArea::File {
                            spec: value.clone(),
                            name: name.clone(),
                        },
                    );
                } else {
                    debug!(product = %product_name, mask = %name, value = %value, "Mask not found, ignored");
                }
            }
            all.insert(product_name.clone(), areas);
        }

        self.cancel.checkpoint()?;
        Ok(all)
    }
}
