//! Configuration registry.
//!
//! # Data Flow
//! ```text
//! init:
//!     MainConfig::read → Builder::build → validation → ArcSwap<Snapshot>
//!
//! reload (directory watcher):
//!     rebuild lock → MainConfig::read ─┬─ fails → publish an empty, inactive snapshot
//!                                      └─ ok    → Builder::build → ArcSwap::store
//!
//! readers:
//!     Registry::snapshot() → Arc<Snapshot> kept for the whole request
//! ```
//!
//! # Design Decisions
//! - Readers never lock; a rebuild does all its I/O before the single store
//! - Rebuilds are serialized by a mutex that readers never touch
//! - A cancelled rebuild publishes nothing

pub mod build;
pub mod geometry;
pub mod main_config;
pub mod snapshot;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::error::ConfigError;
use crate::config::validation::{validate_dictionaries, ValidationError};
use crate::config::watcher::ChangeSet;
use crate::lifecycle::{CancelFlag, Cancelled};
use crate::observability::metrics;
use crate::product::{GeometryIdentifier, ProductConfig, ProductError};

use build::Builder;
pub use geometry::{
    normalize_name, GeometryStorage, GisEngine, GisError, NoGisEngine, StaticGisEngine, WeatherArea, WeatherAreas,
};
pub use main_config::{MainConfig, WatchSettings};
pub use snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{name} configuration not found!")]
    ProductNotFound { name: String },

    #[error("geometry '{name}' not found")]
    GeometryNotFound { name: String },

    #[error("no masks for product '{name}'")]
    MaskSetNotFound { name: String },

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Gis(#[from] GisError),

    #[error("Textgenplugin configuration error! {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("configuration rebuild cancelled")]
    Cancelled,
}

impl From<Cancelled> for RegistryError {
    fn from(_: Cancelled) -> Self {
        RegistryError::Cancelled
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// What a reload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot with this many products was published.
    Published { products: usize },
    /// The rebuild failed fatally and an empty snapshot was published.
    Inactive { reason: String },
}

/// Hot-reloadable set of product configurations.
pub struct Registry {
    main: MainConfig,
    current: ArcSwap<Snapshot>,
    rebuild: Mutex<()>,
    gis: Arc<dyn GisEngine>,
    clock: Arc<dyn Clock>,
    cancel: CancelFlag,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("main", &self.main.path)
            .field("products", &self.current.load().len())
            .finish()
    }
}

impl Registry {
    /// Load everything named by the main configuration file.
    ///
    /// Any failure of the main file or the default product is fatal here.
    pub fn init(main_path: &Path, gis: Arc<dyn GisEngine>) -> Result<Self, RegistryError> {
        Self::init_with(main_path, gis, Arc::new(SystemClock), CancelFlag::new())
    }

    pub fn init_with(
        main_path: &Path,
        gis: Arc<dyn GisEngine>,
        clock: Arc<dyn Clock>,
        cancel: CancelFlag,
    ) -> Result<Self, RegistryError> {
        let started = Instant::now();
        let main = MainConfig::read(main_path)?;

        let builder = Builder {
            gis: gis.as_ref(),
            clock: clock.as_ref(),
            cancel: &cancel,
        };
        let snapshot = match builder.build(&main, None, None) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::record_reload(outcome_label(&e), started);
                return Err(e);
            }
        };

        validate_dictionaries(snapshot.products.iter().map(|(name, p)| (name, p.as_ref())))
            .map_err(RegistryError::Validation)?;

        metrics::record_reload("published", started);
        metrics::record_product_count(snapshot.len());
        info!(
            path = %main.path.display(),
            products = snapshot.len(),
            geometries = snapshot.geometries.len(),
            "Textgen configuration loaded"
        );

        Ok(Self {
            main,
            current: ArcSwap::from_pointee(snapshot),
            rebuild: Mutex::new(()),
            gis,
            clock,
            cancel,
        })
    }

    /// Consistent view of the current generation.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Rebuild after the files in `changes` changed.
    ///
    /// Returns [`RegistryError::Cancelled`] if cancellation was requested
    /// before the rebuild finished; the previous snapshot then stays.
    pub fn reload(&self, changes: &ChangeSet) -> Result<ReloadOutcome, RegistryError> {
        let _guard = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        self.cancel.checkpoint()?;

        let previous = self.current.load_full();

        let main = match MainConfig::read(&self.main.path) {
            Ok(main) => main,
            Err(e) => return Ok(self.go_inactive(&previous, e.summary(), started)),
        };

        let builder = Builder {
            gis: self.gis.as_ref(),
            clock: self.clock.as_ref(),
            cancel: &self.cancel,
        };
        match builder.build(&main, Some(changes), Some(&previous)) {
            Ok(snapshot) => {
                self.cancel.checkpoint()?;
                let products = snapshot.len();
                self.current.store(Arc::new(snapshot));

                metrics::record_reload("published", started);
                metrics::record_product_count(products);
                info!(products, "Textgen configuration reloaded");
                Ok(ReloadOutcome::Published { products })
            }
            Err(RegistryError::Cancelled) => {
                metrics::record_reload("cancelled", started);
                info!("Configuration rebuild cancelled, keeping previous snapshot");
                Err(RegistryError::Cancelled)
            }
            Err(RegistryError::Config(e)) => Ok(self.go_inactive(&previous, e.summary(), started)),
            Err(e) => Ok(self.go_inactive(&previous, e.to_string(), started)),
        }
    }

    fn go_inactive(&self, previous: &Snapshot, reason: String, started: Instant) -> ReloadOutcome {
        error!("{reason} Textgen plugin is now inactive!");
        self.current.store(Arc::new(Snapshot::inactive(
            previous.default_url.clone(),
            previous.forecast_text_cache_size,
        )));
        metrics::record_reload("inactive", started);
        metrics::record_product_count(0);
        ReloadOutcome::Inactive { reason }
    }

    /// Flag that aborts an in-flight rebuild at its next checkpoint.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn main_config_path(&self) -> &Path {
        &self.main.path
    }

    pub fn watch_settings(&self) -> &WatchSettings {
        &self.main.watch
    }

    /// Directories holding the product files named at start-up.
    pub fn directories_to_monitor(&self) -> BTreeSet<PathBuf> {
        self.main.directories_to_monitor()
    }

    // Read-through accessors. Each call reads the current snapshot on its own;
    // use [`Registry::snapshot`] when several reads must agree.

    pub fn product_config(&self, name: &str) -> Result<Arc<ProductConfig>, RegistryError> {
        self.snapshot().product_config(name).cloned()
    }

    pub fn product_config_exists(&self, name: &str) -> bool {
        self.current.load().product_config_exists(name)
    }

    pub fn product_masks(&self, name: &str) -> Result<WeatherAreas, RegistryError> {
        self.snapshot().product_masks(name).cloned()
    }

    pub fn geo_object_exists(&self, name: &str, areasource: &str) -> bool {
        self.current.load().geo_object_exists(name, areasource)
    }

    pub fn make_postgis_area(&self, name: &str, areasource: &str) -> Result<WeatherArea, RegistryError> {
        self.snapshot().make_postgis_area(name, areasource)
    }

    pub fn default_url(&self) -> String {
        self.current.load().default_url().to_string()
    }

    pub fn forecast_text_cache_size(&self) -> usize {
        self.current.load().forecast_text_cache_size()
    }

    /// Whether `product` changed within the last `interval` seconds, by the registry's clock.
    pub fn is_modified(&self, product: &str, interval: u64) -> Result<bool, RegistryError> {
        let now = self.clock.now();
        Ok(self.snapshot().product_config(product)?.is_modified_at(interval, now))
    }

    pub fn is_frost_season(&self, product: &str) -> Result<bool, RegistryError> {
        self.snapshot().is_frost_season(product)
    }

    pub fn area_time_zone(&self, product: &str, area: &str) -> Result<String, RegistryError> {
        self.snapshot().area_time_zone(product, area).map(str::to_string)
    }

    pub fn default_geometry_identifier(&self, product: &str) -> Result<GeometryIdentifier, RegistryError> {
        self.snapshot().default_geometry_identifier(product).cloned()
    }
}

fn outcome_label(e: &RegistryError) -> &'static str {
    match e {
        RegistryError::Cancelled => "cancelled",
        _ => "failed",
    }
}
