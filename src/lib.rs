//! Layered, hot-reloadable product configuration for forecast text generation.
//!
//! # Architecture Overview
//!
//! ```text
//!   main.toml ──▶ registry::MainConfig ──▶ product files
//!                                              │
//!                        product::parse  ◀─────┘   (per file, tolerant)
//!                              │
//!                        product::resolve           (inherit from "default")
//!                              │
//!              ┌───────────────┼────────────────┐
//!              ▼               ▼                ▼
//!          products     GeometryStorage      masks        one Snapshot
//!              └───────────────┼────────────────┘
//!                              ▼
//!                    ArcSwap<Snapshot> ◀── config::watcher (hot reload)
//!                              │
//!                    readers: Registry::snapshot()
//!                              │
//!                    settings::TextgenSettings
//! ```

// Core
pub mod config;
pub mod product;
pub mod registry;
pub mod settings;

// Cross-cutting concerns
pub mod clock;
pub mod lifecycle;
pub mod observability;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChangeSet, ConfigError, DirectoryWatcher};
pub use lifecycle::{CancelFlag, Shutdown};
pub use product::{ProductConfig, ProductError};
pub use registry::{Registry, RegistryError, ReloadOutcome, Snapshot};
pub use settings::TextgenSettings;
