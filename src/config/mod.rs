//! Configuration files.
//!
//! # Data Flow
//! ```text
//! TOML file
//!     → loader.rs   (Document: parsed file, dotted-path lookups)
//!     → tree.rs     (flatten a section into (key, value) pairs, allow-listed)
//!     → include.rs  (expand `use <section>` directives)
//!     → product::parse / registry::main_config
//!
//! On start-up:
//!     validation.rs checks the loaded products
//!
//! On change:
//!     watcher.rs detects product file changes
//!     → registry rebuilds and swaps in a new snapshot
//! ```
//!
//! # Design Decisions
//! - Values are kept as strings; typing happens where a setting is used
//! - Errors carry operator-facing details separately from their class

pub mod error;
pub mod include;
pub mod loader;
pub mod tree;
pub mod validation;
pub mod watcher;

pub use error::ConfigError;
pub use loader::Document;
pub use tree::{ConfigItem, ConfigItemVector};
pub use watcher::{ChangeSet, DirectoryWatcher};
