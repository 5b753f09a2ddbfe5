//! Observability.
//!
//! # Data Flow
//! ```text
//! registry rebuilds, watcher
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - No exporter is installed here; without a recorder metric updates are no-ops

pub mod logging;
pub mod metrics;
