//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl-C / caller
//!     → Shutdown::trigger
//!         → broadcast to the reload loop (stops waiting for changes)
//!         → CancelFlag set (an in-flight rebuild stops at its next checkpoint)
//! ```
//!
//! # Design Decisions
//! - A cancelled rebuild publishes nothing; readers keep the previous snapshot

pub mod shutdown;

pub use shutdown::{CancelFlag, Cancelled, Shutdown};
