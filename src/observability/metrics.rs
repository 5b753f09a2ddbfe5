//! Registry metrics.
//!
//! # Metrics
//! - `textgen_config_reloads_total` (counter): rebuilds by outcome
//! - `textgen_config_reload_duration_seconds` (histogram): rebuild latency
//! - `textgen_config_products` (gauge): products in the published snapshot
//! - `textgen_config_product_errors_total` (counter): product files rejected

use std::time::Instant;

use metrics::{counter, gauge, histogram};

pub fn record_reload(outcome: &'static str, started: Instant) {
    counter!("textgen_config_reloads_total", "outcome" => outcome).increment(1);
    histogram!("textgen_config_reload_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_product_count(count: usize) {
    gauge!("textgen_config_products").set(count as f64);
}

pub fn record_product_error() {
    counter!("textgen_config_product_errors_total").increment(1);
}
