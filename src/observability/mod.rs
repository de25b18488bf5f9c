//! Observability for the data-source layer
//!
//! - Structured logging (JSON, one line per event)
//! - Monotonic query counters
//!
//! Observability is read-only: it never changes what a query returns.
//!
//! ```ignore
//! use academy_datasource::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Trace);
//! Logger::info("SEED_LOADED", &[("tables", "3")]);
//! ```

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, QueryMetrics};
