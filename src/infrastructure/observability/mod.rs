//! Push-based observability for tickforge
//!
//! Observability is **outbound only**: no HTTP server, no incoming requests.
//!
//! 1. **Prometheus registry**: counters and histograms updated by the engine,
//!    rendered in text format on demand
//! 2. **Structured JSON logs**: periodic `STATUS_JSON:` lines on stdout

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::StatusReporter;
