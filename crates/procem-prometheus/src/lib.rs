//! Prometheus metrics backend for the platform launcher.
//!
//! [`PrometheusMetrics`] implements [`procem_core::MetricsBackend`] over a private
//! [`Registry`], so several instances never collide on metric names.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use procem_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: procem_core::MetricsHandle = Arc::new(metrics.clone());
//! # let _ = handle;
//!
//! // ... launch runs with `handle` ...
//! let text = metrics.encode_text()?;
//! assert!(text.contains("procem_slots_in_use"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `procem_launches_total{outcome}` - Counter
//! - `procem_launch_duration_seconds{outcome}` - Histogram
//! - `procem_units_started_total{role}` - Counter
//! - `procem_slots_in_use` - Gauge
//!
//! The platform manager is a one-shot process, so there is no `/metrics`
//! endpoint; the binary dumps [`PrometheusMetrics::write_to`] at shutdown.

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
