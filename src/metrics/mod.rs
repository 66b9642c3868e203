//! Metrics export.
//!
//! # Submodules
//!
//! - `prom` - Prometheus push gateway integration

pub mod prom;
