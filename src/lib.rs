//! Greenhouse controller library.
//!
//! Valve actuation with mutual exclusion and timed holds, bounded-retry
//! sensor sampling, and an append-only binary telemetry log with rotation,
//! date-range assembly and repair.  Exposed as a library so the binary,
//! the integration tests and the fuzz targets share one implementation.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod sensors;
pub mod telemetry;

pub use error::{Error, Result};
