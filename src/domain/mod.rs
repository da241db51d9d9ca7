//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - dataset column names and the `Indicator` / `TempSource` enums
//! - per-county records before and after residualization
//! - resolved run configurations (`AnalysisConfig`, `RegressConfig`, `BuildConfig`)

pub mod types;

pub use types::*;
