//! Input/output helpers.
//!
//! - public source readers and joins (`noaa`, `sources`, `cvi`)
//! - merged-table and feature-table ingest + validation (`ingest`)
//! - CSV exports (`export`)
//! - fit JSON read/write (`fit_file`)

pub mod cvi;
pub mod export;
pub mod fit_file;
pub mod ingest;
pub mod noaa;
pub mod sources;

pub use cvi::*;
pub use export::*;
pub use fit_file::*;
pub use ingest::*;
pub use noaa::*;
pub use sources::*;
