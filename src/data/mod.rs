//! Reference data and data preparation helpers.

pub mod fips;
pub mod split;
pub mod synthetic;

pub use fips::*;
pub use split::*;
pub use synthetic::*;
