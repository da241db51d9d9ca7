//! Mathematical utilities: least squares (linear and bounded nonlinear) and statistics.

pub mod lsq;
pub mod ols;
pub mod stats;

pub use lsq::*;
pub use ols::*;
pub use stats::*;
