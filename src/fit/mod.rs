//! Heat-response fitting.
//!
//! Responsibilities:
//!
//! - fit a line pinned at the threshold temperature (`pivot`)
//! - run it per temperature series and residualize the outcome (`residual`)

pub mod pivot;
pub mod residual;

pub use pivot::*;
pub use residual::*;
