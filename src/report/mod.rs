//! Reporting utilities: residual rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::ResidualRecord;

/// Counties furthest above and below the temperature-only prediction (top-N each side).
#[derive(Debug, Clone)]
pub struct ResidualRankings {
    /// Largest positive residuals first.
    pub highest: Vec<ResidualRecord>,
    /// Most negative residuals first.
    pub lowest: Vec<ResidualRecord>,
}

/// Rank counties by residual.
pub fn rank_residuals(rows: &[ResidualRecord], top_n: usize) -> ResidualRankings {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.residual.total_cmp(&a.residual));
    let highest = sorted.iter().take(top_n).cloned().collect();

    sorted.reverse();
    let lowest = sorted.iter().take(top_n).cloned().collect();

    ResidualRankings { highest, lowest }
}
