//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of one threshold-pivoted fit:
//! - pivot, slope bounds and the fitted line
//! - convergence status and fit quality
//! - the points that took part in the fit
//! - a precomputed line grid for quick plotting
//!
//! Non-finite numbers (a NaN slope from malformed bounds, an undefined R², an
//! infinite slope bound) are written as `null`.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TempSource;
use crate::error::AppError;
use crate::fit::PivotFit;

const GRID_POINTS: usize = 101;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub source: TempSource,
    pub x_threshold: Option<f64>,
    pub y_at_threshold: Option<f64>,
    /// `null` marks an open side.
    pub slope_bounds: [Option<f64>; 2],
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub success: bool,
    pub message: String,
    pub nfev: usize,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub points: FitPoints,
    pub grid: FitGrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitGrid {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl FitFile {
    pub fn from_fit(source: TempSource, fit: &PivotFit, slope_bounds: [f64; 2]) -> Self {
        let x_max = fit.x_selected.iter().copied().fold(fit.x_threshold, f64::max);
        let grid = build_grid(fit, fit.x_threshold, x_max, GRID_POINTS);
        FitFile {
            tool: "heatrisk".to_string(),
            generated: Utc::now(),
            source,
            x_threshold: finite(fit.x_threshold),
            y_at_threshold: finite(fit.y_at_threshold),
            slope_bounds: slope_bounds.map(finite),
            slope: finite(fit.slope),
            intercept: finite(fit.intercept),
            success: fit.success,
            message: fit.message.clone(),
            nfev: fit.nfev,
            rmse: finite(fit.rmse),
            r2: finite(fit.r2),
            points: FitPoints {
                x: fit.x_selected.clone(),
                y: fit.y_selected.clone(),
            },
            grid,
        }
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file).map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    if fit.points.x.len() != fit.points.y.len() || fit.grid.x.len() != fit.grid.y.len() {
        return Err(AppError::new(2, "Invalid fit JSON: x/y arrays differ in length."));
    }
    Ok(fit)
}

fn build_grid(fit: &PivotFit, x_min: f64, x_max: f64, n: usize) -> FitGrid {
    if !fit.slope.is_finite() {
        return FitGrid { x: Vec::new(), y: Vec::new() };
    }

    let n = n.max(2);
    let mut x0 = x_min;
    let mut x1 = x_max;
    if (x1 - x0).abs() < 1e-9 {
        x0 -= 0.5;
        x1 += 0.5;
    }

    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let t = x0 + u * (x1 - x0);
        x.push(t);
        y.push(fit.predict(t));
    }
    FitGrid { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{PivotOptions, fit_threshold_pivoted};

    #[test]
    fn fit_json_round_trips() {
        let opts = PivotOptions {
            y_at_threshold: Some(10.0),
            ..PivotOptions::default()
        };
        let fit = fit_threshold_pivoted(&[80.0, 85.0, 90.0], &[10.0, 19.0, 28.0], &opts).unwrap();
        let file = FitFile::from_fit(TempSource::Max, &fit, [0.0, 1e6]);
        assert_eq!(file.grid.x.len(), GRID_POINTS);
        assert_eq!(file.grid.x[0], 80.0);
        assert_eq!(*file.grid.x.last().unwrap(), 90.0);
        assert!((file.grid.y[0] - 10.0).abs() < 1e-6);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_fit_json(&path, &file).unwrap();
        let back = read_fit_json(&path).unwrap();
        assert_eq!(back.source, TempSource::Max);
        assert_eq!(back.generated, file.generated);
        assert_eq!(back.points.x, vec![80.0, 85.0, 90.0]);
        assert_eq!(back.grid.x.len(), GRID_POINTS);
        assert!((back.slope.unwrap() - 1.8).abs() < 1e-6);
        assert!(back.success);
    }

    #[test]
    fn non_finite_values_become_null() {
        let opts = PivotOptions {
            lower: 5.0,
            upper: 1.0,
            y_at_threshold: Some(10.0),
            ..PivotOptions::default()
        };
        let fit = fit_threshold_pivoted(&[80.0, 85.0], &[10.0, 19.0], &opts).unwrap();
        let file = FitFile::from_fit(TempSource::July, &fit, [5.0, 1.0]);
        assert_eq!(file.slope, None);
        assert!(file.grid.x.is_empty());

        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("\"slope\":null"));
    }

    #[test]
    fn open_slope_bound_survives_a_round_trip() {
        let opts = PivotOptions {
            upper: f64::INFINITY,
            y_at_threshold: Some(10.0),
            ..PivotOptions::default()
        };
        let fit = fit_threshold_pivoted(&[80.0, 85.0, 90.0], &[10.0, 19.0, 28.0], &opts).unwrap();
        let file = FitFile::from_fit(TempSource::Max, &fit, [0.0, f64::INFINITY]);
        assert_eq!(file.slope_bounds, [Some(0.0), None]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.json");
        write_fit_json(&path, &file).unwrap();
        let back = read_fit_json(&path).unwrap();
        assert_eq!(back.slope_bounds, [Some(0.0), None]);
        assert_eq!(back.x_threshold, Some(80.0));
        assert_eq!(back.y_at_threshold, Some(10.0));
        assert!((back.slope.unwrap() - 1.8).abs() < 1e-6);
    }
}
