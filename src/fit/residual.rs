//! Remove the temperature signal from the outcome.
//!
//! The heat-response fits describe how ED visits grow with summer max
//! temperature above the threshold. Subtracting the fitted line from each
//! county's observed visits leaves a residual that the socioeconomic indicators
//! can be correlated against.

use tracing::{debug, info};

use crate::domain::{CountyRecord, Indicator, PivotConfig, ResidualRecord, TempSource};
use crate::error::FitError;
use crate::fit::pivot::{PivotFit, PivotOptions, fit_threshold_pivoted};
use crate::math::{nan_min, pearson};

/// A pivoted fit for one temperature series.
#[derive(Debug, Clone)]
pub struct TempFit {
    pub source: TempSource,
    pub fit: PivotFit,
}

/// Residualized rows plus the counties that could not be used.
#[derive(Debug, Clone, Default)]
pub struct Residualized {
    pub rows: Vec<ResidualRecord>,
    /// `(county, reason)` for complete rows rejected during parsing.
    pub skipped: Vec<(String, String)>,
    /// Rows dropped because some column was missing.
    pub incomplete: usize,
    /// Rows dropped because the temperature was below the threshold.
    pub below_threshold: usize,
    /// Rows dropped by the exclusion list.
    pub excluded: usize,
}

/// `(temperature, outcome)` arrays for the records that have an outcome.
pub fn observations(records: &[CountyRecord], source: TempSource) -> (Vec<f64>, Vec<f64>) {
    records
        .iter()
        .filter_map(|r| r.ed_visits.map(|y| (source.value(r), y)))
        .unzip()
}

/// Fit every temperature series against ED visits.
///
/// The pivot value defaults to the lowest observed ED rate among counties that
/// report one, shared by all three fits.
pub fn fit_temperature_sources(records: &[CountyRecord], config: &PivotConfig) -> Result<Vec<TempFit>, FitError> {
    let mut out = Vec::with_capacity(TempSource::ALL.len());
    for source in TempSource::ALL {
        let (x, y) = observations(records, source);
        let opts = PivotOptions {
            lower: config.slope_lower,
            upper: config.slope_upper,
            x_threshold: config.threshold,
            y_at_threshold: Some(config.y_at_threshold.unwrap_or_else(|| nan_min(&y))),
            max_nfev: config.max_nfev,
        };
        let fit = fit_threshold_pivoted(&x, &y, &opts)?;
        info!(
            source = source.display_name(),
            slope = fit.slope,
            intercept = fit.intercept,
            rmse = fit.rmse,
            r2 = fit.r2,
            "temperature fit"
        );
        out.push(TempFit { source, fit });
    }
    Ok(out)
}

/// Parse an indicator value such as `"34.2%"` or `"12.5"`.
pub fn parse_percent(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Residualize complete records against a live fit.
///
/// Keeps records that have every column except hospitalizations, whose
/// temperature (per `source`) is at or above the fit's threshold, and whose
/// county is not in `exclude` (case-insensitive).
pub fn residualize(records: &[CountyRecord], fit: &PivotFit, source: TempSource, exclude: &[String]) -> Residualized {
    let mut out = Residualized::default();

    for record in records {
        if !record.is_complete() {
            out.incomplete += 1;
            continue;
        }
        if exclude.iter().any(|c| c.eq_ignore_ascii_case(record.county.trim())) {
            out.excluded += 1;
            continue;
        }

        let features = match parse_features(record) {
            Ok(f) => f,
            Err(reason) => {
                debug!(county = %record.county, %reason, "skipping county");
                out.skipped.push((record.county.clone(), reason));
                continue;
            }
        };

        let temp = source.value(record);
        if !(temp >= fit.x_threshold) {
            out.below_threshold += 1;
            continue;
        }

        // `is_complete` guarantees the outcome is present.
        let observed = record.ed_visits.unwrap_or(f64::NAN);
        let predicted = fit.predict(temp);
        out.rows.push(ResidualRecord {
            county: record.county.clone(),
            temp,
            observed,
            predicted,
            residual: observed - predicted,
            features,
        });
    }

    info!(
        kept = out.rows.len(),
        incomplete = out.incomplete,
        below_threshold = out.below_threshold,
        excluded = out.excluded,
        skipped = out.skipped.len(),
        "residualized counties"
    );
    out
}

fn parse_features(record: &CountyRecord) -> Result<std::collections::BTreeMap<Indicator, f64>, String> {
    let mut features = std::collections::BTreeMap::new();
    for ind in Indicator::ALL {
        let raw = record.indicators.get(&ind).map(String::as_str).unwrap_or("");
        let value = parse_percent(raw).ok_or_else(|| format!("invalid `{}` value: {raw:?}", ind.column_name()))?;
        features.insert(ind, value);
    }
    Ok(features)
}

/// Pearson correlation of each indicator with the residual.
pub fn correlations(rows: &[ResidualRecord], indicators: &[Indicator]) -> Vec<(Indicator, f64)> {
    let residuals: Vec<f64> = rows.iter().map(|r| r.residual).collect();
    indicators
        .iter()
        .map(|&ind| {
            let values: Vec<f64> = rows.iter().map(|r| r.feature(ind)).collect();
            (ind, pearson(&values, &residuals))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(county: &str, ed: f64, july: f64, august: f64, burden: &str) -> CountyRecord {
        let mut rec = CountyRecord::new(county);
        rec.ed_visits = Some(ed);
        for ind in Indicator::ALL {
            rec.indicators.insert(ind, "10%".to_string());
        }
        rec.indicators.insert(Indicator::EnergyBurden, burden.to_string());
        rec.indicators.insert(Indicator::HospitalBeds, "2.1".to_string());
        rec.july_max_temp = Some(july);
        rec.august_max_temp = Some(august);
        rec.july_cdd = Some(300.0);
        rec.august_cdd = Some(310.0);
        rec
    }

    fn line_fit(slope: f64, intercept: f64) -> PivotFit {
        PivotFit {
            slope,
            intercept,
            x_threshold: 80.0,
            y_at_threshold: slope * 80.0 + intercept,
            success: true,
            message: String::new(),
            nfev: 0,
            rss: 0.0,
            rmse: 0.0,
            r2: 1.0,
            mask: Vec::new(),
            x_selected: Vec::new(),
            y_selected: Vec::new(),
            y_pred_selected: Vec::new(),
        }
    }

    #[test]
    fn parse_percent_variants() {
        assert_eq!(parse_percent("34.2%"), Some(34.2));
        assert_eq!(parse_percent(" 7 % "), Some(7.0));
        assert_eq!(parse_percent("2.5"), Some(2.5));
        assert_eq!(parse_percent("%"), None);
        assert_eq!(parse_percent("n/a"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn residual_is_observed_minus_line() {
        let records = vec![
            complete("Fresno", 150.0, 98.0, 100.0, "4.0%"),
            complete("Marin", 90.0, 70.0, 75.0, "2.0%"),
        ];
        let fit = line_fit(2.0, -100.0);
        let out = residualize(&records, &fit, TempSource::Max, &[]);

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.below_threshold, 1);
        let row = &out.rows[0];
        assert_eq!(row.temp, 100.0);
        assert_eq!(row.predicted, 100.0);
        assert_eq!(row.residual, 50.0);
        assert_eq!(row.feature(Indicator::EnergyBurden), 4.0);
        assert_eq!(row.feature(Indicator::HospitalBeds), 2.1);
    }

    #[test]
    fn incomplete_excluded_and_unparsable_rows_are_counted() {
        let mut missing = complete("Alpine", 80.0, 85.0, 85.0, "1%");
        missing.july_cdd = None;
        let records = vec![
            missing,
            complete("Imperial", 400.0, 110.0, 112.0, "6%"),
            complete("Kern", 200.0, 101.0, 102.0, "bad"),
            complete("Tulare", 180.0, 100.0, 99.0, "5%"),
        ];
        let out = residualize(&records, &line_fit(1.0, 0.0), TempSource::Max, &["imperial".to_string()]);

        assert_eq!(out.incomplete, 1);
        assert_eq!(out.excluded, 1);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].0, "Kern");
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].county, "Tulare");
    }

    #[test]
    fn sources_share_the_outcome_minimum_as_pivot() {
        let records = vec![
            complete("A", 20.0, 75.0, 78.0, "1%"),
            complete("B", 38.0, 90.0, 88.0, "2%"),
            complete("C", 56.0, 100.0, 96.0, "3%"),
            CountyRecord::new("NoOutcome"),
        ];
        let fits = fit_temperature_sources(&records, &PivotConfig::default()).unwrap();
        assert_eq!(fits.len(), 3);
        for tf in &fits {
            assert_eq!(tf.fit.y_at_threshold, 20.0);
            assert_eq!(tf.fit.mask.len(), 3);
        }
        // July: exact line through (80, 20) with slope 1.8.
        assert!((fits[0].fit.slope - 1.8).abs() < 1e-6);
    }

    #[test]
    fn correlations_follow_residual_ordering() {
        let fit = line_fit(0.0, 0.0);
        let records = vec![
            complete("A", 10.0, 90.0, 90.0, "1%"),
            complete("B", 20.0, 90.0, 90.0, "2%"),
            complete("C", 30.0, 90.0, 90.0, "3%"),
        ];
        let out = residualize(&records, &fit, TempSource::July, &[]);
        let corr = correlations(&out.rows, &[Indicator::EnergyBurden, Indicator::ParkAccess]);
        assert!((corr[0].1 - 1.0).abs() < 1e-12);
        assert!(corr[1].1.is_nan());
    }
}
