//! Synthetic county table generation.
//!
//! Produces a table shaped like the merged public datasets so the analysis can be
//! exercised end to end without downloading anything. The outcome is built from
//! a known threshold response plus a known energy-burden effect and Gaussian
//! noise:
//!
//! ```text
//! ed = base + slope · max(0, temp - threshold) + burden_effect · burden + ε
//! ```

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::fips::county_names;
use crate::domain::{CountyRecord, DEFAULT_THRESHOLD_F, Indicator};
use crate::error::AppError;

/// Knobs for the synthetic generator.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub seed: u64,
    /// ED visits / 100000 at or below the threshold (before the burden effect).
    pub base: f64,
    /// Visits per °F above the threshold.
    pub slope: f64,
    /// Visits per percentage point of energy burden.
    pub burden_effect: f64,
    pub noise_sd: f64,
    /// Probability that a county has no ED figure.
    pub missing_prob: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 216,
            base: 40.0,
            slope: 1.8,
            burden_effect: 4.0,
            noise_sd: 3.0,
            missing_prob: 0.05,
        }
    }
}

/// Generate one record per California county.
pub fn generate_counties(config: &SynthConfig) -> Result<Vec<CountyRecord>, AppError> {
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(AppError::new(2, "Noise standard deviation must be finite and >= 0."));
    }
    if !(0.0..1.0).contains(&config.missing_prob) {
        return Err(AppError::new(2, "Missing probability must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let month_gap = Normal::new(0.0, 2.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut out = Vec::new();
    for county in county_names() {
        let july: f64 = rng.gen_range(68.0..108.0);
        let august: f64 = july + month_gap.sample(&mut rng);
        let hottest = july.max(august);

        let mut record = CountyRecord::new(county);
        record.july_max_temp = Some(round2(july));
        record.august_max_temp = Some(round2(august));
        record.july_cdd = Some(round2(cooling_degree_days(july)));
        record.august_cdd = Some(round2(cooling_degree_days(august)));

        let mut burden = 0.0;
        for ind in Indicator::ALL {
            let value: f64 = match ind {
                Indicator::HospitalBeds => rng.gen_range(0.5..4.0),
                Indicator::EnergyBurden => rng.gen_range(1.0..6.0),
                _ => rng.gen_range(2.0..80.0),
            };
            if ind == Indicator::EnergyBurden {
                burden = value;
            }
            let raw = match ind {
                Indicator::HospitalBeds => format!("{value:.2}"),
                _ => format!("{value:.1}%"),
            };
            record.indicators.insert(ind, raw);
        }

        let excess = (hottest - DEFAULT_THRESHOLD_F).max(0.0);
        let ed = config.base + config.slope * excess + config.burden_effect * burden + noise.sample(&mut rng);
        if !rng.gen_bool(config.missing_prob) {
            record.ed_visits = Some(round2(ed.max(0.0)));
            record.hospitalizations = Some(round2((ed * 0.1).max(0.0)));
        }

        out.push(record);
    }

    Ok(out)
}

/// Rough monthly CDD (base 65 °F) from a monthly mean max temperature.
fn cooling_degree_days(max_temp: f64) -> f64 {
    (max_temp - 65.0).max(0.0) * 31.0 * 0.6
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
