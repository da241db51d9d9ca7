//! Shared domain types.
//!
//! Column names are kept identical to the public datasets and to the CSVs the
//! pipeline writes, so downstream spreadsheets line up without renaming.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const COUNTY_COL: &str = "County";
pub const ED_VISITS_COL: &str = "Emergency Visits / 100000";
pub const HOSPITALIZATIONS_COL: &str = "Hospitalizations / 100000";
pub const JULY_MAX_TEMP_COL: &str = "July max temp (F)";
pub const AUGUST_MAX_TEMP_COL: &str = "August max temp (F)";
pub const JULY_CDD_COL: &str = "July CDD";
pub const AUGUST_CDD_COL: &str = "August CDD";
pub const MAX_TEMP_COL: &str = "max_july_august_temp";
pub const RESIDUAL_COL: &str = "Emergency Visits / 100000 temp residual";

/// Temperature below which no excess heat risk is assumed (°F).
pub const DEFAULT_THRESHOLD_F: f64 = 80.0;

/// Socioeconomic / built-environment indicators joined per county.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Indicator {
    EnergyBurden,
    Imperviousness,
    ParkAccess,
    HospitalBeds,
    HousingPre1980,
    HousingInsecurity,
    LackOfTransportation,
    NoInternet,
    UtilityThreat,
}

impl Indicator {
    /// All indicators, in merged-table column order.
    pub const ALL: [Indicator; 9] = [
        Indicator::EnergyBurden,
        Indicator::Imperviousness,
        Indicator::ParkAccess,
        Indicator::HospitalBeds,
        Indicator::HousingPre1980,
        Indicator::HousingInsecurity,
        Indicator::LackOfTransportation,
        Indicator::NoInternet,
        Indicator::UtilityThreat,
    ];

    /// Features carried into the train/validation exports by default.
    pub const DEFAULT_FEATURES: [Indicator; 4] = [
        Indicator::EnergyBurden,
        Indicator::ParkAccess,
        Indicator::Imperviousness,
        Indicator::NoInternet,
    ];

    /// Column header in the merged county table.
    pub fn column_name(self) -> &'static str {
        match self {
            Indicator::EnergyBurden => "Energy Burden % of Income",
            Indicator::Imperviousness => "Imperviousness",
            Indicator::ParkAccess => "Park within 1/2 Mile",
            Indicator::HospitalBeds => "Hospital Beds / 10000",
            Indicator::HousingPre1980 => "Housing Built before 1980",
            Indicator::HousingInsecurity => "Housing Insecurity",
            Indicator::LackOfTransportation => "Lack of Reliable Transportation",
            Indicator::NoInternet => "% w/o Internet",
            Indicator::UtilityThreat => "Utility Services Threat",
        }
    }

    /// File name of the public dataset this indicator comes from.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Indicator::EnergyBurden => "Avg_annual_energy_burden_percent_of_income_2018.csv",
            Indicator::Imperviousness => "Avg_percent_of_imperviousness_2021.csv",
            Indicator::ParkAccess => "Distance_to_parks_half-mile_2010_2015_2020.csv",
            Indicator::HospitalBeds => "Hospital_beds_per_10000_population_2020.csv",
            Indicator::HousingPre1980 => "Housing_built_before_1980.csv",
            Indicator::HousingInsecurity => "Housing_insecurity_2022.csv",
            Indicator::LackOfTransportation => "Lack_of_reliable_transportation_2022.csv",
            Indicator::NoInternet => "Percent_without_internet_2018-2022.csv",
            Indicator::UtilityThreat => "Utility_services_threat_2022.csv",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Indicator> {
        Indicator::ALL.into_iter().find(|ind| ind.column_name() == name)
    }
}

/// Which temperature series drives the heat-response fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TempSource {
    July,
    August,
    /// Elementwise max of July and August; a missing month yields the other.
    Max,
}

impl TempSource {
    pub const ALL: [TempSource; 3] = [TempSource::July, TempSource::August, TempSource::Max];

    pub fn display_name(self) -> &'static str {
        match self {
            TempSource::July => "July",
            TempSource::August => "August",
            TempSource::Max => "max temp",
        }
    }

    /// Temperature for a record, NaN when missing.
    pub fn value(self, record: &CountyRecord) -> f64 {
        let july = record.july_max_temp.unwrap_or(f64::NAN);
        let august = record.august_max_temp.unwrap_or(f64::NAN);
        match self {
            TempSource::July => july,
            TempSource::August => august,
            // `f64::max` returns the non-NaN operand when exactly one is NaN.
            TempSource::Max => july.max(august),
        }
    }
}

/// One county row of the merged statistics table.
///
/// Indicator values are kept as the raw strings found in the sources
/// (e.g. `"34.2%"`); they are parsed during residualization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountyRecord {
    pub county: String,
    pub ed_visits: Option<f64>,
    pub hospitalizations: Option<f64>,
    pub indicators: BTreeMap<Indicator, String>,
    pub july_max_temp: Option<f64>,
    pub august_max_temp: Option<f64>,
    pub july_cdd: Option<f64>,
    pub august_cdd: Option<f64>,
}

impl CountyRecord {
    pub fn new(county: impl Into<String>) -> Self {
        Self {
            county: county.into(),
            ..Self::default()
        }
    }

    /// True when every column except hospitalizations has a value.
    pub fn is_complete(&self) -> bool {
        self.ed_visits.is_some()
            && Indicator::ALL
                .iter()
                .all(|ind| self.indicators.get(ind).is_some_and(|v| !v.trim().is_empty()))
            && self.july_max_temp.is_some()
            && self.august_max_temp.is_some()
            && self.july_cdd.is_some()
            && self.august_cdd.is_some()
    }
}

/// A county after the temperature signal has been removed from its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRecord {
    pub county: String,
    pub temp: f64,
    pub observed: f64,
    pub predicted: f64,
    pub residual: f64,
    pub features: BTreeMap<Indicator, f64>,
}

impl ResidualRecord {
    pub fn feature(&self, indicator: Indicator) -> f64 {
        self.features.get(&indicator).copied().unwrap_or(f64::NAN)
    }
}

/// Settings for the threshold-pivoted temperature fits.
#[derive(Debug, Clone)]
pub struct PivotConfig {
    pub threshold: f64,
    pub slope_lower: f64,
    pub slope_upper: f64,
    /// Explicit outcome at the threshold; `None` means the observed minimum.
    pub y_at_threshold: Option<f64>,
    pub max_nfev: usize,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD_F,
            slope_lower: 0.0,
            slope_upper: 1e6,
            y_at_threshold: None,
            max_nfev: 20_000,
        }
    }
}

/// Resolved configuration for `heatrisk analyze` / `heatrisk run`.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub stats_path: PathBuf,
    pub pivot: PivotConfig,
    /// Series used to residualize the outcome.
    pub residual_source: TempSource,
    pub features: Vec<Indicator>,
    pub exclude_counties: Vec<String>,
    pub test_size: f64,
    pub split_seed: u64,
    pub train_out: PathBuf,
    pub validate_out: PathBuf,
    pub export_fit: Option<PathBuf>,
    /// Counties shown on each side of the residual ranking.
    pub top_n: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

/// Resolved configuration for cross-validated regression.
#[derive(Debug, Clone)]
pub struct RegressConfig {
    pub train_path: PathBuf,
    pub features: Vec<Indicator>,
    pub folds: usize,
    pub fold_seed: u64,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

/// Resolved configuration for `heatrisk build`.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub manifest: Option<PathBuf>,
    pub year: u16,
    pub stats_name: String,
    pub cvi: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_source_prefers_present_month() {
        let mut rec = CountyRecord::new("Kern");
        rec.july_max_temp = Some(95.0);
        assert_eq!(TempSource::Max.value(&rec), 95.0);
        assert!(TempSource::August.value(&rec).is_nan());

        rec.august_max_temp = Some(97.5);
        assert_eq!(TempSource::Max.value(&rec), 97.5);

        let empty = CountyRecord::new("Alpine");
        assert!(TempSource::Max.value(&empty).is_nan());
    }

    #[test]
    fn indicator_column_names_round_trip() {
        for ind in Indicator::ALL {
            assert_eq!(Indicator::from_column_name(ind.column_name()), Some(ind));
        }
        assert_eq!(Indicator::from_column_name("County"), None);
    }

    #[test]
    fn completeness_ignores_hospitalizations() {
        let mut rec = CountyRecord::new("Fresno");
        rec.ed_visits = Some(120.0);
        for ind in Indicator::ALL {
            rec.indicators.insert(ind, "1.0%".to_string());
        }
        rec.july_max_temp = Some(99.0);
        rec.august_max_temp = Some(98.0);
        rec.july_cdd = Some(400.0);
        assert!(!rec.is_complete());
        rec.august_cdd = Some(380.0);
        assert!(rec.is_complete());
    }
}
