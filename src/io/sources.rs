//! Public source files and the joins that turn them into the county table.
//!
//! - health sheets (CSV exports): `Counties`, `Age-adjusted rate per 100,000`
//! - indicator CSVs: `County`, `Value`, `Year` (or `End Year`)
//! - NOAA summer tables from [`crate::io::noaa`]
//!
//! The ED-visits sheet is the base table; hospitalizations and temperatures are
//! left-joined, indicators are inner-joined.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{COUNTY_COL, CountyRecord, Indicator};
use crate::error::AppError;
use crate::io::ingest::{RowError, build_header_map, get_optional, open_csv, parse_opt_f64, read_headers, require_column};
use crate::io::noaa::SummerRow;

pub const HEALTH_COUNTY_COL: &str = "Counties";
pub const HEALTH_RATE_COL: &str = "Age-adjusted rate per 100,000";
pub const STATEWIDE_ROW: &str = "California";

/// File names of every public input, relative to the data directory.
///
/// The defaults are the names the datasets are published under; a JSON manifest
/// only needs the entries it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceManifest {
    pub ed_visits: String,
    pub hospitalizations: String,
    pub max_temp: String,
    pub cdd: String,
    pub indicators: BTreeMap<Indicator, String>,
    pub cvi: String,
    pub food_access: String,
}

impl Default for SourceManifest {
    fn default() -> Self {
        Self {
            ed_visits: "Emergency Department_Visits_Age-adjusted_rate_per_100000_2023_Counties.csv".to_string(),
            hospitalizations: "Hospitalizations_Age-adjusted_rate_per_100000_2023_Counties.csv".to_string(),
            max_temp: "climdiv-tmaxcy-v1.0.0-20250905.txt".to_string(),
            cdd: "climdiv-cddccy-v1.0.0-20250905.txt".to_string(),
            indicators: Indicator::ALL
                .iter()
                .map(|&ind| (ind, ind.default_file_name().to_string()))
                .collect(),
            cvi: "Master CVI Dataset - Oct 2023.csv".to_string(),
            food_access: "Low_income_Low_Food_Access_by_Census_Tracts_2019_2015.csv".to_string(),
        }
    }
}

impl SourceManifest {
    /// Load a manifest, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open source manifest '{}': {e}", path.display())))?;
        let mut manifest: SourceManifest = serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid source manifest '{}': {e}", path.display())))?;

        // A partial `indicators` map replaces the default map wholesale; refill the gaps.
        for ind in Indicator::ALL {
            manifest
                .indicators
                .entry(ind)
                .or_insert_with(|| ind.default_file_name().to_string());
        }
        Ok(manifest)
    }

    pub fn indicator_file(&self, indicator: Indicator) -> &str {
        self.indicators
            .get(&indicator)
            .map(String::as_str)
            .unwrap_or_else(|| indicator.default_file_name())
    }

    pub fn resolve(&self, data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(name)
    }
}

/// One county row of a health sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRow {
    pub county: String,
    pub rate: Option<f64>,
}

/// The most recent year of one indicator CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    pub year: Option<i64>,
    /// `(county, raw value)` in file order.
    pub values: Vec<(String, String)>,
    pub row_errors: Vec<RowError>,
}

/// Read a health sheet export, dropping the statewide aggregate row.
pub fn read_health_sheet(path: &Path) -> Result<Vec<HealthRow>, AppError> {
    let mut reader = open_csv(path, "health sheet")?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);
    let county_idx = require_column(&header_map, HEALTH_COUNTY_COL, path)?;
    let rate_idx = require_column(&header_map, HEALTH_RATE_COL, path)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            AppError::new(2, format!("CSV parse error in '{}' line {}: {e}", path.display(), idx + 2))
        })?;
        let Some(county) = get_optional(&record, Some(county_idx)) else {
            continue;
        };
        if county.eq_ignore_ascii_case(STATEWIDE_ROW) {
            debug!(path = %path.display(), "dropping statewide aggregate row");
            continue;
        }
        rows.push(HealthRow {
            county: county.to_string(),
            rate: parse_opt_f64(get_optional(&record, Some(rate_idx))),
        });
    }

    info!(path = %path.display(), rows = rows.len(), "read health sheet");
    Ok(rows)
}

/// Read an indicator CSV and keep only the rows of its most recent year.
pub fn read_indicator(path: &Path) -> Result<IndicatorTable, AppError> {
    let mut reader = open_csv(path, "indicator CSV")?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);
    let county_idx = require_column(&header_map, COUNTY_COL, path)?;
    let value_idx = require_column(&header_map, "Value", path)?;
    let year_idx = require_column(&header_map, "Year", path)
        .or_else(|_| require_column(&header_map, "End Year", path))
        .map_err(|_| AppError::new(2, format!("Missing `Year`/`End Year` column in '{}'.", path.display())))?;

    let mut rows: Vec<(i64, String, String)> = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    county: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let Some(county) = get_optional(&record, Some(county_idx)) else {
            continue;
        };
        let Some(year) = get_optional(&record, Some(year_idx)).and_then(parse_year) else {
            row_errors.push(RowError {
                line,
                county: Some(county.to_string()),
                message: "Missing/invalid year.".to_string(),
            });
            continue;
        };
        let value = get_optional(&record, Some(value_idx)).unwrap_or("").to_string();
        rows.push((year, county.to_string(), value));
    }

    let year = rows.iter().map(|(y, _, _)| *y).max();
    let values = rows
        .into_iter()
        .filter(|(y, _, _)| Some(*y) == year)
        .map(|(_, county, value)| (county, value))
        .collect::<Vec<_>>();

    if !row_errors.is_empty() {
        warn!(path = %path.display(), errors = row_errors.len(), "indicator rows skipped");
    }
    info!(path = %path.display(), year, rows = values.len(), "read indicator");
    Ok(IndicatorTable {
        year,
        values,
        row_errors,
    })
}

/// Years show up as `2022` or, from spreadsheet round trips, `2022.0`.
fn parse_year(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        let v = raw.parse::<f64>().ok()?;
        (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
    })
}

/// ED visits as the base table, hospitalizations left-joined on county.
pub fn merge_health(ed: &[HealthRow], hospitalizations: &[HealthRow]) -> Vec<CountyRecord> {
    let hosp = first_by_county(hospitalizations.iter().map(|r| (r.county.as_str(), r.rate)));
    ed.iter()
        .map(|row| {
            let mut record = CountyRecord::new(row.county.clone());
            record.ed_visits = row.rate;
            record.hospitalizations = hosp.get(row.county.as_str()).copied().flatten();
            record
        })
        .collect()
}

/// Inner join: counties missing from `table` are dropped.
pub fn merge_indicator(records: Vec<CountyRecord>, indicator: Indicator, table: &IndicatorTable) -> Vec<CountyRecord> {
    let values = first_by_county(table.values.iter().map(|(c, v)| (c.as_str(), v.as_str())));
    let before = records.len();
    let merged: Vec<CountyRecord> = records
        .into_iter()
        .filter_map(|mut record| {
            let value = *values.get(record.county.as_str())?;
            record.indicators.insert(indicator, value.to_string());
            Some(record)
        })
        .collect();

    if merged.len() < before {
        debug!(
            indicator = indicator.column_name(),
            dropped = before - merged.len(),
            "counties without indicator dropped"
        );
    }
    merged
}

/// Left join of July/August max temperature and CDD by county name.
pub fn merge_temperatures(records: &mut [CountyRecord], max_temp: &[SummerRow], cdd: &[SummerRow]) {
    let temp = first_by_county(max_temp.iter().filter_map(|r| Some((r.county.as_deref()?, r))));
    let cdd = first_by_county(cdd.iter().filter_map(|r| Some((r.county.as_deref()?, r))));

    for record in records.iter_mut() {
        if let Some(row) = temp.get(record.county.as_str()) {
            record.july_max_temp = row.july();
            record.august_max_temp = row.august();
        }
        if let Some(row) = cdd.get(record.county.as_str()) {
            record.july_cdd = row.july();
            record.august_cdd = row.august();
        }
    }
}

fn first_by_county<'a, V>(rows: impl Iterator<Item = (&'a str, V)>) -> HashMap<&'a str, V> {
    let mut map = HashMap::new();
    for (county, value) in rows {
        map.entry(county).or_insert(value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn health(county: &str, rate: f64) -> HealthRow {
        HealthRow {
            county: county.to_string(),
            rate: Some(rate),
        }
    }

    #[test]
    fn health_sheet_drops_statewide_row_only() {
        let file = write_temp(
            "Counties,\"Age-adjusted rate per 100,000\",Notes\n\
             California,101.1,\n\
             Alameda,95.2,x\n\
             Alpine,,suppressed\n",
        );
        let rows = read_health_sheet(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], health("Alameda", 95.2));
        assert_eq!(rows[1].rate, None);
    }

    #[test]
    fn indicator_keeps_latest_year_and_accepts_end_year() {
        let file = write_temp(
            "County,End Year,Value\n\
             Fresno,2015,3.0%\n\
             Fresno,2020,4.0%\n\
             Kern,2020.0,5.5%\n\
             Inyo,,1.0%\n",
        );
        let table = read_indicator(file.path()).unwrap();
        assert_eq!(table.year, Some(2020));
        assert_eq!(
            table.values,
            vec![
                ("Fresno".to_string(), "4.0%".to_string()),
                ("Kern".to_string(), "5.5%".to_string())
            ]
        );
        assert_eq!(table.row_errors.len(), 1);
    }

    #[test]
    fn indicator_without_year_column_is_rejected() {
        let file = write_temp("County,Value\nFresno,1\n");
        assert_eq!(read_indicator(file.path()).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn joins_follow_left_and_inner_semantics() {
        let ed = vec![health("Fresno", 150.0), health("Kern", 160.0), health("Marin", 60.0)];
        let hosp = vec![health("Kern", 16.0), health("Kern", 99.0)];
        let records = merge_health(&ed, &hosp);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].hospitalizations, Some(16.0));
        assert_eq!(records[0].hospitalizations, None);

        let table = IndicatorTable {
            year: Some(2022),
            values: vec![
                ("Kern".to_string(), "2.5%".to_string()),
                ("Fresno".to_string(), "3.5%".to_string()),
                ("Fresno".to_string(), "9.9%".to_string()),
            ],
            row_errors: Vec::new(),
        };
        let merged = merge_indicator(records, Indicator::EnergyBurden, &table);
        let names: Vec<&str> = merged.iter().map(|r| r.county.as_str()).collect();
        assert_eq!(names, vec!["Fresno", "Kern"]);
        assert_eq!(merged[0].indicators[&Indicator::EnergyBurden], "3.5%");
    }

    #[test]
    fn temperatures_are_left_joined() {
        let mut months = [None; 12];
        months[6] = Some(101.0);
        months[7] = Some(99.0);
        let temp = vec![SummerRow {
            fips: "029".to_string(),
            county: Some("Kern".to_string()),
            months,
        }];
        let mut records = vec![CountyRecord::new("Kern"), CountyRecord::new("Marin")];
        merge_temperatures(&mut records, &temp, &[]);
        assert_eq!(records[0].july_max_temp, Some(101.0));
        assert_eq!(records[0].august_max_temp, Some(99.0));
        assert_eq!(records[0].july_cdd, None);
        assert_eq!(records[1].july_max_temp, None);
    }

    #[test]
    fn manifest_overrides_merge_with_defaults() {
        let file = write_temp(r#"{"cdd": "cdd.txt", "indicators": {"energy-burden": "burden.csv"}}"#);
        let manifest = SourceManifest::load(Some(file.path())).unwrap();
        assert_eq!(manifest.cdd, "cdd.txt");
        assert_eq!(manifest.max_temp, SourceManifest::default().max_temp);
        assert_eq!(manifest.indicator_file(Indicator::EnergyBurden), "burden.csv");
        assert_eq!(
            manifest.indicator_file(Indicator::NoInternet),
            Indicator::NoInternet.default_file_name()
        );
    }
}
