//! CSV ingest for the merged county table and the post-EDA feature tables.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (keep going on bad rows, but report what happened)
//! - header lookup that tolerates case, surrounding whitespace and a UTF-8 BOM

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{
    AUGUST_CDD_COL, AUGUST_MAX_TEMP_COL, COUNTY_COL, CountyRecord, ED_VISITS_COL, HOSPITALIZATIONS_COL, Indicator,
    JULY_CDD_COL, JULY_MAX_TEMP_COL, RESIDUAL_COL,
};
use crate::error::AppError;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub county: Option<String>,
    pub message: String,
}

/// The merged county table as read back from disk.
#[derive(Debug, Clone)]
pub struct CountyTable {
    pub records: Vec<CountyRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl CountyTable {
    pub fn with_outcome(&self) -> usize {
        self.records.iter().filter(|r| r.ed_visits.is_some()).count()
    }
}

/// A post-EDA table: county, feature columns and the temperature residual.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub counties: Vec<String>,
    pub features: Vec<(Indicator, Vec<f64>)>,
    pub residual: Vec<f64>,
    pub row_errors: Vec<RowError>,
}

impl FeatureTable {
    pub fn column(&self, indicator: Indicator) -> Option<&[f64]> {
        self.features
            .iter()
            .find(|(ind, _)| *ind == indicator)
            .map(|(_, values)| values.as_slice())
    }
}

/// Open a CSV reader with the settings used for every input in this crate.
pub(crate) fn open_csv(path: &Path, what: &str) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open {what} '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

pub(crate) fn read_headers(reader: &mut csv::Reader<File>, path: &Path) -> Result<StringRecord, AppError> {
    reader
        .headers()
        .map(StringRecord::clone)
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of '{}': {e}", path.display())))
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn require_column(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, AppError> {
    header_map.get(&normalize_header_name(name)).copied().ok_or_else(|| {
        AppError::new(
            2,
            format!("Missing required column `{name}` in '{}'.", path.display()),
        )
    })
}

pub(crate) fn get_optional<'a>(record: &'a StringRecord, idx: Option<usize>) -> Option<&'a str> {
    let s = record.get(idx?)?.trim();
    if s.is_empty() { None } else { Some(s) }
}

pub(crate) fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    s.and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite())
}

/// Load the merged county statistics CSV.
pub fn load_county_table(path: &Path) -> Result<CountyTable, AppError> {
    let mut reader = open_csv(path, "county statistics CSV")?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);

    let county_idx = require_column(&header_map, COUNTY_COL, path)?;
    let ed_idx = require_column(&header_map, ED_VISITS_COL, path)?;
    let lookup = |name: &str| header_map.get(&normalize_header_name(name)).copied();
    let hosp_idx = lookup(HOSPITALIZATIONS_COL);
    let july_idx = lookup(JULY_MAX_TEMP_COL);
    let august_idx = lookup(AUGUST_MAX_TEMP_COL);
    let july_cdd_idx = lookup(JULY_CDD_COL);
    let august_cdd_idx = lookup(AUGUST_CDD_COL);
    let indicator_idx: Vec<(Indicator, Option<usize>)> =
        Indicator::ALL.iter().map(|&ind| (ind, lookup(ind.column_name()))).collect();

    if july_idx.is_none() && august_idx.is_none() {
        return Err(AppError::new(
            2,
            format!(
                "'{}' has neither `{JULY_MAX_TEMP_COL}` nor `{AUGUST_MAX_TEMP_COL}`.",
                path.display()
            ),
        ));
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

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
            row_errors.push(RowError {
                line,
                county: None,
                message: "Missing county name.".to_string(),
            });
            continue;
        };

        let mut out = CountyRecord::new(county);
        out.ed_visits = parse_numeric(&record, Some(ed_idx), ED_VISITS_COL, line, county, &mut row_errors);
        out.hospitalizations = parse_numeric(&record, hosp_idx, HOSPITALIZATIONS_COL, line, county, &mut row_errors);
        out.july_max_temp = parse_numeric(&record, july_idx, JULY_MAX_TEMP_COL, line, county, &mut row_errors);
        out.august_max_temp = parse_numeric(&record, august_idx, AUGUST_MAX_TEMP_COL, line, county, &mut row_errors);
        out.july_cdd = parse_numeric(&record, july_cdd_idx, JULY_CDD_COL, line, county, &mut row_errors);
        out.august_cdd = parse_numeric(&record, august_cdd_idx, AUGUST_CDD_COL, line, county, &mut row_errors);
        for &(ind, col) in &indicator_idx {
            if let Some(raw) = get_optional(&record, col) {
                out.indicators.insert(ind, raw.to_string());
            }
        }

        records.push(out);
    }

    if records.is_empty() {
        return Err(AppError::new(3, format!("No county rows found in '{}'.", path.display())));
    }

    info!(path = %path.display(), rows = rows_read, errors = row_errors.len(), "loaded county table");
    Ok(CountyTable {
        records,
        row_errors,
        rows_read,
    })
}

/// Parse an optional numeric cell; non-numeric text is recorded as a row error
/// and treated as missing.
fn parse_numeric(
    record: &StringRecord,
    idx: Option<usize>,
    column: &str,
    line: usize,
    county: &str,
    row_errors: &mut Vec<RowError>,
) -> Option<f64> {
    let raw = get_optional(record, idx)?;
    let parsed = parse_opt_f64(Some(raw));
    if parsed.is_none() {
        debug!(line, county, column, raw, "non-numeric cell treated as missing");
        row_errors.push(RowError {
            line,
            county: Some(county.to_string()),
            message: format!("Invalid `{column}` value {raw:?}; treated as missing."),
        });
    }
    parsed
}

/// Load a train/validate CSV written by `heatrisk analyze`.
///
/// Only the `features` columns are loaded, and each of them must exist.
pub fn load_feature_table(path: &Path, features: &[Indicator]) -> Result<FeatureTable, AppError> {
    let mut reader = open_csv(path, "feature CSV")?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);

    let county_idx = require_column(&header_map, COUNTY_COL, path)?;
    let residual_idx = require_column(&header_map, RESIDUAL_COL, path)?;
    let mut feature_idx = Vec::with_capacity(features.len());
    for &ind in features {
        feature_idx.push((ind, require_column(&header_map, ind.column_name(), path)?));
    }

    let mut counties = Vec::new();
    let mut residual = Vec::new();
    let mut columns: Vec<(Indicator, Vec<f64>)> = features.iter().map(|&ind| (ind, Vec::new())).collect();
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

        let county = get_optional(&record, Some(county_idx)).unwrap_or("").to_string();
        let Some(res) = parse_opt_f64(get_optional(&record, Some(residual_idx))) else {
            row_errors.push(RowError {
                line,
                county: Some(county),
                message: format!("Missing/invalid `{RESIDUAL_COL}` value."),
            });
            continue;
        };

        counties.push(county);
        residual.push(res);
        for ((_, col), (_, values)) in feature_idx.iter().zip(columns.iter_mut()) {
            values.push(parse_opt_f64(get_optional(&record, Some(*col))).unwrap_or(f64::NAN));
        }
    }

    if residual.is_empty() {
        return Err(AppError::new(3, format!("No usable rows in '{}'.", path.display())));
    }

    Ok(FeatureTable {
        counties,
        features: columns,
        residual,
        row_errors,
    })
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

    #[test]
    fn header_names_are_normalized() {
        assert_eq!(normalize_header_name("\u{feff}County "), "county");
        assert_eq!(normalize_header_name("July max temp (F)"), "july max temp (f)");
    }

    #[test]
    fn loads_county_rows_and_reports_bad_cells() {
        let csv = "\u{feff}County,Emergency Visits / 100000,Imperviousness,July max temp (F),August max temp (F)\n\
                   Fresno,150.5,12.1%,99.1,101.2\n\
                   Marin,,3%,71.0,73.5\n\
                   Kern,abc,9%,100.0,\n";
        let file = write_temp(csv);
        let table = load_county_table(file.path()).unwrap();

        assert_eq!(table.rows_read, 3);
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.with_outcome(), 1);
        assert_eq!(table.records[0].indicators[&Indicator::Imperviousness], "12.1%");
        assert_eq!(table.records[2].august_max_temp, None);
        assert_eq!(table.row_errors.len(), 1);
        assert_eq!(table.row_errors[0].line, 4);
    }

    #[test]
    fn missing_outcome_column_is_a_schema_error() {
        let file = write_temp("County,July max temp (F)\nFresno,99\n");
        let err = load_county_table(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn loads_feature_table() {
        let csv = format!(
            "County,Imperviousness,{RESIDUAL_COL}\nA,10.0,1.5\nB,,2.5\nC,30.0,\n"
        );
        let file = write_temp(&csv);
        let table = load_feature_table(file.path(), &[Indicator::Imperviousness]).unwrap();
        assert_eq!(table.counties, vec!["A", "B"]);
        assert_eq!(table.residual, vec![1.5, 2.5]);
        let col = table.column(Indicator::Imperviousness).unwrap();
        assert_eq!(col[0], 10.0);
        assert!(col[1].is_nan());
        assert_eq!(table.row_errors.len(), 1);
    }
}
