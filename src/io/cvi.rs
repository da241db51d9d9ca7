//! Climate Vulnerability Index (CVI) tract table for California.
//!
//! The master CVI export is filtered to `State == "CA"` and the low-income /
//! low-food-access flag for 2019 is attached by census tract. Every other CVI
//! column passes through untouched.

use std::collections::HashMap;
use std::path::Path;

use csv::StringRecord;
use tracing::info;

use crate::error::AppError;
use crate::io::ingest::{build_header_map, get_optional, open_csv, read_headers, require_column};

pub const CVI_STATE_COL: &str = "State";
pub const CVI_FIPS_COL: &str = "FIPS Code";
pub const FOOD_TRACT_COL: &str = "CensusTract";
pub const FOOD_ACCESS_COL: &str = "Food Access";
pub const FOOD_ACCESS_YEAR: i64 = 2019;
pub const CVI_OUTPUT_NAME: &str = "California_CVI_dataset.csv";

/// CVI rows with the food-access column appended.
#[derive(Debug, Clone)]
pub struct CviTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    /// Rows whose tract had a food-access value.
    pub matched: usize,
}

/// Tract codes are compared as numbers: `06001400100`, `6001400100` and
/// `6001400100.0` are the same tract.
fn tract_key(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".0").unwrap_or(raw);
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

/// Tract → food-access value for `FOOD_ACCESS_YEAR`; the first row per tract wins.
pub fn read_food_access(path: &Path) -> Result<HashMap<String, String>, AppError> {
    let mut reader = open_csv(path, "food access CSV")?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);
    let tract_idx = require_column(&header_map, FOOD_TRACT_COL, path)?;
    let access_idx = require_column(&header_map, FOOD_ACCESS_COL, path)?;
    let year_idx = require_column(&header_map, "Year", path)?;

    let mut out = HashMap::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            AppError::new(2, format!("CSV parse error in '{}' line {}: {e}", path.display(), idx + 2))
        })?;
        let year = get_optional(&record, Some(year_idx)).and_then(|y| y.parse::<f64>().ok());
        if year != Some(FOOD_ACCESS_YEAR as f64) {
            continue;
        }
        let Some(tract) = get_optional(&record, Some(tract_idx)) else {
            continue;
        };
        let access = get_optional(&record, Some(access_idx)).unwrap_or("").to_string();
        out.entry(tract_key(tract)).or_insert(access);
    }
    Ok(out)
}

/// Filter the CVI master table to California and join food access.
pub fn build_california_cvi(cvi_path: &Path, food_access_path: &Path) -> Result<CviTable, AppError> {
    let food = read_food_access(food_access_path)?;

    let mut reader = open_csv(cvi_path, "CVI CSV")?;
    let source_headers = read_headers(&mut reader, cvi_path)?;
    let header_map = build_header_map(&source_headers);
    let state_idx = require_column(&header_map, CVI_STATE_COL, cvi_path)?;
    let fips_idx = require_column(&header_map, CVI_FIPS_COL, cvi_path)?;

    let keep: Vec<usize> = (0..source_headers.len()).filter(|&i| i != state_idx).collect();
    let mut headers: StringRecord = keep.iter().filter_map(|&i| source_headers.get(i)).collect();
    headers.push_field(FOOD_ACCESS_COL);

    let mut rows = Vec::new();
    let mut matched = 0usize;
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            AppError::new(2, format!("CSV parse error in '{}' line {}: {e}", cvi_path.display(), idx + 2))
        })?;
        if get_optional(&record, Some(state_idx)) != Some("CA") {
            continue;
        }

        let access = get_optional(&record, Some(fips_idx)).and_then(|fips| food.get(&tract_key(fips)));
        if access.is_some() {
            matched += 1;
        }

        let mut row: StringRecord = keep.iter().map(|&i| record.get(i).unwrap_or("")).collect();
        row.push_field(access.map(String::as_str).unwrap_or(""));
        rows.push(row);
    }

    info!(rows = rows.len(), matched, "built California CVI table");
    Ok(CviTable { headers, rows, matched })
}

/// Write the CVI table as CSV.
pub fn write_cvi_csv(path: &Path, table: &CviTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CVI CSV '{}': {e}", path.display())))?;
    writer
        .write_record(&table.headers)
        .map_err(|e| AppError::new(2, format!("Failed to write CVI CSV header: {e}")))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::new(2, format!("Failed to write CVI CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CVI CSV: {e}")))?;
    Ok(())
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
    fn tract_keys_ignore_padding_and_float_suffix() {
        assert_eq!(tract_key("06001400100"), "6001400100");
        assert_eq!(tract_key("6001400100.0"), "6001400100");
        assert_eq!(tract_key("000"), "0");
    }

    #[test]
    fn filters_california_and_joins_food_access() {
        let cvi = write_temp(
            "State,FIPS Code,Overall CVI Score\n\
             CA,06001400100,0.41\n\
             NV,32003000100,0.52\n\
             CA,06001400200,0.38\n",
        );
        let food = write_temp(
            "CensusTract,Year,Food Access\n\
             6001400100,2015,9\n\
             6001400100,2019,1\n\
             6001400100,2019,7\n",
        );

        let table = build_california_cvi(cvi.path(), food.path()).unwrap();
        assert_eq!(table.headers, StringRecord::from(vec!["FIPS Code", "Overall CVI Score", "Food Access"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], StringRecord::from(vec!["06001400100", "0.41", "1"]));
        assert_eq!(table.rows[1].get(2), Some(""));
        assert_eq!(table.matched, 1);

        let out = tempfile::NamedTempFile::new().unwrap();
        write_cvi_csv(out.path(), &table).unwrap();
        let written = std::fs::read_to_string(out.path()).unwrap();
        assert!(written.starts_with("FIPS Code,Overall CVI Score,Food Access\n"));
    }
}
