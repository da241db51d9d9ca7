//! CSV exports.
//!
//! - the merged county statistics table (`County_Statistics_withTemp.csv`)
//! - the summer max-temperature / CDD tables for one year
//! - the post-EDA train/validation tables
//!
//! Every export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use crate::domain::{
    AUGUST_CDD_COL, AUGUST_MAX_TEMP_COL, COUNTY_COL, CountyRecord, ED_VISITS_COL, HOSPITALIZATIONS_COL, Indicator,
    JULY_CDD_COL, JULY_MAX_TEMP_COL, RESIDUAL_COL, ResidualRecord,
};
use crate::error::AppError;
use crate::io::noaa::{MONTHS, SUMMER_MONTHS, SummerRow};

pub const COUNTY_STATS_NAME: &str = "County_Statistics_withTemp.csv";
pub const TRAIN_NAME: &str = "train_post_EDA.csv";
pub const VALIDATE_NAME: &str = "validate_post_EDA.csv";

pub fn max_temp_table_name(year: u16) -> String {
    format!("maxTempSu{year}CACounty.csv")
}

pub fn cdd_table_name(year: u16) -> String {
    format!("cddSu{year}CACounty.csv")
}

fn create_writer(path: &Path, what: &str) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_row<I, T>(writer: &mut csv::Writer<File>, row: I, what: &str) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer
        .write_record(row)
        .map_err(|e| AppError::new(2, format!("Failed to write {what} row: {e}")))
}

fn finish(mut writer: csv::Writer<File>, what: &str) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush {what}: {e}")))
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Header of the merged county table, in column order.
pub fn county_table_header() -> Vec<&'static str> {
    let mut header = vec![COUNTY_COL, ED_VISITS_COL, HOSPITALIZATIONS_COL];
    header.extend(Indicator::ALL.iter().map(|ind| ind.column_name()));
    header.extend([JULY_MAX_TEMP_COL, AUGUST_MAX_TEMP_COL, JULY_CDD_COL, AUGUST_CDD_COL]);
    header
}

/// Write the merged county table. Missing values are empty cells.
pub fn write_county_table(path: &Path, records: &[CountyRecord]) -> Result<(), AppError> {
    const WHAT: &str = "county table CSV";
    let mut writer = create_writer(path, WHAT)?;
    write_row(&mut writer, county_table_header(), WHAT)?;

    for r in records {
        let mut row = vec![r.county.clone(), opt(r.ed_visits), opt(r.hospitalizations)];
        row.extend(
            Indicator::ALL
                .iter()
                .map(|ind| r.indicators.get(ind).cloned().unwrap_or_default()),
        );
        row.extend([
            opt(r.july_max_temp),
            opt(r.august_max_temp),
            opt(r.july_cdd),
            opt(r.august_cdd),
        ]);
        write_row(&mut writer, &row, WHAT)?;
    }

    finish(writer, WHAT)
}

/// Write a summer (May–September) table: `FIPS`, the months, `County`.
pub fn write_summer_table(path: &Path, rows: &[SummerRow]) -> Result<(), AppError> {
    const WHAT: &str = "summer table CSV";
    let mut writer = create_writer(path, WHAT)?;

    let mut header = vec!["FIPS"];
    header.extend(SUMMER_MONTHS.map(|m| MONTHS[m]));
    header.push(COUNTY_COL);
    write_row(&mut writer, header, WHAT)?;

    for r in rows {
        let mut row = vec![r.fips.clone()];
        row.extend(SUMMER_MONTHS.map(|m| opt(r.months[m])));
        row.push(r.county.clone().unwrap_or_default());
        write_row(&mut writer, &row, WHAT)?;
    }

    finish(writer, WHAT)
}

/// Write a post-EDA table: county, `features`, temperature residual.
pub fn write_feature_csv(path: &Path, rows: &[ResidualRecord], features: &[Indicator]) -> Result<(), AppError> {
    const WHAT: &str = "feature CSV";
    let mut writer = create_writer(path, WHAT)?;

    let mut header = vec![COUNTY_COL];
    header.extend(features.iter().map(|ind| ind.column_name()));
    header.push(RESIDUAL_COL);
    write_row(&mut writer, header, WHAT)?;

    for r in rows {
        let mut row = vec![r.county.clone()];
        row.extend(features.iter().map(|&ind| {
            let v = r.feature(ind);
            if v.is_finite() { v.to_string() } else { String::new() }
        }));
        row.push(format!("{:.6}", r.residual));
        write_row(&mut writer, &row, WHAT)?;
    }

    finish(writer, WHAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::{load_county_table, load_feature_table};
    use std::collections::BTreeMap;

    #[test]
    fn county_table_reads_back() {
        let mut rec = CountyRecord::new("Los Angeles");
        rec.ed_visits = Some(132.5);
        rec.indicators.insert(Indicator::Imperviousness, "41.2%".to_string());
        rec.july_max_temp = Some(88.4);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COUNTY_STATS_NAME);

        write_county_table(&path, &[rec.clone()]).unwrap();
        let table = load_county_table(&path).unwrap();
        assert_eq!(table.records, vec![rec]);
        assert!(table.row_errors.is_empty());

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("County,Emergency Visits / 100000,Hospitalizations / 100000,Energy Burden"));
        assert!(header.ends_with("July max temp (F),August max temp (F),July CDD,August CDD"));
    }

    #[test]
    fn summer_table_has_five_months() {
        let mut months = [None; 12];
        months[4] = Some(80.5);
        months[6] = Some(99.0);
        let rows = vec![SummerRow {
            fips: "029".to_string(),
            county: Some("Kern".to_string()),
            months,
        }];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(max_temp_table_name(2023));
        write_summer_table(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "FIPS,May,Jun,Jul,Aug,Sep,County\n029,80.5,,99,,,Kern\n");
        assert_eq!(cdd_table_name(2023), "cddSu2023CACounty.csv");
    }

    #[test]
    fn feature_csv_reads_back() {
        let row = ResidualRecord {
            county: "Fresno".to_string(),
            temp: 99.0,
            observed: 150.0,
            predicted: 140.0,
            residual: 10.0,
            features: BTreeMap::from([(Indicator::EnergyBurden, 3.5), (Indicator::NoInternet, 12.0)]),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAIN_NAME);
        let features = [Indicator::EnergyBurden, Indicator::NoInternet];
        write_feature_csv(&path, &[row], &features).unwrap();

        let table = load_feature_table(&path, &features).unwrap();
        assert_eq!(table.counties, vec!["Fresno"]);
        assert_eq!(table.residual, vec![10.0]);
        assert_eq!(table.column(Indicator::NoInternet), Some(&[12.0][..]));
    }
}
