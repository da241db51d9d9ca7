//! NOAA nClimDiv county text files (`climdiv-*cy-*.txt`).
//!
//! Each line is whitespace separated:
//!
//! ```text
//! 04019272023   57.80   63.40 ...   (12 monthly values)
//! ^^              state code (NOAA numbering, 04 = California)
//!   ^^^           county FIPS
//!      ^^         element code
//!        ^^^^     year
//! ```
//!
//! Missing months are written as large negative sentinels (`-99.99`, `-9999.`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::data::fips::county_name;
use crate::error::AppError;

/// NOAA state code for California (not the census FIPS code 06).
pub const CALIFORNIA_STATE_CODE: &str = "04";

/// Values at or below this are missing-data sentinels.
const MISSING_SENTINEL: f64 = -99.0;

/// Month labels, January first.
pub const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Summer months kept for the heat analysis (May–September).
pub const SUMMER_MONTHS: std::ops::RangeInclusive<usize> = 4..=8;

pub const JULY: usize = 6;
pub const AUGUST: usize = 7;

/// One decoded climdiv line.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimdivRow {
    pub state_code: String,
    pub fips: String,
    pub element: String,
    pub year: u16,
    pub months: [Option<f64>; 12],
}

/// Summer values for one California county and year.
#[derive(Debug, Clone, PartialEq)]
pub struct SummerRow {
    pub fips: String,
    /// `None` when the FIPS code is not in the county table.
    pub county: Option<String>,
    pub months: [Option<f64>; 12],
}

impl SummerRow {
    pub fn july(&self) -> Option<f64> {
        self.months[JULY]
    }

    pub fn august(&self) -> Option<f64> {
        self.months[AUGUST]
    }
}

/// Decode one line.
pub fn parse_climdiv_line(line: &str) -> Result<ClimdivRow, String> {
    let mut tokens = line.split_whitespace();
    let code = tokens.next().ok_or_else(|| "empty line".to_string())?;
    if code.len() != 11 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid station code {code:?} (expected 11 digits)"));
    }

    let year: u16 = code[7..11]
        .parse()
        .map_err(|e| format!("invalid year in {code:?}: {e}"))?;

    let mut months = [None; 12];
    for (i, slot) in months.iter_mut().enumerate() {
        let raw = tokens
            .next()
            .ok_or_else(|| format!("expected 12 monthly values, got {i}"))?;
        let value: f64 = raw.parse().map_err(|e| format!("invalid {} value {raw:?}: {e}", MONTHS[i]))?;
        *slot = if value <= MISSING_SENTINEL { None } else { Some(value) };
    }

    Ok(ClimdivRow {
        state_code: code[0..2].to_string(),
        fips: code[2..5].to_string(),
        element: code[5..7].to_string(),
        year,
        months,
    })
}

/// Read every decodable line of a climdiv file. Undecodable lines are logged and skipped.
pub fn read_climdiv(path: &Path) -> Result<Vec<ClimdivRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open NOAA file '{}': {e}", path.display())))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| AppError::new(2, format!("Failed to read '{}': {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_climdiv_line(&line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), line = idx + 1, error = %e, "skipping climdiv line");
            }
        }
    }

    info!(path = %path.display(), rows = rows.len(), skipped, "read climdiv file");
    Ok(rows)
}

/// California rows for `year`, with county names attached.
pub fn california_summer(rows: &[ClimdivRow], year: u16) -> Vec<SummerRow> {
    rows.iter()
        .filter(|r| r.state_code == CALIFORNIA_STATE_CODE && r.year == year)
        .map(|r| {
            let county = county_name(&r.fips).map(str::to_string);
            if county.is_none() {
                warn!(fips = %r.fips, "unknown California county FIPS");
            }
            SummerRow {
                fips: r.fips.clone(),
                county,
                months: r.months,
            }
        })
        .collect()
}
