//! Shared analysis pipeline used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! sources -> county table -> temperature fits -> residuals -> split -> regression
//!
//! The front-end (`app`) can then focus on presentation (printing and plots).

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::data::{Split, train_test_split};
use crate::domain::{AnalysisConfig, BuildConfig, CountyRecord, Indicator, PivotConfig, RegressConfig, ResidualRecord};
use crate::error::AppError;
use crate::fit::{Residualized, TempFit, correlations, fit_temperature_sources, residualize};
use crate::io::{
    CVI_OUTPUT_NAME, CountyTable, FeatureTable, FitFile, SourceManifest, SummerRow, build_california_cvi,
    california_summer, cdd_table_name, load_county_table, load_feature_table, max_temp_table_name, merge_health,
    merge_indicator, merge_temperatures, read_climdiv, read_health_sheet, read_indicator, write_county_table,
    write_cvi_csv, write_feature_csv, write_fit_json, write_summer_table,
};
use crate::regress::{CrossValidation, KFold, cross_validate};
use crate::report::{ResidualRankings, rank_residuals};

/// Outputs of `heatrisk build`.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub records: Vec<CountyRecord>,
    pub max_temp: Vec<SummerRow>,
    pub cdd: Vec<SummerRow>,
    pub stats_path: PathBuf,
    /// Every file written, in order.
    pub written: Vec<PathBuf>,
}

/// Merge the public sources into the county table and write it.
pub fn run_build(config: &BuildConfig) -> Result<BuildOutput, AppError> {
    let manifest = SourceManifest::load(config.manifest.as_deref())?;
    let source = |name: &str| manifest.resolve(&config.data_dir, name);

    // 1) Health sheets: ED visits are the base table.
    let ed = read_health_sheet(&source(&manifest.ed_visits))?;
    let hosp = read_health_sheet(&source(&manifest.hospitalizations))?;
    let mut records = merge_health(&ed, &hosp);

    // 2) Indicators, inner-joined one after the other.
    for ind in Indicator::ALL {
        let table = read_indicator(&source(manifest.indicator_file(ind)))?;
        records = merge_indicator(records, ind, &table);
    }
    if records.is_empty() {
        return Err(AppError::new(3, "No county survived the indicator joins."));
    }

    // 3) NOAA summer temperatures for the target year.
    let max_temp = california_summer(&read_climdiv(&source(&manifest.max_temp))?, config.year);
    let cdd = california_summer(&read_climdiv(&source(&manifest.cdd))?, config.year);
    if max_temp.is_empty() {
        warn!(year = config.year, "no California max-temperature rows for year");
    }
    merge_temperatures(&mut records, &max_temp, &cdd);

    // 4) Outputs.
    std::fs::create_dir_all(&config.out_dir).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create output directory '{}': {e}", config.out_dir.display()),
        )
    })?;
    let mut written = Vec::new();

    let max_temp_path = config.out_dir.join(max_temp_table_name(config.year));
    write_summer_table(&max_temp_path, &max_temp)?;
    written.push(max_temp_path);

    let cdd_path = config.out_dir.join(cdd_table_name(config.year));
    write_summer_table(&cdd_path, &cdd)?;
    written.push(cdd_path);

    let stats_path = config.out_dir.join(&config.stats_name);
    write_county_table(&stats_path, &records)?;
    written.push(stats_path.clone());

    if config.cvi {
        let table = build_california_cvi(&source(&manifest.cvi), &source(&manifest.food_access))?;
        let cvi_path = config.out_dir.join(CVI_OUTPUT_NAME);
        write_cvi_csv(&cvi_path, &table)?;
        written.push(cvi_path);
    }

    info!(counties = records.len(), files = written.len(), "build finished");
    Ok(BuildOutput {
        records,
        max_temp,
        cdd,
        stats_path,
        written,
    })
}

/// Outputs of the temperature fits.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub table: CountyTable,
    pub fits: Vec<TempFit>,
}

/// Load the county table and fit every temperature series.
pub fn run_fits(stats_path: &Path, pivot: &PivotConfig) -> Result<FitOutput, AppError> {
    let table = load_county_table(stats_path)?;
    let fits = fit_temperature_sources(&table.records, pivot)?;
    Ok(FitOutput { table, fits })
}

/// All computed outputs of a single `heatrisk analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub table: CountyTable,
    pub fits: Vec<TempFit>,
    /// The fit the residuals were computed against.
    pub residual_fit: TempFit,
    pub residualized: Residualized,
    pub correlations: Vec<(Indicator, f64)>,
    pub rankings: ResidualRankings,
    pub split: Split<ResidualRecord>,
}

/// Execute the analysis and write its tables.
pub fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisOutput, AppError> {
    // 1) Load + fit.
    let FitOutput { table, fits } = run_fits(&config.stats_path, &config.pivot)?;
    let residual_fit = fits
        .iter()
        .find(|f| f.source == config.residual_source)
        .cloned()
        .ok_or_else(|| AppError::new(4, "Residual temperature fit missing."))?;
    if !(residual_fit.fit.slope.is_finite() && residual_fit.fit.intercept.is_finite()) {
        return Err(AppError::new(
            4,
            format!(
                "{} fit produced no usable line: {}",
                residual_fit.source.display_name(),
                residual_fit.fit.message
            ),
        ));
    }
    if !residual_fit.fit.success {
        warn!(reason = %residual_fit.fit.message, "residualizing against an unconverged fit");
    }

    // 2) Residualize against the live fit.
    let residualized = residualize(
        &table.records,
        &residual_fit.fit,
        config.residual_source,
        &config.exclude_counties,
    );
    if residualized.rows.is_empty() {
        return Err(AppError::new(3, "No complete county at or above the threshold to analyze."));
    }

    let correlations = correlations(&residualized.rows, &Indicator::ALL);
    let rankings = rank_residuals(&residualized.rows, config.top_n);

    // 3) Split + write.
    let split = train_test_split(&residualized.rows, config.test_size, config.split_seed)?;
    for path in [&config.train_out, &config.validate_out] {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display()))
            })?;
        }
    }
    write_feature_csv(&config.train_out, &split.train, &config.features)?;
    write_feature_csv(&config.validate_out, &split.validate, &config.features)?;

    if let Some(path) = &config.export_fit {
        let file = FitFile::from_fit(
            residual_fit.source,
            &residual_fit.fit,
            [config.pivot.slope_lower, config.pivot.slope_upper],
        );
        write_fit_json(path, &file)?;
    }

    info!(
        train = split.train.len(),
        validate = split.validate.len(),
        "analysis finished"
    );
    Ok(AnalysisOutput {
        table,
        fits,
        residual_fit,
        residualized,
        correlations,
        rankings,
        split,
    })
}

/// Outputs of the cross-validated regression.
#[derive(Debug, Clone)]
pub struct RegressionOutput {
    pub table: FeatureTable,
    pub results: Vec<CrossValidation>,
}

/// Run k-fold regression for every configured feature.
pub fn run_regression(config: &RegressConfig) -> Result<RegressionOutput, AppError> {
    let table = load_feature_table(&config.train_path, &config.features)?;
    let kfold = KFold::new(config.folds, true, config.fold_seed);

    let mut results = Vec::with_capacity(config.features.len());
    for &feature in &config.features {
        let x = table
            .column(feature)
            .ok_or_else(|| AppError::new(2, format!("Missing feature column `{}`.", feature.column_name())))?;
        results.push(cross_validate(feature, x, &table.residual, &kfold)?);
    }

    Ok(RegressionOutput { table, results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SynthConfig, generate_counties};
    use crate::domain::TempSource;
    use crate::io::COUNTY_STATS_NAME;

    #[test]
    fn analysis_refuses_a_fit_without_a_finite_pivot() {
        let dir = tempfile::tempdir().unwrap();
        let stats_path = dir.path().join(COUNTY_STATS_NAME);
        write_county_table(&stats_path, &generate_counties(&SynthConfig::default()).unwrap()).unwrap();

        let config = AnalysisConfig {
            stats_path,
            pivot: PivotConfig {
                y_at_threshold: Some(f64::NAN),
                ..PivotConfig::default()
            },
            residual_source: TempSource::Max,
            features: Indicator::DEFAULT_FEATURES.to_vec(),
            exclude_counties: Vec::new(),
            test_size: 0.2,
            split_seed: 216,
            train_out: dir.path().join(crate::io::TRAIN_NAME),
            validate_out: dir.path().join(crate::io::VALIDATE_NAME),
            export_fit: None,
            top_n: 3,
            plot: false,
            plot_width: 80,
            plot_height: 20,
        };

        let err = run_analysis(&config).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(!config.train_out.exists());
    }
}
