//! Command-line parsing for the heat-exposure analysis.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting/statistics code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_THRESHOLD_F, Indicator, TempSource};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "heatrisk",
    version,
    about = "County heat exposure vs emergency-department visits"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge the public source files into the county statistics table.
    Build(BuildArgs),
    /// Fit the July, August and max-temperature response lines and print diagnostics.
    Fit(FitArgs),
    /// Fit, residualize, correlate and write the train/validation split.
    Analyze(AnalyzeArgs),
    /// Cross-validated single-feature regression on a train split.
    Regress(RegressArgs),
    /// `analyze` followed by `regress` on the fresh train split.
    Run(RunArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Write a synthetic county statistics table.
    Synth(SynthArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    /// Directory holding the downloaded public datasets.
    #[arg(long, env = "HEATRISK_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for generated tables.
    #[arg(long, env = "HEATRISK_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// JSON file overriding source file names.
    #[arg(long, value_name = "JSON")]
    pub manifest: Option<PathBuf>,

    /// Year of the NOAA summer temperatures to join.
    #[arg(long, default_value_t = 2023)]
    pub year: u16,

    /// File name of the merged county table inside `--out-dir`.
    #[arg(long, default_value = crate::io::COUNTY_STATS_NAME)]
    pub stats_name: String,

    /// Also build the California CVI tract table.
    #[arg(long)]
    pub cvi: bool,
}

/// Where the merged county table lives.
#[derive(Debug, Args, Clone)]
pub struct TableArgs {
    /// County statistics CSV (defaults to `<out-dir>/County_Statistics_withTemp.csv`).
    #[arg(long, value_name = "CSV")]
    pub stats: Option<PathBuf>,

    /// Directory for generated tables.
    #[arg(long, env = "HEATRISK_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,
}

/// Threshold-pivoted fit settings.
#[derive(Debug, Args, Clone)]
pub struct PivotArgs {
    /// Temperature threshold (F); only counties at or above it are fitted.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_F)]
    pub threshold: f64,

    /// Lower slope bound.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub slope_min: f64,

    /// Upper slope bound.
    #[arg(long, default_value_t = 1e6, allow_negative_numbers = true)]
    pub slope_max: f64,

    /// ED visits enforced at the threshold (defaults to the lowest observed rate).
    #[arg(long)]
    pub y_at_threshold: Option<f64>,

    /// Evaluation budget of the slope optimizer.
    #[arg(long, default_value_t = 20_000)]
    pub max_nfev: usize,
}

#[derive(Debug, Args, Clone)]
pub struct PlotOpts {
    /// Disable terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub table: TableArgs,

    #[command(flatten)]
    pub pivot: PivotArgs,

    #[command(flatten)]
    pub plot: PlotOpts,

    /// Temperature series written by `--export-fit`.
    #[arg(long, value_enum, default_value_t = TempSource::Max)]
    pub source: TempSource,

    /// Export the fit (line + points + grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub table: TableArgs,

    #[command(flatten)]
    pub pivot: PivotArgs,

    #[command(flatten)]
    pub plot: PlotOpts,

    /// Temperature series whose fit is subtracted from ED visits.
    #[arg(long, value_enum, default_value_t = TempSource::Max)]
    pub source: TempSource,

    /// Features written to the train/validation tables (comma separated).
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = Indicator::DEFAULT_FEATURES)]
    pub features: Vec<Indicator>,

    /// Counties left out of correlations and the split (comma separated, e.g. Imperial).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Share of rows held out for validation.
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Seed of the train/validation shuffle.
    #[arg(long, default_value_t = 216)]
    pub seed: u64,

    /// Train table output (defaults to `<out-dir>/train_post_EDA.csv`).
    #[arg(long, value_name = "CSV")]
    pub train_out: Option<PathBuf>,

    /// Validation table output (defaults to `<out-dir>/validate_post_EDA.csv`).
    #[arg(long, value_name = "CSV")]
    pub validate_out: Option<PathBuf>,

    /// Export the residualizing fit to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Show the top-N counties above and below the temperature line.
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

/// K-fold settings.
#[derive(Debug, Args, Clone)]
pub struct CvArgs {
    /// Number of folds.
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Seed of the fold shuffle.
    #[arg(long, default_value_t = 25)]
    pub fold_seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct RegressArgs {
    /// Train table (defaults to `<out-dir>/train_post_EDA.csv`).
    #[arg(long, value_name = "CSV")]
    pub train: Option<PathBuf>,

    /// Directory for generated tables.
    #[arg(long, env = "HEATRISK_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// Features to regress (comma separated).
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = Indicator::DEFAULT_FEATURES)]
    pub features: Vec<Indicator>,

    #[command(flatten)]
    pub cv: CvArgs,

    #[command(flatten)]
    pub plot: PlotOpts,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub analyze: AnalyzeArgs,

    #[command(flatten)]
    pub cv: CvArgs,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Fit JSON file produced by `heatrisk fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV (defaults to `<out-dir>/County_Statistics_withTemp.csv`).
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    /// Directory for generated tables.
    #[arg(long, env = "HEATRISK_OUT_DIR", default_value = "out")]
    pub out_dir: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 216)]
    pub seed: u64,

    /// ED visits per degree above the threshold.
    #[arg(long, default_value_t = 1.8)]
    pub slope: f64,

    /// Standard deviation of the outcome noise.
    #[arg(long, default_value_t = 3.0)]
    pub noise_sd: f64,

    /// Probability that a county has no ED figure.
    #[arg(long, default_value_t = 0.05)]
    pub missing_prob: f64,
}
