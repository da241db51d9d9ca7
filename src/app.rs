//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - turns arguments into plain config structs
//! - runs the pipeline and prints reports/plots

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;

use crate::cli::{
    AnalyzeArgs, BuildArgs, Cli, Command, CvArgs, FitArgs, PivotArgs, PlotArgs, RegressArgs, RunArgs, SynthArgs,
};
use crate::data::{SynthConfig, generate_counties};
use crate::domain::{AnalysisConfig, BuildConfig, Indicator, PivotConfig, RegressConfig};
use crate::error::AppError;
use crate::io::{COUNTY_STATS_NAME, FitFile, TRAIN_NAME, VALIDATE_NAME, read_fit_json, write_county_table, write_fit_json};
use crate::plot::{render_fit_file, render_histogram, render_pivot_fit, render_regression_plot};
use crate::report;

pub mod pipeline;

/// Entry point for the `heatrisk` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` is optional; real environment variables win.
    dotenvy::dotenv().ok();

    // `heatrisk` and `heatrisk --stats x.csv` behave like `heatrisk run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    crate::logging::init(cli.verbose);
    debug!(command = ?cli.command, "parsed command line");

    match cli.command {
        Command::Build(args) => handle_build(&args),
        Command::Fit(args) => handle_fit(&args),
        Command::Analyze(args) => handle_analyze(&args).map(|_| ()),
        Command::Regress(args) => handle_regress(&args),
        Command::Run(args) => handle_run(&args),
        Command::Plot(args) => handle_plot(&args),
        Command::Synth(args) => handle_synth(&args),
    }
}

fn handle_build(args: &BuildArgs) -> Result<(), AppError> {
    let config = build_config_from_args(args);
    let out = pipeline::run_build(&config)?;

    let complete = out.records.iter().filter(|r| r.is_complete()).count();
    let written: Vec<&Path> = out.written.iter().map(PathBuf::as_path).collect();
    println!("{}", report::format_build_summary(out.records.len(), complete, &written));
    Ok(())
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let stats_path = stats_path(args.table.stats.as_deref(), &args.table.out_dir);
    let pivot = pivot_config_from_args(&args.pivot);
    let out = pipeline::run_fits(&stats_path, &pivot)?;

    print!("{}", report::format_row_errors(&out.table.row_errors, 10));
    println!("{}", report::format_fit_summary(&out.fits, out.table.with_outcome(), args.source));

    if !args.plot.no_plot {
        for t in &out.fits {
            let label = format!("{} fit: ED visits / 100000 vs max temperature (F)", t.source.display_name());
            println!("{}", render_pivot_fit(&t.fit, &label, args.plot.width, args.plot.height));
        }
    }

    if let Some(path) = &args.export_fit {
        let chosen = out
            .fits
            .iter()
            .find(|t| t.source == args.source)
            .ok_or_else(|| AppError::new(4, "Requested temperature fit missing."))?;
        let file = FitFile::from_fit(chosen.source, &chosen.fit, [pivot.slope_lower, pivot.slope_upper]);
        write_fit_json(path, &file)?;
    }
    Ok(())
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<AnalysisConfig, AppError> {
    let config = analysis_config_from_args(args);
    let out = pipeline::run_analysis(&config)?;

    print!("{}", report::format_row_errors(&out.table.row_errors, 10));
    println!(
        "{}",
        report::format_fit_summary(&out.fits, out.table.with_outcome(), config.residual_source)
    );
    print!("{}", report::format_residual_summary(&out.residualized, config.residual_source));
    print!("{}", report::format_correlations(&out.correlations));
    print!("{}", report::format_rankings(&out.rankings));
    println!(
        "{}",
        report::format_split_summary(
            out.split.train.len(),
            out.split.validate.len(),
            &config.train_out,
            &config.validate_out
        )
    );

    if config.plot {
        let label = format!(
            "{} fit: ED visits / 100000 vs max temperature (F)",
            out.residual_fit.source.display_name()
        );
        println!(
            "{}",
            render_pivot_fit(&out.residual_fit.fit, &label, config.plot_width, config.plot_height)
        );
        let residuals: Vec<f64> = out.residualized.rows.iter().map(|r| r.residual).collect();
        println!("{}", render_histogram(&residuals, 10, 40, "Temperature residual"));
    }

    Ok(config)
}

fn handle_regress(args: &RegressArgs) -> Result<(), AppError> {
    let train_path = args
        .train
        .clone()
        .unwrap_or_else(|| args.out_dir.join(TRAIN_NAME));
    let config = regress_config_from_args(
        train_path,
        &args.features,
        &args.cv,
        !args.plot.no_plot,
        args.plot.width,
        args.plot.height,
    );
    regress_and_print(&config)
}

fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let analysis = handle_analyze(&args.analyze)?;
    let config = regress_config_from_args(
        analysis.train_out.clone(),
        &analysis.features,
        &args.cv,
        analysis.plot,
        analysis.plot_width,
        analysis.plot_height,
    );
    regress_and_print(&config)
}

fn regress_and_print(config: &RegressConfig) -> Result<(), AppError> {
    let out = pipeline::run_regression(config)?;

    print!("{}", report::format_row_errors(&out.table.row_errors, 10));
    println!("{}", report::format_regression(&out.results));

    if config.plot {
        for cv in &out.results {
            let label = format!("{} vs temperature residual", cv.feature.column_name());
            println!(
                "{}",
                render_regression_plot(&cv.points, &cv.line, &label, config.plot_width, config.plot_height)
            );
        }
    }
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let file = read_fit_json(&args.fit)?;
    println!("{}", render_fit_file(&file, args.width, args.height));
    Ok(())
}

fn handle_synth(args: &SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        seed: args.seed,
        slope: args.slope,
        noise_sd: args.noise_sd,
        missing_prob: args.missing_prob,
        ..SynthConfig::default()
    };
    let records = generate_counties(&config)?;

    let path = stats_path(args.out.as_deref(), &args.out_dir);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))?;
    }
    write_county_table(&path, &records)?;
    println!("Wrote {} synthetic counties to {}", records.len(), path.display());
    Ok(())
}

fn stats_path(explicit: Option<&Path>, out_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.join(COUNTY_STATS_NAME))
}

pub fn build_config_from_args(args: &BuildArgs) -> BuildConfig {
    BuildConfig {
        data_dir: args.data_dir.clone(),
        out_dir: args.out_dir.clone(),
        manifest: args.manifest.clone(),
        year: args.year,
        stats_name: args.stats_name.clone(),
        cvi: args.cvi,
    }
}

pub fn pivot_config_from_args(args: &PivotArgs) -> PivotConfig {
    PivotConfig {
        threshold: args.threshold,
        slope_lower: args.slope_min,
        slope_upper: args.slope_max,
        y_at_threshold: args.y_at_threshold,
        max_nfev: args.max_nfev,
    }
}

pub fn analysis_config_from_args(args: &AnalyzeArgs) -> AnalysisConfig {
    let out_dir = &args.table.out_dir;
    AnalysisConfig {
        stats_path: stats_path(args.table.stats.as_deref(), out_dir),
        pivot: pivot_config_from_args(&args.pivot),
        residual_source: args.source,
        features: args.features.clone(),
        exclude_counties: args.exclude.iter().map(|c| c.trim().to_string()).collect(),
        test_size: args.test_size,
        split_seed: args.seed,
        train_out: args.train_out.clone().unwrap_or_else(|| out_dir.join(TRAIN_NAME)),
        validate_out: args.validate_out.clone().unwrap_or_else(|| out_dir.join(VALIDATE_NAME)),
        export_fit: args.export_fit.clone(),
        top_n: args.top,
        plot: !args.plot.no_plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
    }
}

pub fn regress_config_from_args(
    train_path: PathBuf,
    features: &[Indicator],
    cv: &CvArgs,
    plot: bool,
    plot_width: usize,
    plot_height: usize,
) -> RegressConfig {
    RegressConfig {
        train_path,
        features: features.to_vec(),
        folds: cv.folds,
        fold_seed: cv.fold_seed,
        plot,
        plot_width,
        plot_height,
    }
}

/// Rewrite argv so `heatrisk` defaults to `heatrisk run`.
///
/// Rules:
/// - `heatrisk`                        -> `heatrisk run`
/// - `heatrisk --stats x.csv ...`      -> `heatrisk run --stats x.csv ...`
/// - `heatrisk --help/--version/-h`    -> unchanged (show top-level help/version)
/// - `heatrisk -v analyze ...`         -> unchanged (global flag before a subcommand)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let has_subcommand = argv.iter().skip(1).any(|a| is_subcommand(a));
    if has_subcommand {
        return argv;
    }

    // Only flags were given: treat them as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    // Otherwise, leave as-is and let clap report the error.
    argv
}

fn is_subcommand(arg: &str) -> bool {
    matches!(
        arg,
        "build" | "fit" | "analyze" | "regress" | "run" | "plot" | "synth"
    )
}
