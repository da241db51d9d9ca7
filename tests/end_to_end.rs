use heatrisk::app::pipeline::{run_analysis, run_regression};
use heatrisk::data::{SynthConfig, generate_counties};
use heatrisk::domain::{AnalysisConfig, Indicator, PivotConfig, RegressConfig, TempSource};
use heatrisk::io::{COUNTY_STATS_NAME, TRAIN_NAME, VALIDATE_NAME, read_fit_json, write_county_table};

#[test]
fn synthetic_counties_flow_through_analysis_and_regression() {
    let dir = tempfile::tempdir().unwrap();
    let stats_path = dir.path().join(COUNTY_STATS_NAME);
    let records = generate_counties(&SynthConfig::default()).unwrap();
    write_county_table(&stats_path, &records).unwrap();

    let fit_path = dir.path().join("fit.json");
    let config = AnalysisConfig {
        stats_path,
        pivot: PivotConfig::default(),
        residual_source: TempSource::Max,
        features: Indicator::DEFAULT_FEATURES.to_vec(),
        exclude_counties: vec!["Imperial".to_string()],
        test_size: 0.2,
        split_seed: 216,
        train_out: dir.path().join(TRAIN_NAME),
        validate_out: dir.path().join(VALIDATE_NAME),
        export_fit: Some(fit_path.clone()),
        top_n: 3,
        plot: false,
        plot_width: 80,
        plot_height: 20,
    };

    let out = run_analysis(&config).unwrap();

    // Three fits, all pinned at the same pivot.
    assert_eq!(out.fits.len(), 3);
    let fit = &out.residual_fit.fit;
    assert!(fit.slope > 0.0);
    assert!((fit.slope * fit.x_threshold + fit.intercept - fit.y_at_threshold).abs() < 1e-6);
    for t in &out.fits {
        assert_eq!(t.fit.y_at_threshold, fit.y_at_threshold);
    }

    // Residuals come from the live fit and only from hot counties.
    assert!(out.residualized.rows.iter().all(|r| r.temp >= 80.0));
    assert!(out.residualized.rows.iter().all(|r| r.county != "Imperial"));
    for r in &out.residualized.rows {
        assert!((r.predicted - fit.predict(r.temp)).abs() < 1e-9);
    }

    // Energy burden drives the synthetic outcome beyond temperature.
    let burden = out
        .correlations
        .iter()
        .find(|(ind, _)| *ind == Indicator::EnergyBurden)
        .map(|(_, r)| *r)
        .unwrap();
    assert!(burden > 0.5, "energy burden correlation {burden}");

    let n = out.residualized.rows.len();
    assert_eq!(out.split.validate.len(), (0.2 * n as f64).ceil() as usize);
    assert_eq!(out.split.train.len() + out.split.validate.len(), n);
    assert_eq!(out.rankings.highest.len(), 3);

    let saved = read_fit_json(&fit_path).unwrap();
    assert_eq!(saved.source, TempSource::Max);
    assert_eq!(saved.points.x.len(), fit.n());

    let regression = run_regression(&RegressConfig {
        train_path: config.train_out.clone(),
        features: config.features.clone(),
        folds: 5,
        fold_seed: 25,
        plot: false,
        plot_width: 80,
        plot_height: 20,
    })
    .unwrap();

    assert_eq!(regression.table.residual.len(), out.split.train.len());
    assert_eq!(regression.results.len(), 4);
    let burden_cv = regression
        .results
        .iter()
        .find(|cv| cv.feature == Indicator::EnergyBurden)
        .unwrap();
    assert_eq!(burden_cv.folds.len(), 5);
    assert!(burden_cv.line.slope > 0.0);
    assert!(burden_cv.mean_rmse.is_finite());
}
