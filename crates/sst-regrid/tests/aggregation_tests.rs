//! End-to-end aggregation runs over in-memory collaborators.
//!
//! Inputs are 5 degree global grids (72x36) aggregated onto a 10 degree
//! target (36x18), so every target cell is a 2x2 block of input pixels.

use std::sync::Arc;

use sst_grid::{aggregate_grid, ArrayGrid, Grid, GridGeometry};
use sst_regrid::{
    coverage_uncertainty, Channel, DirectoryFileStore, RegridConfig, RegridError, RegriddingAggregator, Result,
    RunContext, SourceGrids, SstDepth, SynopticUncertaintyModel, TemporalResolution, TimeStep,
};
use test_utils::{
    assert_approx_eq, create_constant_grid, create_grid_with_nans, create_sparse_grid, create_sst_grid, date,
    init_tracing, regions, test_config, ConstantLutSource, MemoryClimatology, MemoryGridSource, MemoryInputs,
    VecWriter,
};

const LUT_VALUE: f64 = 500.0;

fn source_geometry() -> GridGeometry {
    GridGeometry::global(5.0).unwrap()
}

fn target_geometry() -> GridGeometry {
    GridGeometry::global(10.0).unwrap()
}

fn aggregator_with(config: RegridConfig, inputs: MemoryInputs) -> RegriddingAggregator {
    init_tracing();
    let context = RunContext::new(config, &ConstantLutSource::new(LUT_VALUE)).unwrap();
    RegriddingAggregator::new(context, Arc::new(inputs.files), Arc::new(inputs.grids))
}

fn aggregator(inputs: MemoryInputs) -> RegriddingAggregator {
    aggregator_with(test_config(10.0, regions::GLOBAL), inputs)
}

/// A file with constant SST and standard deviation.
fn file_with_sd(day: chrono::NaiveDate, sst: f64, sd: f64) -> SourceGrids {
    let geometry = source_geometry();
    SourceGrids::new(day, geometry, create_constant_grid(&geometry, sst).into_shared())
        .with_standard_deviation(create_constant_grid(&geometry, sd).into_shared())
}

// =============================================================================
// Base resolutions
// =============================================================================

#[test]
fn test_daily_run_skips_days_without_files() {
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 1, 1), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    inputs.add_measurement(date(2010, 1, 3), source_geometry(), create_constant_grid(&source_geometry(), 292.0));
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 5), TemporalResolution::Daily)
        .unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!((steps[0].start(), steps[0].end()), (date(2010, 1, 1), date(2010, 1, 2)));
    assert_eq!(steps[1].start(), date(2010, 1, 3));
    assert_eq!(steps[0].cells().len(), target_geometry().cell_count());

    let cell = steps[1].cell(20, 10).unwrap();
    assert_approx_eq!(cell.sst, 292.0, 1e-12);
    assert_eq!(cell.sample_count, 4);
    // No variance input
    assert!(cell.coverage_uncertainty.is_nan());
    assert!(cell.sst_anomaly.is_nan());
}

#[test]
fn test_block_means_of_sst_field() {
    let geometry = source_geometry();
    let field = create_sst_grid(&geometry);
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 1, 1), geometry, field.clone());
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily)
        .unwrap();
    let expected = aggregate_grid(&field, &geometry, &target_geometry(), 0.0).unwrap();
    for (x, y) in [(0, 0), (7, 3), (18, 9), (35, 17)] {
        assert_approx_eq!(steps[0].cell(x, y).unwrap().sst, expected.sample(x, y), 1e-9);
    }
    // Warm equator, cold poles
    assert!(steps[0].cell(18, 9).unwrap().sst > steps[0].cell(18, 0).unwrap().sst);
}

#[test]
fn test_daily_coverage_uncertainty_ignores_time_scale() {
    let mut inputs = MemoryInputs::new();
    inputs.add(file_with_sd(date(2010, 6, 1), 290.0, 0.5));
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 6, 1), date(2010, 6, 2), TemporalResolution::Daily)
        .unwrap();
    let target = target_geometry();
    for (x, y) in [(0, 0), (17, 9), (35, 17)] {
        let cell = steps[0].cell(x, y).unwrap();
        let expected = coverage_uncertainty(LUT_VALUE, target.cell_diagonal_km(x, y), LUT_VALUE, 0.0, 4, 0.25);
        assert_approx_eq!(cell.coverage_uncertainty, expected, 1e-9);
    }
}

#[test]
fn test_monthly_run_pools_all_files_of_the_month() {
    let mut inputs = MemoryInputs::new();
    inputs.add(file_with_sd(date(2010, 1, 1), 280.0, 0.5));
    inputs.add(file_with_sd(date(2010, 1, 31), 290.0, 0.5));
    inputs.add(file_with_sd(date(2010, 2, 1), 300.0, 0.5));
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 2, 1), TemporalResolution::Monthly)
        .unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].end(), date(2010, 2, 1));

    let cell = steps[0].cell(3, 4).unwrap();
    assert_approx_eq!(cell.sst, 285.0, 1e-12);
    assert_eq!(cell.sample_count, 8);

    let expected = coverage_uncertainty(
        LUT_VALUE,
        target_geometry().cell_diagonal_km(3, 4),
        LUT_VALUE,
        31.0,
        8,
        0.25,
    );
    assert_approx_eq!(cell.coverage_uncertainty, expected, 1e-9);
}

#[test]
fn test_weekly_windows() {
    let mut inputs = MemoryInputs::new();
    for day in [1, 4, 6, 12] {
        inputs.add_measurement(date(2010, 3, day), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    }
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 3, 1), date(2010, 3, 16), TemporalResolution::Weekly5d)
        .unwrap();
    let starts: Vec<_> = steps.iter().map(TimeStep::start).collect();
    assert_eq!(starts, vec![date(2010, 3, 1), date(2010, 3, 6), date(2010, 3, 11)]);
    assert_eq!(steps[0].cell(0, 0).unwrap().sample_count, 8);

    let steps = aggregator
        .aggregate(date(2010, 3, 1), date(2010, 3, 15), TemporalResolution::Weekly7d)
        .unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].cell(0, 0).unwrap().sample_count, 12);
}

// =============================================================================
// Composite resolutions
// =============================================================================

#[test]
fn test_seasonal_run_folds_monthly_results() {
    let geometry = source_geometry();
    let mut inputs = MemoryInputs::new();
    inputs.add(file_with_sd(date(2010, 1, 10), 281.0, 0.5));
    inputs.add(file_with_sd(date(2010, 2, 10), 284.0, 0.5));
    // March only covers the western hemisphere
    let mut march = create_constant_grid(&geometry, 290.0);
    for y in 0..geometry.height() {
        for x in geometry.width() / 2..geometry.width() {
            march.set(x, y, f64::NAN);
        }
    }
    inputs.add(
        SourceGrids::new(date(2010, 3, 10), geometry, march.into_shared())
            .with_standard_deviation(create_constant_grid(&geometry, 0.5).into_shared()),
    );
    init_tracing();
    let files = Arc::new(inputs.files);
    let context = RunContext::new(test_config(10.0, regions::GLOBAL), &ConstantLutSource::new(LUT_VALUE)).unwrap();
    let aggregator = RegriddingAggregator::new(context, files.clone(), Arc::new(inputs.grids));

    let monthly = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 4, 1), TemporalResolution::Monthly)
        .unwrap();
    assert_eq!(monthly.len(), 3);
    assert_eq!(files.queries(), 3);

    let seasonal = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 4, 1), TemporalResolution::Seasonal)
        .unwrap();
    assert_eq!(seasonal.len(), 1);
    // One file query per month of the season
    assert_eq!(files.queries(), 6);
    assert_eq!(seasonal[0].end(), date(2010, 4, 1));

    // Western cell: three months
    let west = seasonal[0].cell(5, 5).unwrap();
    assert_eq!(west.sample_count, 3);
    assert_approx_eq!(west.sst, 285.0, 1e-12);
    let squares: f64 = monthly
        .iter()
        .map(|m| m.cell(5, 5).unwrap().coverage_uncertainty.powi(2))
        .sum();
    assert_approx_eq!(west.coverage_uncertainty, squares.sqrt() / 3.0, 1e-12);

    // Eastern cell: January and February only
    let east = seasonal[0].cell(30, 5).unwrap();
    assert_eq!(east.sample_count, 2);
    assert_approx_eq!(east.sst, 282.5, 1e-12);
}

#[test]
fn test_composite_without_data_yields_nothing() {
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 5, 1), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2011, 1, 1), TemporalResolution::Seasonal)
        .unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].start(), date(2010, 4, 1));
    assert_eq!(steps[0].cell(0, 0).unwrap().sample_count, 1);

    let annual = aggregator
        .aggregate(date(2011, 1, 1), date(2012, 1, 1), TemporalResolution::Annual)
        .unwrap();
    assert!(annual.is_empty());
}

// =============================================================================
// Filtering
// =============================================================================

#[test]
fn test_failing_files_are_skipped() {
    let mut inputs = MemoryInputs::new();
    inputs.add_failing(date(2010, 1, 1));
    inputs.add_measurement(date(2010, 1, 1), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    inputs.add_failing(date(2010, 1, 2));
    // Wrong resolution: 3 degrees does not divide 10 degrees
    let odd = GridGeometry::global(3.0).unwrap();
    inputs.add_measurement(date(2010, 1, 3), odd, create_constant_grid(&odd, 290.0));
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 4), TemporalResolution::Daily)
        .unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].cell(0, 0).unwrap().sample_count, 4);
}

#[test]
fn test_region_mask_restricts_cells() {
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 1, 1), source_geometry(), create_constant_grid(&source_geometry(), 300.0));
    let aggregator = aggregator_with(test_config(10.0, regions::PACIFIC), inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily)
        .unwrap();
    let cells = steps[0].cells();
    // Centers at 175E / 175W and 5N / 5S
    assert_eq!(cells.len(), 4);
    for (x, y) in [(0, 8), (0, 9), (35, 8), (35, 9)] {
        assert!(cells.get(x, y).is_some(), "cell ({}, {}) missing", x, y);
    }
    assert!(steps[0].channel(Channel::Sst).sample(18, 8).is_nan());
}

#[test]
fn test_min_coverage_threshold() {
    let geometry = source_geometry();
    let mut inputs = MemoryInputs::new();
    // Block (0, 0) keeps 1 of 4 pixels, block (1, 0) keeps 3 of 4
    let grid = create_grid_with_nans(&geometry, 290.0, &[(0, 0), (1, 0), (0, 1), (2, 0)]);
    inputs.add_measurement(date(2010, 1, 1), geometry, grid);
    let mut config = test_config(10.0, regions::GLOBAL);
    config.min_coverage = 0.5;
    let aggregator = aggregator_with(config, inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily)
        .unwrap();
    assert!(steps[0].cell(0, 0).is_none());
    assert_eq!(steps[0].cell(1, 0).unwrap().sample_count, 3);
}

#[test]
fn test_quality_and_uncertainty_channels() {
    let geometry = source_geometry();
    let mut quality = create_constant_grid(&geometry, 5.0);
    quality.set(0, 0, 2.0);
    let grids = SourceGrids::new(date(2010, 1, 1), geometry, create_constant_grid(&geometry, 290.0).into_shared())
        .with_quality(quality.into_shared())
        .with_uncertainty(create_constant_grid(&geometry, 0.4).into_shared());
    let mut inputs = MemoryInputs::new();
    inputs.add(grids);

    let mut config = test_config(10.0, regions::GLOBAL);
    config.product.min_quality = Some(3);
    let aggregator = aggregator_with(config, inputs);

    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily)
        .unwrap();
    assert_eq!(steps[0].cell(0, 0).unwrap().sample_count, 3);

    let full = steps[0].cell(1, 0).unwrap();
    assert_eq!(full.sample_count, 4);
    // sqrt(4 * 0.4^2) / 4
    assert_approx_eq!(full.random_uncertainty, 0.2, 1e-12);
}

#[test]
fn test_climatology_anomaly_and_sea_weights() {
    let geometry = source_geometry();
    let mut inputs = MemoryInputs::new();
    let mut sst = create_constant_grid(&geometry, 290.0);
    sst.set(1, 1, 294.0);
    inputs.add_measurement(date(2010, 7, 1), geometry, sst);

    let mut climatology = MemoryClimatology::constant(&geometry, 288.0, 1.0)
        .with_standard_deviation(create_constant_grid(&geometry, 1.0));
    let mut sea = create_constant_grid(&geometry, 1.0);
    sea.set(0, 0, 0.0);
    sea.set(1, 1, 2.0);
    climatology.sea_coverage = sea.into_shared();

    let aggregator = aggregator(inputs).with_climatology(Arc::new(climatology));
    let steps = aggregator
        .aggregate(date(2010, 7, 1), date(2010, 7, 2), TemporalResolution::Daily)
        .unwrap();

    // Land pixel (0, 0) is excluded; (1, 1) counts twice
    let cell = steps[0].cell(0, 0).unwrap();
    assert_eq!(cell.sample_count, 3);
    let expected = (290.0 + 290.0 + 2.0 * 294.0) / 4.0;
    assert_approx_eq!(cell.sst, expected, 1e-12);
    assert_approx_eq!(cell.sst_anomaly, expected - 288.0, 1e-12);
    assert!(!cell.coverage_uncertainty.is_nan());
}

#[test]
fn test_invalid_region_list_is_configuration_error() {
    let result = RunContext::new(test_config(10.0, regions::INVALID), &ConstantLutSource::new(LUT_VALUE));
    match result {
        Err(RegridError::Configuration { parameter, reason }) => {
            assert_eq!(parameter, "regions");
            assert!(reason.contains("entry 1"), "{}", reason);
        }
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_climatology_size_mismatch_is_fatal() {
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 7, 1), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    let climatology = MemoryClimatology::constant(&target_geometry(), 288.0, 1.0);
    let aggregator = aggregator(inputs).with_climatology(Arc::new(climatology));

    let result = aggregator.aggregate(date(2010, 7, 1), date(2010, 7, 2), TemporalResolution::Daily);
    match result {
        Err(RegridError::Configuration { parameter, .. }) => assert_eq!(parameter, "climatology"),
        other => panic!("expected configuration error, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let geometry = source_geometry();
    let build = |parallel: bool| {
        let mut inputs = MemoryInputs::new();
        inputs.add_measurement(date(2010, 1, 1), geometry, create_sparse_grid(&geometry, 291.0, 0.3, 7));
        inputs.add_measurement(date(2010, 1, 2), geometry, create_sparse_grid(&geometry, 287.0, 0.6, 8));
        let mut config = test_config(10.0, regions::TWO_BOXES);
        config.parallel = parallel;
        aggregator_with(config, inputs)
            .aggregate(date(2010, 1, 1), date(2010, 2, 1), TemporalResolution::Monthly)
            .unwrap()
    };

    let parallel = build(true);
    let sequential = build(false);
    assert_eq!(parallel.len(), 1);
    let (a, b) = (parallel[0].cells(), sequential[0].cells());
    assert_eq!(a.len(), b.len());
    for (left, right) in a.iter().zip(b.iter()) {
        assert_eq!((left.x, left.y, left.sample_count), (right.x, right.y, right.sample_count));
        assert_approx_eq!(left.sst, right.sst, 1e-12);
    }
}

// =============================================================================
// Streaming, cancellation and file discovery
// =============================================================================

#[test]
fn test_writer_failure_does_not_abort_run() {
    let mut inputs = MemoryInputs::new();
    for day in 1..=3 {
        inputs.add_measurement(date(2010, 1, day), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    }
    let aggregator = aggregator(inputs);
    let mut writer = VecWriter::failing_on(&[date(2010, 1, 2)]);

    let produced = aggregator
        .aggregate_into(date(2010, 1, 1), date(2010, 1, 4), TemporalResolution::Daily, &mut writer)
        .unwrap();
    assert_eq!(produced, 3);
    assert_eq!(writer.attempts, 3);
    let written: Vec<_> = writer.steps.iter().map(TimeStep::start).collect();
    assert_eq!(written, vec![date(2010, 1, 1), date(2010, 1, 3)]);
}

#[test]
fn test_cancellation_between_windows() {
    let mut inputs = MemoryInputs::new();
    for day in 1..=5 {
        inputs.add_measurement(date(2010, 1, day), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    }
    let aggregator = aggregator(inputs);
    let token = aggregator.context().cancellation_token().clone();

    let mut written = Vec::new();
    let mut writer = |step: &TimeStep| -> Result<()> {
        written.push(step.start());
        token.cancel();
        Ok(())
    };
    let result = aggregator.aggregate_into(date(2010, 1, 1), date(2010, 1, 6), TemporalResolution::Daily, &mut writer);
    assert!(matches!(result, Err(RegridError::Cancelled)));
    assert_eq!(written, vec![date(2010, 1, 1)]);

    // The token stays cancelled
    assert!(matches!(
        aggregator.aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily),
        Err(RegridError::Cancelled)
    ));
}

#[test]
fn test_directory_file_store_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let geometry = source_geometry();
    let mut grids = MemoryGridSource::default();
    for (day, sst) in [(1, 280.0), (2, 282.0), (20, 290.0)] {
        let path = dir.path().join(format!("201002{:02}120000-ESACCI-L3U-SST.nc", day));
        std::fs::write(&path, b"").unwrap();
        grids.insert(
            path.clone(),
            SourceGrids::new(date(2010, 2, day), geometry, create_constant_grid(&geometry, sst).into_shared()),
        );
    }
    std::fs::write(dir.path().join("README.txt"), b"").unwrap();

    let store = DirectoryFileStore::scan(&[dir.path().to_path_buf()], ".nc").unwrap();
    assert_eq!(store.len(), 3);

    init_tracing();
    let context = RunContext::new(test_config(10.0, regions::GLOBAL), &ConstantLutSource::new(LUT_VALUE)).unwrap();
    let aggregator = RegriddingAggregator::new(context, Arc::new(store), Arc::new(grids));

    let steps = aggregator
        .aggregate(date(2010, 2, 1), date(2010, 3, 1), TemporalResolution::Monthly)
        .unwrap();
    let cell = steps[0].cell(12, 12).unwrap();
    assert_eq!(cell.sample_count, 12);
    assert_approx_eq!(cell.sst, 284.0, 1e-12);
}

#[test]
fn test_scaled_export_of_time_step() {
    let mut inputs = MemoryInputs::new();
    inputs.add_measurement(date(2010, 1, 1), source_geometry(), create_constant_grid(&source_geometry(), 290.0));
    let aggregator = aggregator_with(test_config(10.0, regions::NORTH), inputs);
    let steps = aggregator
        .aggregate(date(2010, 1, 1), date(2010, 1, 2), TemporalResolution::Daily)
        .unwrap();

    let packed = steps[0]
        .to_scaled::<i16>(Channel::Sst, 0.01, 273.15, Some(i16::MIN))
        .unwrap();
    assert_eq!(packed.raw(0, 0), 1685);
    // Southern hemisphere is outside the region
    assert_eq!(packed.raw(0, 17), i16::MIN);
    assert_approx_eq!(packed.sample(3, 3), 290.0, 0.005);

    let sst = ArrayGrid::from_grid(&steps[0].channel(Channel::Sst));
    assert_eq!(sst.valid_count(), target_geometry().cell_count() / 2);
}

// =============================================================================
// Correlated uncertainties, sea ice and total uncertainty
// =============================================================================

#[test]
fn test_correlated_uncertainties_and_synoptic_reduction() {
    let geometry = source_geometry();
    let grids = SourceGrids::new(date(2010, 8, 1), geometry, create_constant_grid(&geometry, 295.0).into_shared())
        .with_uncertainty(create_constant_grid(&geometry, 0.4).into_shared())
        .with_large_scale_uncertainty(create_constant_grid(&geometry, 0.15).into_shared())
        .with_adjustment_uncertainty(create_constant_grid(&geometry, 0.2).into_shared())
        .with_synoptic_uncertainty(create_constant_grid(&geometry, 0.6).into_shared());
    let mut inputs = MemoryInputs::new();
    inputs.add(grids);
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 8, 1), date(2010, 8, 2), TemporalResolution::Daily)
        .unwrap();
    let synoptic_model = SynopticUncertaintyModel::new(10.0, TemporalResolution::Daily);

    for y in [0, 9, 17] {
        let cell = steps[0].cell(4, y).unwrap();
        assert_approx_eq!(cell.large_scale_uncertainty, 0.15, 1e-12);
        // Four equal pixels combine to u / 2, then shrink by the effective sample count
        let eta = synoptic_model.effective_samples(y, 4);
        assert_approx_eq!(cell.adjustment_uncertainty, 0.1 / eta, 1e-12);
        assert_approx_eq!(cell.synoptic_uncertainty, 0.3 / eta, 1e-12);
        assert!(cell.synoptic_uncertainty < 0.3);

        let total = (0.2f64.powi(2)
            + cell.adjustment_uncertainty.powi(2)
            + cell.large_scale_uncertainty.powi(2)
            + cell.synoptic_uncertainty.powi(2))
        .sqrt();
        assert_approx_eq!(cell.total_uncertainty, total, 1e-12);
    }
}

#[test]
fn test_sea_ice_fraction_includes_pixels_without_sst() {
    let geometry = source_geometry();
    // Pixel (0, 0) is ice covered with no SST retrieval
    let sst = create_grid_with_nans(&geometry, 271.5, &[(0, 0)]);
    let mut ice = create_constant_grid(&geometry, 0.0);
    ice.set(0, 0, 1.0);
    ice.set(1, 0, 0.5);
    let mut inputs = MemoryInputs::new();
    inputs.add(
        SourceGrids::new(date(2010, 2, 1), geometry, sst.into_shared()).with_sea_ice_fraction(ice.into_shared()),
    );
    let aggregator = aggregator(inputs);

    let steps = aggregator
        .aggregate(date(2010, 2, 1), date(2010, 2, 2), TemporalResolution::Daily)
        .unwrap();
    let cell = steps[0].cell(0, 0).unwrap();
    assert_eq!(cell.sample_count, 3);
    assert_approx_eq!(cell.sea_ice_fraction, 0.375, 1e-12);
    assert_approx_eq!(steps[0].cell(5, 5).unwrap().sea_ice_fraction, 0.0, 1e-12);
    assert!(steps[0].channel(Channel::SeaIceFraction).sample(0, 0) > 0.0);
}

#[test]
fn test_max_total_uncertainty_drops_cells() {
    let geometry = source_geometry();
    // Western hemisphere 0.4 per pixel, eastern 1.0
    let mut uncertainty = create_constant_grid(&geometry, 0.4);
    for y in 0..geometry.height() {
        for x in geometry.width() / 2..geometry.width() {
            uncertainty.set(x, y, 1.0);
        }
    }
    let build = |max_total_uncertainty: f64| {
        let mut inputs = MemoryInputs::new();
        inputs.add(
            SourceGrids::new(date(2010, 9, 1), geometry, create_constant_grid(&geometry, 293.0).into_shared())
                .with_uncertainty(uncertainty.clone().into_shared()),
        );
        let mut config = test_config(10.0, regions::GLOBAL);
        config.max_total_uncertainty = max_total_uncertainty;
        aggregator_with(config, inputs)
            .aggregate(date(2010, 9, 1), date(2010, 9, 2), TemporalResolution::Daily)
            .unwrap()
    };

    let unfiltered = build(0.0);
    assert_eq!(unfiltered[0].cells().len(), target_geometry().cell_count());
    assert_approx_eq!(unfiltered[0].cell(30, 4).unwrap().total_uncertainty, 0.5, 1e-12);

    let filtered = build(0.3);
    let west = filtered[0].cell(3, 4).unwrap();
    assert_approx_eq!(west.total_uncertainty, 0.2, 1e-12);
    assert!(filtered[0].cell(30, 4).is_none());
    assert_eq!(filtered[0].cells().len(), target_geometry().cell_count() / 2);
    assert!(filtered[0].channel(Channel::Sst).sample(30, 4).is_nan());
    assert!(filtered[0].channel(Channel::SampleCount).sample(30, 4).is_nan());
}

#[test]
fn test_depth_and_total_only_outputs() {
    let mut inputs = MemoryInputs::new();
    inputs.add(file_with_sd(date(2010, 3, 1), 289.0, 0.5));
    inputs.add(file_with_sd(date(2010, 3, 2), 289.0, 0.5));

    let mut config = test_config(10.0, regions::GLOBAL);
    config.sst_depth = SstDepth::Depth20;
    config.total_uncertainty = true;
    init_tracing();
    let grids = Arc::new(inputs.grids);
    let context = RunContext::new(config, &ConstantLutSource::new(LUT_VALUE)).unwrap();
    let aggregator = RegriddingAggregator::new(context, Arc::new(inputs.files), grids.clone());

    let steps = aggregator
        .aggregate(date(2010, 3, 1), date(2010, 3, 3), TemporalResolution::Daily)
        .unwrap();
    assert_eq!(grids.requested_depths(), vec![SstDepth::Depth20, SstDepth::Depth20]);

    let step = &steps[0];
    assert_eq!(step.sst_depth(), SstDepth::Depth20);
    assert_eq!(step.output_channels(), vec![Channel::TotalUncertainty]);
    assert_eq!(step.variable_name(Channel::Sst), "sst_depth_20");

    // Only the coverage component is present
    let cell = step.cell(2, 2).unwrap();
    assert!(!cell.coverage_uncertainty.is_nan());
    assert_approx_eq!(cell.total_uncertainty, cell.coverage_uncertainty, 1e-12);
}
