//! End-to-end pipeline test on a synthetic Svalbard-like scene.
//!
//! The reference DEM is a south-facing ramp; glaciers are vertical strips
//! crossing the full elevation range. Surging glaciers carry an elevation
//! change that decays with altitude, quiet glaciers none.

use approx::assert_relative_eq;
use geo_types::{polygon, MultiPolygon};
use ndarray::Array2;
use surgine::io::cache::CacheKey;
use surgine::io::outlines;
use surgine::{
    ArtifactCache, DemRaster, ElevationPoint, EnsembleConfig, GeoTransform, GlacierOutline,
    OutlineStore, PipelineConfig, SurgeLabel, SurgePipeline, TrainingRecord,
};

const CORRECTION: f64 = 31.55;
const YEARS: [(i32, i64); 2] = [(2020, 20200315), (2021, 20210315)];

/// 200x250 ramp DEM: cell value = row * 5 m, 100 m cells, origin (0, 20000).
fn ramp_dem() -> DemRaster {
    let data = Array2::from_shape_fn((200, 250), |(row, _)| row as f32 * 5.0);
    let transform = GeoTransform {
        top_left_x: 0.0,
        pixel_width: 100.0,
        rotation_x: 0.0,
        top_left_y: 20_000.0,
        rotation_y: 0.0,
        pixel_height: -100.0,
    };
    DemRaster::from_grid(data, transform, -9999.0)
}

fn strip_outline(id: &str, name: &str, x0: f64, width: f64, height: f64) -> GlacierOutline {
    let geometry = MultiPolygon(vec![polygon![
        (x: x0, y: 0.0),
        (x: x0 + width, y: 0.0),
        (x: x0 + width, y: height),
        (x: x0, y: height),
        (x: x0, y: 0.0),
    ]]);
    GlacierOutline {
        id: id.to_string(),
        name: Some(name.to_string()),
        area_km2: width * height / 1e6,
        geometry,
    }
}

/// Points along a strip at cell centers; the DEM elevation at point `j` is
/// exactly `15 * j` m.
fn strip_points(x0: f64, n: usize, dh: impl Fn(f64) -> f64) -> Vec<ElevationPoint> {
    let mut points = Vec::new();
    for (_, date_int) in YEARS {
        for j in 0..n {
            let elevation = 15.0 * j as f64;
            points.push(ElevationPoint {
                easting: x0 + 1000.0,
                northing: 19_950.0 - 300.0 * j as f64,
                h: elevation + CORRECTION + dh(elevation),
                date: None,
                date_int: Some(date_int),
                year_int: Some((date_int / 10_000) as i32),
            });
        }
    }
    points
}

fn surge_dh(elevation: f64) -> f64 {
    20.0 - 0.02 * elevation
}

fn quiet_dh(_elevation: f64) -> f64 {
    0.0
}

struct Scene {
    pipeline: SurgePipeline,
    points: Vec<ElevationPoint>,
    glacier_ids: Vec<String>,
    training: Vec<TrainingRecord>,
}

fn build_scene(cache_root: &std::path::Path) -> Scene {
    let cache = ArtifactCache::new(cache_root).unwrap();

    let mut points = Vec::new();
    let mut glacier_ids = Vec::new();
    let mut training = Vec::new();
    let mut outline_list = Vec::new();

    // ten full strips: 0-3 surging training, 4-7 quiet training,
    // 8 surging inference, 9 quiet inference
    for k in 0..10usize {
        let id = format!("G-STRIP-{:02}", k);
        let x0 = k as f64 * 2000.0;
        outline_list.push(strip_outline(&id, &format!("Testbreen {}", k), x0, 2000.0, 20_000.0));

        let surging = k < 4 || k == 8;
        points.extend(strip_points(
            x0,
            60,
            if surging { surge_dh } else { quiet_dh },
        ));
        if k < 8 {
            for (year, _) in YEARS {
                training.push(TrainingRecord {
                    glacier_id: id.clone(),
                    year,
                    surging,
                });
            }
        }
        glacier_ids.push(id);
    }

    // strip 10: too few points per year
    outline_list.push(strip_outline(
        "G-SPARSE",
        "Sparsebreen",
        20_000.0,
        2000.0,
        20_000.0,
    ));
    points.extend(strip_points(20_000.0, 4, quiet_dh));
    glacier_ids.push("G-SPARSE".to_string());

    // glacier 11: below the area threshold
    outline_list.push(strip_outline("G-TINY", "Tinybreen", 23_000.0, 500.0, 500.0));
    glacier_ids.push("G-TINY".to_string());

    // pre-populate the outline cache so no vector file is needed
    for outline in &outline_list {
        let key = CacheKey::stage("outline").with_glacier(&outline.id);
        outlines::write_outline(cache.path(&key), outline).unwrap();
    }

    let config = PipelineConfig {
        ensemble: EnsembleConfig {
            runs: 5,
            trees: 30,
            max_depth: 20,
            min_samples_split: 2,
            base_seed: 7,
        },
        ..PipelineConfig::default()
    };
    let store = OutlineStore::new(cache_root.join("unused-inventory.gpkg"), "glims_id", None);
    let pipeline = SurgePipeline::with_components(config, cache, ramp_dem(), store).unwrap();

    Scene {
        pipeline,
        points,
        glacier_ids,
        training,
    }
}

#[test]
fn test_end_to_end_classification() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let scene = build_scene(dir.path());

    let records = scene
        .pipeline
        .run(&scene.points, &scene.glacier_ids, &scene.training)
        .unwrap();

    // one row per glacier-year
    assert_eq!(records.len(), 12 * YEARS.len());

    for record in &records {
        match record.glacier_id.as_str() {
            "G-STRIP-08" => {
                assert_eq!(record.label, SurgeLabel::Surging);
                assert!(record.probability.unwrap() > 0.5);
                assert_eq!(record.run_votes.len(), 5);
            }
            "G-STRIP-09" => {
                assert_eq!(record.label, SurgeLabel::NotSurging);
            }
            "G-SPARSE" => {
                assert_eq!(record.label, SurgeLabel::Unclassified);
                assert!(record
                    .reason
                    .as_deref()
                    .unwrap()
                    .contains("too few valid points"));
            }
            "G-TINY" => {
                assert_eq!(record.label, SurgeLabel::Unclassified);
                assert!(record.reason.as_deref().unwrap().contains("below threshold"));
            }
            _ => {
                assert_eq!(record.label, SurgeLabel::Training);
            }
        }
    }
}

#[test]
fn test_feature_values_on_synthetic_signal() {
    let dir = tempfile::tempdir().unwrap();
    let scene = build_scene(dir.path());

    let records = scene
        .pipeline
        .run(&scene.points, &scene.glacier_ids, &scene.training)
        .unwrap();

    let surge = records
        .iter()
        .find(|r| r.glacier_id == "G-STRIP-08" && r.year == 2020)
        .unwrap();
    // dh = 20 - 0.02 * elevation by construction
    assert_relative_eq!(surge.features.slope.unwrap(), -0.02, epsilon = 1e-6);
    assert_relative_eq!(surge.features.intercept.unwrap(), 20.0, epsilon = 1e-4);
    assert!(surge.features.max_dh.unwrap() > 10.0);
    assert_eq!(surge.n_points, 60);

    let quiet = records
        .iter()
        .find(|r| r.glacier_id == "G-STRIP-09" && r.year == 2020)
        .unwrap();
    // constant zero change: flat fit, max-dh at zero
    assert_relative_eq!(quiet.features.slope.unwrap(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(quiet.features.max_dh.unwrap(), 0.0, epsilon = 1e-9);
}

#[test]
fn test_rerun_resumes_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let scene = build_scene(dir.path());

    let first = scene
        .pipeline
        .run(&scene.points, &scene.glacier_ids, &scene.training)
        .unwrap();

    // second run over the same cache must reproduce the features exactly
    let second = scene
        .pipeline
        .run(&scene.points, &scene.glacier_ids, &scene.training)
        .unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.key(), b.key());
        assert_eq!(a.features, b.features);
        assert_eq!(a.run_votes, b.run_votes);
    }
}
