//! End-to-end checks of the temporal SVD engine on synthetic fields with
//! known structure.

use chrono::{Duration, NaiveDate};
use matengine_algorithms::temporal::{
    analyze_field, assess_field_dates, build_matrix, decompose, group_by_field,
    residuals_at_rank,
};
use matengine_core::io::read_observations;
use matengine_core::{
    BaselineSource, EngineConfig, Error, MatrixConfig, MatrixLayout, NumericalWarning,
    RankMode, StressLabel, TemporalObservation, TrendLabel, VegetationIndex,
};
use std::f64::consts::PI;
use std::path::PathBuf;

const DATES: usize = 12;
const PIXELS: usize = 8;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + Duration::days(5 * i as i64)
}

/// Seasonal NDVI cycle with per-pixel amplitude; `shift` is added to every
/// pixel of date `at`.
fn seasonal_field(shift: f64, at: usize) -> Vec<TemporalObservation> {
    (0..DATES)
        .map(|t| {
            let f = 0.5 + 0.3 * (2.0 * PI * t as f64 / DATES as f64).sin();
            let pixels = (0..PIXELS)
                .map(|j| f * (0.6 + 0.1 * j as f64) + if t == at { shift } else { 0.0 })
                .collect();
            TemporalObservation::new("plot-7", day(t)).with_pixels(VegetationIndex::Ndvi, pixels)
        })
        .collect()
}

fn pixel_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.matrix.layout = MatrixLayout::Pixels;
    config
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn periodic_field_is_rank_one_with_vanishing_residuals() {
    let obs = seasonal_field(0.0, 0);
    let a = analyze_field("plot-7", &obs, &[], &pixel_config()).unwrap();

    assert_eq!(a.chosen_rank, 1);
    assert!((a.explained_variance[0] - 1.0).abs() < 1e-9);
    assert!(
        a.residual_profile.iter().all(|&r| r < 1e-9),
        "rank-1 field should reconstruct exactly: {:?}",
        a.residual_profile
    );
    assert_eq!(a.stress_label, StressLabel::Healthy);
}

#[test]
fn latest_date_outlier_is_severe() {
    let obs = seasonal_field(0.5, DATES - 1);
    let a = analyze_field("plot-7", &obs, &[], &pixel_config()).unwrap();

    assert_eq!(a.chosen_rank, 1);
    assert!((a.explained_variance[0] - 0.9826).abs() < 1e-3, "{:?}", a.explained_variance);
    let latest = *a.residual_profile.last().unwrap();
    assert!((latest - 0.08921).abs() < 1e-4, "latest residual {}", latest);
    assert!(a.residual_profile[..DATES - 1].iter().all(|&r| r < latest / 3.0));

    assert_eq!(a.baseline, BaselineSource::Profile);
    assert!((a.z_score - 9.798).abs() < 0.01, "z = {}", a.z_score);
    assert_eq!(a.stress_label, StressLabel::Severe);
    assert_eq!(a.confidence, 1.0);
    assert_eq!(a.health_score, 0.0);
    assert_eq!(a.date, day(DATES - 1));
}

#[test]
fn mid_season_outlier_stands_out() {
    let at = 5;
    let obs = seasonal_field(0.5, at);
    let dates = assess_field_dates("plot-7", &obs, &[], &pixel_config()).unwrap();
    assert_eq!(dates.len(), DATES);
    assert_eq!(dates[at].date, day(at));
    assert_ne!(dates[at].label, StressLabel::Healthy);

    let a = analyze_field("plot-7", &obs, &[], &pixel_config()).unwrap();
    let outlier = a.residual_profile[at];
    let others: Vec<f64> = a
        .residual_profile
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != at)
        .map(|(_, &r)| r)
        .collect();
    let n = others.len() as f64;
    let mean = others.iter().sum::<f64>() / n;
    let std = (others.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    assert!(
        outlier > mean + 2.0 * std,
        "residual {} vs mean {} std {}",
        outlier,
        mean,
        std
    );
}

#[test]
fn infinite_index_value_is_numerical_instability() {
    let obs: Vec<_> = [0.3, f64::INFINITY, 0.5, 0.6]
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            TemporalObservation::new("plot-9", day(i)).with_index(VegetationIndex::Ndvi, v)
        })
        .collect();
    let err = analyze_field("plot-9", &obs, &[], &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, Error::NumericalInstability(_)), "{:?}", err);
}

#[test]
fn decomposition_properties_hold_across_shapes() {
    for (dates, pixels) in [(4, 10), (10, 4), (6, 6), (12, 3)] {
        let obs: Vec<_> = (0..dates)
            .map(|t| {
                let px = (0..pixels)
                    .map(|j| ((t * 31 + j * 17) % 23) as f64 / 23.0)
                    .collect();
                TemporalObservation::new("grid", day(t)).with_pixels(VegetationIndex::Ndre, px)
            })
            .collect();
        let config = MatrixConfig {
            index: VegetationIndex::Ndre.into(),
            layout: MatrixLayout::Pixels,
            ..Default::default()
        };
        let m = build_matrix("grid", &obs, &config).unwrap();
        let d = decompose(&m, &Default::default()).unwrap();

        let sv = d.singular_values();
        assert!(sv.iter().all(|&s| s >= 0.0));
        assert!(sv.windows(2).all(|w| w[0] >= w[1]));
        let ev_sum: f64 = d.explained_variance().iter().sum();
        assert!((ev_sum - 1.0).abs() < 1e-12, "{}x{}: sum {}", dates, pixels, ev_sum);

        let mut previous: Option<Vec<f64>> = None;
        for k in 1..=d.modes() {
            let r = residuals_at_rank(&m, &d, k).unwrap();
            if let Some(prev) = &previous {
                assert!(r.iter().zip(prev).all(|(now, before)| *now <= before + 1e-12));
            }
            previous = Some(r);
        }
        let full = previous.unwrap();
        assert!(full.iter().all(|&r| r < 1e-9), "{}x{}: {:?}", dates, pixels, full);
    }
}

#[test]
fn analysis_is_deterministic_and_order_independent() {
    let obs = seasonal_field(0.3, 7);
    let config = pixel_config();
    let first = analyze_field("plot-7", &obs, &[], &config).unwrap();
    let again = analyze_field("plot-7", &obs, &[], &config).unwrap();
    assert_eq!(first, again);

    let mut shuffled = obs.clone();
    shuffled.reverse();
    shuffled.swap(2, 9);
    let reordered = analyze_field("plot-7", &shuffled, &[], &config).unwrap();
    assert_eq!(first, reordered);
}

#[test]
fn too_few_dates_is_insufficient_data() {
    let obs = seasonal_field(0.0, 0);
    let err = analyze_field("plot-7", &obs[..1], &[], &pixel_config()).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn explicit_rank_overrides_auto() {
    let obs = seasonal_field(0.5, DATES - 1);
    let mut config = pixel_config();
    config.rank.rank_mode = RankMode::Explicit(2);
    let a = analyze_field("plot-7", &obs, &[], &config).unwrap();
    assert_eq!(a.chosen_rank, 2);
    assert_eq!(a.requested_rank, Some(2));
    // Two modes carry all the energy of this field
    assert!(a.residual_profile.iter().all(|&r| r < 1e-9));
    assert!(a
        .warnings
        .contains(&NumericalWarning::FullRankReconstruction { rank: 2 }));
}

#[test]
fn fixture_fields() {
    let observations = read_observations(fixture("observations.json")).unwrap();
    let fields = group_by_field(observations);
    assert_eq!(fields.len(), 2);

    let mut config = EngineConfig::default();
    config.matrix.index = vec![VegetationIndex::Ndvi, VegetationIndex::Ndre].into();

    let north = analyze_field("north-12", &fields["north-12"], &[], &config).unwrap();
    assert_eq!(north.dates.len(), 10, "cloudy duplicate should be resolved");
    assert_eq!(north.chosen_rank, 1);
    assert!((north.explained_variance[0] - 0.98989).abs() < 1e-4);
    assert!((north.residual_profile[9] - 0.03253).abs() < 1e-4);
    assert!((north.z_score - 5.8765).abs() < 0.01, "z = {}", north.z_score);
    assert_eq!(north.stress_label, StressLabel::Severe);
    assert_eq!(north.trend.as_ref().map(|t| t.label), Some(TrendLabel::Declining));
    assert_eq!(north.primary_mode.len(), 2);

    let south = analyze_field("south-03", &fields["south-03"], &[], &config).unwrap_err();
    assert!(matches!(south, Error::InsufficientData { .. }));
}

#[test]
fn single_index_six_dates_is_healthy_full_rank() {
    let values = [0.3, 0.45, 0.6, 0.65, 0.40, 0.62];
    let obs: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            TemporalObservation::new("demo", day(i)).with_index(VegetationIndex::Ndvi, v)
        })
        .collect();
    let a = analyze_field("demo", &obs, &[], &EngineConfig::default()).unwrap();

    assert_eq!(a.chosen_rank, 1);
    assert_eq!(a.singular_values.len(), 1);
    assert_eq!(a.explained_variance, vec![1.0]);
    assert!(a.residual_profile.iter().all(|&r| r < 1e-12));
    assert!(a
        .warnings
        .contains(&NumericalWarning::FullRankReconstruction { rank: 1 }));
    assert_eq!(a.stress_label, StressLabel::Healthy);
    assert_eq!(a.date, day(5));
    assert_eq!(a.temporal_signature, values.to_vec());
}
