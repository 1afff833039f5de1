//! Temporal matrix builder
//!
//! Turns the observations of one field into a dense date-by-feature matrix:
//!
//! 1. Observations above `max_cloud_fraction` are dropped.
//! 2. Duplicate dates are resolved: the lower effective cloud fraction wins,
//!    ties go to the higher `ingest_seq`, then to the later input position.
//! 3. Rows are the distinct dates in chronological order.
//! 4. Columns are one per selected index (`indices` layout) or one per
//!    pixel of each selected index (`pixels` layout, index-major).
//! 5. Missing cells (absent or NaN) take the observed mean of their column.
//!    Columns never observed are dropped.
//!
//! Infinite values are kept as they are so the decomposition can reject
//! them instead of having them averaged away.

use crate::maybe_rayon::*;
use chrono::NaiveDate;
use matengine_core::{
    Algorithm, BuildDiagnostics, CadenceGap, ColumnLabel, Error, MatrixConfig, MatrixLayout,
    Result, TemporalMatrix, TemporalObservation, VegetationIndex,
};
use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::debug;

/// Observations of a single field, ready to become a matrix.
#[derive(Debug, Clone)]
pub struct FieldObservations {
    pub field_id: String,
    pub observations: Vec<TemporalObservation>,
}

/// Matrix builder stage
#[derive(Debug, Clone, Default)]
pub struct MatrixBuilder;

impl Algorithm for MatrixBuilder {
    type Input = FieldObservations;
    type Output = TemporalMatrix;
    type Params = MatrixConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MatrixBuilder"
    }

    fn description(&self) -> &'static str {
        "Build the date-by-feature matrix of one field from its observations"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        build_matrix(&input.field_id, &input.observations, &params)
    }
}

/// Split a mixed observation stream by field id.
///
/// Fields come out sorted by id; each keeps its observations in ingestion
/// order.
pub fn group_by_field(
    observations: impl IntoIterator<Item = TemporalObservation>,
) -> BTreeMap<String, Vec<TemporalObservation>> {
    let mut groups: BTreeMap<String, Vec<TemporalObservation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.field_id().to_string()).or_default().push(obs);
    }
    groups
}

/// Build the temporal matrix of `field_id`.
///
/// # Errors
/// - [`Error::InvalidParameter`] for an invalid config or an observation
///   belonging to another field
/// - [`Error::InsufficientData`] for fewer than two distinct dates or no
///   observed column
/// - [`Error::SizeMismatch`] when pixel vectors of one index differ in length
pub fn build_matrix(
    field_id: &str,
    observations: &[TemporalObservation],
    config: &MatrixConfig,
) -> Result<TemporalMatrix> {
    config.validate()?;

    if let Some(other) = observations.iter().find(|o| o.field_id() != field_id) {
        return Err(Error::invalid(
            "field_id",
            other.field_id(),
            format!("observation does not belong to field '{}'", field_id),
        ));
    }

    let mut diagnostics = BuildDiagnostics {
        observations: observations.len(),
        ..Default::default()
    };

    // Cloud filter
    let kept: Vec<(usize, &TemporalObservation)> = observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| match config.max_cloud_fraction {
            Some(max) => obs.effective_cloud_fraction() <= max,
            None => true,
        })
        .collect();
    diagnostics.cloud_filtered = observations.len() - kept.len();

    // One observation per date
    let mut by_date: BTreeMap<NaiveDate, (usize, &TemporalObservation)> = BTreeMap::new();
    for (pos, obs) in kept {
        match by_date.get(&obs.date()) {
            Some(&(best_pos, best)) => {
                diagnostics.duplicates_resolved += 1;
                if supersedes((pos, obs), (best_pos, best)) {
                    by_date.insert(obs.date(), (pos, obs));
                }
            }
            None => {
                by_date.insert(obs.date(), (pos, obs));
            }
        }
    }

    let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
    let winners: Vec<&TemporalObservation> = by_date.values().map(|&(_, obs)| obs).collect();

    if dates.len() < 2 {
        return Err(Error::InsufficientData {
            field_id: field_id.to_string(),
            reason: format!(
                "{} distinct date(s) after filtering {} observation(s), at least 2 are required",
                dates.len(),
                observations.len()
            ),
        });
    }

    let indices = config.index.selected();
    let (labels, raw) = match config.layout {
        MatrixLayout::Indices => index_columns(&winners, &indices),
        MatrixLayout::Pixels => pixel_columns(&winners, &indices)?,
    };

    let (labels, data) = impute_columns(labels, raw, &mut diagnostics);
    if labels.is_empty() {
        return Err(Error::InsufficientData {
            field_id: field_id.to_string(),
            reason: format!("no observed values for {:?}", indices),
        });
    }

    if let Some(cadence) = config.expected_cadence_days {
        diagnostics.cadence_gaps = cadence_gaps(&dates, cadence);
    }

    debug!(
        "{}: {} observations -> {} dates x {} columns ({} duplicates, {} cloud filtered, {} imputed, {} dropped)",
        field_id,
        diagnostics.observations,
        dates.len(),
        labels.len(),
        diagnostics.duplicates_resolved,
        diagnostics.cloud_filtered,
        diagnostics.imputed_cells,
        diagnostics.dropped_columns,
    );

    Ok(TemporalMatrix::from_raw(field_id, dates, labels, data, config.center)?
        .with_diagnostics(diagnostics))
}

/// Whether `candidate` replaces `current` for the same date.
fn supersedes(
    (cand_pos, cand): (usize, &TemporalObservation),
    (cur_pos, cur): (usize, &TemporalObservation),
) -> bool {
    let (a, b) = (cand.effective_cloud_fraction(), cur.effective_cloud_fraction());
    if a != b {
        return a < b;
    }
    (cand.ingest_seq(), cand_pos) > (cur.ingest_seq(), cur_pos)
}

/// Raw columns, NaN marking missing cells.
type RawColumns = (Vec<ColumnLabel>, Vec<Vec<f64>>);

fn index_columns(rows: &[&TemporalObservation], indices: &[VegetationIndex]) -> RawColumns {
    let labels = indices
        .iter()
        .map(|&index| ColumnLabel::Index { index })
        .collect();
    let columns = indices
        .iter()
        .map(|&index| {
            rows.iter()
                .map(|obs| obs.index(index).unwrap_or(f64::NAN))
                .collect()
        })
        .collect();
    (labels, columns)
}

fn pixel_columns(
    rows: &[&TemporalObservation],
    indices: &[VegetationIndex],
) -> Result<RawColumns> {
    let mut labels = Vec::new();
    let mut columns = Vec::new();

    for &index in indices {
        let width = match rows.iter().find_map(|obs| obs.pixels(index)) {
            Some(px) => px.len(),
            None => continue,
        };
        for obs in rows {
            if let Some(px) = obs.pixels(index) {
                if px.len() != width {
                    return Err(Error::SizeMismatch {
                        context: "pixel vector",
                        expected: width,
                        actual: px.len(),
                    });
                }
            }
        }
        for position in 0..width {
            labels.push(ColumnLabel::Pixel { index, position });
            columns.push(
                rows.iter()
                    .map(|obs| obs.pixels(index).map_or(f64::NAN, |px| px[position]))
                    .collect(),
            );
        }
    }
    Ok((labels, columns))
}

/// Fill NaN cells with the column mean and drop never-observed columns.
fn impute_columns(
    labels: Vec<ColumnLabel>,
    columns: Vec<Vec<f64>>,
    diagnostics: &mut BuildDiagnostics,
) -> (Vec<ColumnLabel>, Array2<f64>) {
    let rows = columns.first().map_or(0, Vec::len);

    let filled: Vec<Option<(Vec<f64>, usize)>> = columns
        .into_par_iter()
        .map(|mut col| {
            let (sum, count) = col
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if count == 0 {
                return None;
            }
            let mean = sum / count as f64;
            let missing = col.len() - count;
            for v in col.iter_mut().filter(|v| v.is_nan()) {
                *v = mean;
            }
            Some((col, missing))
        })
        .collect();

    let mut kept_labels = Vec::with_capacity(labels.len());
    let mut kept = Vec::with_capacity(labels.len());
    for (label, col) in labels.into_iter().zip(filled) {
        match col {
            Some((values, missing)) => {
                diagnostics.imputed_cells += missing;
                kept_labels.push(label);
                kept.push(values);
            }
            None => diagnostics.dropped_columns += 1,
        }
    }

    let cols = kept.len();
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| kept[c][r]);
    (kept_labels, data)
}

fn cadence_gaps(dates: &[NaiveDate], cadence_days: u32) -> Vec<CadenceGap> {
    let limit = 2 * i64::from(cadence_days);
    dates
        .windows(2)
        .filter_map(|pair| {
            let days = (pair[1] - pair[0]).num_days();
            (days > limit).then_some(CadenceGap {
                after: pair[0],
                before: pair[1],
                days,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use matengine_core::IndexSelection;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn obs(d: u32, ndvi: f64) -> TemporalObservation {
        TemporalObservation::new("f1", day(d)).with_index(VegetationIndex::Ndvi, ndvi)
    }

    fn uncentered() -> MatrixConfig {
        MatrixConfig {
            center: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_sorted_chronologically() {
        let input = vec![obs(20, 0.3), obs(1, 0.1), obs(10, 0.2)];
        let m = build_matrix("f1", &input, &uncentered()).unwrap();
        assert_eq!(m.dates(), &[day(1), day(10), day(20)]);
        assert_eq!(m.data().column(0).to_vec(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_duplicate_date_lower_cloud_wins() {
        let input = vec![
            obs(1, 0.1),
            obs(5, 0.9).with_cloud_fraction(0.6),
            obs(5, 0.5).with_cloud_fraction(0.1),
            obs(5, 0.7).with_cloud_fraction(0.3),
        ];
        let m = build_matrix("f1", &input, &uncentered()).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.data()[[1, 0]], 0.5);
        assert_eq!(m.diagnostics().duplicates_resolved, 2);
    }

    #[test]
    fn test_duplicate_tie_break_by_ingest_then_position() {
        let input = vec![
            obs(1, 0.1),
            obs(5, 0.4).with_ingest_seq(3),
            obs(5, 0.6).with_ingest_seq(1),
        ];
        let m = build_matrix("f1", &input, &uncentered()).unwrap();
        assert_eq!(m.data()[[1, 0]], 0.4, "higher ingest_seq wins");

        let input = vec![obs(1, 0.1), obs(5, 0.4), obs(5, 0.6)];
        let m = build_matrix("f1", &input, &uncentered()).unwrap();
        assert_eq!(m.data()[[1, 0]], 0.6, "later position wins a full tie");
    }

    #[test]
    fn test_dedup_independent_of_input_order() {
        let a = obs(5, 0.4).with_cloud_fraction(0.2);
        let b = obs(5, 0.8).with_cloud_fraction(0.05);
        let m1 = build_matrix("f1", &[obs(1, 0.1), a.clone(), b.clone()], &uncentered()).unwrap();
        let m2 = build_matrix("f1", &[b, obs(1, 0.1), a], &uncentered()).unwrap();
        assert_eq!(m1.data(), m2.data());
    }

    #[test]
    fn test_single_date_is_insufficient() {
        let input = vec![obs(3, 0.5), obs(3, 0.6)];
        let err = build_matrix("f1", &input, &MatrixConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));

        let err = build_matrix("f1", &[], &MatrixConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn test_foreign_field_rejected() {
        let input = vec![obs(1, 0.1), TemporalObservation::new("f2", day(2))];
        assert!(matches!(
            build_matrix("f1", &input, &MatrixConfig::default()),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_cloud_filter() {
        let config = MatrixConfig {
            max_cloud_fraction: Some(0.5),
            center: false,
            ..Default::default()
        };
        let input = vec![
            obs(1, 0.1),
            obs(2, 0.2).with_cloud_fraction(0.8),
            obs(3, 0.3),
        ];
        let m = build_matrix("f1", &input, &config).unwrap();
        assert_eq!(m.dates(), &[day(1), day(3)]);
        assert_eq!(m.diagnostics().cloud_filtered, 1);
    }

    #[test]
    fn test_missing_values_imputed_with_column_mean() {
        let config = MatrixConfig {
            index: IndexSelection::Many(vec![VegetationIndex::Ndvi, VegetationIndex::Ndre]),
            center: false,
            ..Default::default()
        };
        let input = vec![
            obs(1, 0.2).with_index(VegetationIndex::Ndre, 0.1),
            obs(2, f64::NAN).with_index(VegetationIndex::Ndre, 0.3),
            obs(3, 0.4),
        ];
        let m = build_matrix("f1", &input, &config).unwrap();
        assert_eq!(m.cols(), 2);
        assert!((m.data()[[1, 0]] - 0.3).abs() < 1e-12);
        assert!((m.data()[[2, 1]] - 0.2).abs() < 1e-12);
        assert_eq!(m.diagnostics().imputed_cells, 2);
    }

    #[test]
    fn test_infinite_values_are_not_imputed() {
        let input = vec![obs(1, 0.3), obs(2, f64::INFINITY), obs(3, 0.5)];
        let m = build_matrix("f1", &input, &uncentered()).unwrap();
        assert_eq!(m.data()[[1, 0]], f64::INFINITY);
        assert_eq!(m.diagnostics().imputed_cells, 0);
        assert!(m.has_non_finite());
    }

    #[test]
    fn test_unobserved_column_dropped() {
        let config = MatrixConfig {
            index: IndexSelection::Many(vec![VegetationIndex::Ndvi, VegetationIndex::Evi]),
            ..Default::default()
        };
        let m = build_matrix("f1", &[obs(1, 0.2), obs(2, 0.4)], &config).unwrap();
        assert_eq!(m.cols(), 1);
        assert_eq!(m.diagnostics().dropped_columns, 1);

        let config = MatrixConfig {
            index: IndexSelection::One(VegetationIndex::Evi),
            ..Default::default()
        };
        assert!(matches!(
            build_matrix("f1", &[obs(1, 0.2), obs(2, 0.4)], &config),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_pixel_layout() {
        let config = MatrixConfig {
            layout: MatrixLayout::Pixels,
            center: false,
            ..Default::default()
        };
        let input = vec![
            TemporalObservation::new("f1", day(1))
                .with_pixels(VegetationIndex::Ndvi, vec![0.1, 0.2, 0.3]),
            TemporalObservation::new("f1", day(2))
                .with_pixels(VegetationIndex::Ndvi, vec![0.4, f64::NAN, 0.6]),
        ];
        let m = build_matrix("f1", &input, &config).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(
            m.columns()[2],
            ColumnLabel::Pixel {
                index: VegetationIndex::Ndvi,
                position: 2
            }
        );
        assert!((m.data()[[1, 1]] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_pixel_width_mismatch() {
        let config = MatrixConfig {
            layout: MatrixLayout::Pixels,
            ..Default::default()
        };
        let input = vec![
            TemporalObservation::new("f1", day(1)).with_pixels(VegetationIndex::Ndvi, vec![0.1; 4]),
            TemporalObservation::new("f1", day(2)).with_pixels(VegetationIndex::Ndvi, vec![0.1; 3]),
        ];
        assert!(matches!(
            build_matrix("f1", &input, &config),
            Err(Error::SizeMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_cadence_gaps() {
        let config = MatrixConfig {
            expected_cadence_days: Some(5),
            ..Default::default()
        };
        let input = vec![obs(1, 0.1), obs(6, 0.2), obs(20, 0.3)];
        let m = build_matrix("f1", &input, &config).unwrap();
        let gaps = &m.diagnostics().cadence_gaps;
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].days, 14);
        assert_eq!(gaps[0].after, day(6));
    }

    #[test]
    fn test_group_by_field_keeps_ingestion_order() {
        let input = vec![
            TemporalObservation::new("b", day(3)),
            TemporalObservation::new("a", day(2)),
            TemporalObservation::new("b", day(1)),
        ];
        let groups = group_by_field(input);
        assert_eq!(groups.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
        let b_dates: Vec<_> = groups["b"].iter().map(|o| o.date()).collect();
        assert_eq!(b_dates, vec![day(3), day(1)]);
    }
}
