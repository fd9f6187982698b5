//! Edge-effect detection.
//!
//! Quantifies spatial artifacts on a plate for one metric:
//!
//! - **Effect size**: robust Cohen's d analogue comparing edge and interior wells,
//!   `d = (median(edge) - median(interior)) / (1.4826 × MAD(interior))`
//! - **Trends**: Spearman correlation of row (column) index with row (column) median
//! - **Corners**: deviation of each corner well from the interior median, in scale units
//! - **Spatial autocorrelation**: Moran's I of median-polish residuals (optional)
//!
//! The effect size is classified into a [`WarningLevel`] against the configured
//! thresholds. Degenerate plates (all missing, constant, no interior) still
//! produce a complete [`DiagnosticResult`] with NaN / not-computed placeholders,
//! so a batch never stops on one bad plate.
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::Array2;
//! use plateqc::edge::{DetectorConfig, EdgeEffectDetector, WarningLevel};
//! use plateqc::plate::{MeasurementMatrix, PlateLayout};
//!
//! let layout = PlateLayout::standard(96).unwrap();
//! // interior around 100, edge wells 20 units higher
//! let values = Array2::from_shape_fn(layout.shape(), |(r, c)| {
//!     let jitter = ((r * 12 + c) % 7) as f64 - 3.0;
//!     if layout.is_edge(r, c) { 120.0 + jitter } else { 100.0 + jitter }
//! });
//!
//! let detector = EdgeEffectDetector::new(DetectorConfig::default());
//! let result = detector
//!     .detect(&MeasurementMatrix::from_values(&values), &layout, "signal", "plate_01")
//!     .unwrap();
//!
//! assert!(result.effect_size() > 0.0);
//! assert_eq!(result.warning_level, WarningLevel::Critical);
//! ```

pub mod report;
mod spatial;
mod types;

pub use report::{
    correction_efficacy, generate_report, CorrectionEfficacy, EdgeEffectReport, PlateTrend,
    ReportSummary,
};
pub use spatial::{morans_i, NotComputedReason, SpatialAutocorrelation};
pub use types::{
    Corner, CornerDeviations, DetectorConfig, DiagnosticResult, EffectSize, FlatValue,
    RowColTrends, WarningLevel,
};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::grid::PlateBatch;
use crate::plate::{MeasurementMatrix, PlateLayout, Well};
use crate::stats::{median, scaled_mad, spearman, Correlation};
use crate::table::{DataFrame, TableSchema};

/// Split a layout into `(edge, interior)` well positions.
///
/// Edge wells are those in the first or last row or column.
#[must_use]
pub fn identify_edge_interior(layout: &PlateLayout) -> (Vec<Well>, Vec<Well>) {
    layout.partition()
}

/// Present values at the given positions.
///
/// Missing cells and positions outside the matrix are dropped silently.
#[must_use]
pub fn extract_values(matrix: &MeasurementMatrix, positions: &[Well]) -> Vec<f64> {
    positions.iter().filter_map(|&w| matrix.at(w)).collect()
}

/// Robust effect size of edge versus interior wells.
///
/// `d` is NaN when either group is empty or the interior scale is zero;
/// callers must treat NaN as indeterminate, never as "no effect".
///
/// ```
/// use plateqc::edge::effect_size;
///
/// let edge = [12.0, 13.0, 11.0, 12.0];
/// let interior = [9.0, 10.0, 11.0, 10.0, 10.0];
/// let e = effect_size(&edge, &interior);
/// assert!(e.d > 0.0);
/// assert_eq!(e.edge_median, 12.0);
/// assert_eq!(e.interior_median, 10.0);
/// ```
#[must_use]
pub fn effect_size(edge_values: &[f64], interior_values: &[f64]) -> EffectSize {
    let edge_median = median(edge_values).unwrap_or(f64::NAN);
    let interior_median = median(interior_values).unwrap_or(f64::NAN);
    let interior_mad = scaled_mad(interior_values).unwrap_or(f64::NAN);

    let d = if interior_mad > 0.0 && !edge_median.is_nan() && !interior_median.is_nan() {
        (edge_median - interior_median) / interior_mad
    } else {
        f64::NAN
    };

    EffectSize {
        d,
        edge_median,
        interior_median,
        interior_mad,
    }
}

/// Spearman trends of row and column medians against their index.
///
/// Rows (columns) without any measured well are left out.
#[must_use]
pub fn row_col_trends(matrix: &MeasurementMatrix) -> RowColTrends {
    let lane_trend = |count: usize, values: &dyn Fn(usize) -> Vec<f64>| -> Correlation {
        let (index, medians): (Vec<f64>, Vec<f64>) = (0..count)
            .filter_map(|i| median(&values(i)).map(|m| (i as f64, m)))
            .unzip();
        spearman(&index, &medians)
    };

    RowColTrends {
        row: lane_trend(matrix.nrows(), &|r| matrix.row_values(r)),
        col: lane_trend(matrix.ncols(), &|c| matrix.col_values(c)),
    }
}

/// Deviation `|corner - interior_median| / interior_mad` of the four corner wells.
///
/// ```
/// use ndarray::Array2;
/// use plateqc::edge::corner_deviations;
/// use plateqc::plate::MeasurementMatrix;
///
/// let mut values = Array2::from_elem((8, 12), 5.0);
/// values[[0, 0]] = 10.0;
/// let corners = corner_deviations(&MeasurementMatrix::from_values(&values), 5.0, 1.0);
/// assert_eq!(corners.top_left, 5.0);
/// assert_eq!(corners.bottom_right, 0.0);
/// ```
#[must_use]
pub fn corner_deviations(
    matrix: &MeasurementMatrix,
    interior_median: f64,
    interior_mad: f64,
) -> CornerDeviations {
    let Ok(layout) = matrix.layout() else {
        return CornerDeviations::UNDEFINED;
    };
    let usable = interior_mad > 0.0 && interior_mad.is_finite() && interior_median.is_finite();
    let deviation = |well: Well| -> f64 {
        match matrix.at(well) {
            Some(v) if usable => (v - interior_median).abs() / interior_mad,
            _ => f64::NAN,
        }
    };

    let [top_left, top_right, bottom_left, bottom_right] = layout.corners().map(deviation);
    CornerDeviations {
        top_left,
        top_right,
        bottom_left,
        bottom_right,
    }
}

/// Stateless edge-effect detector.
///
/// Holds only its configuration; every method is a pure function of its
/// arguments, so one detector may be shared across threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeEffectDetector {
    config: DetectorConfig,
}

impl EdgeEffectDetector {
    /// Create a detector.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Create a detector, validating the configuration first.
    pub fn try_new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The detector's configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classify an effect size with this detector's thresholds.
    #[must_use]
    pub fn warning_level(&self, d: f64) -> WarningLevel {
        WarningLevel::classify(d, self.config.warn_threshold, self.config.critical_threshold)
    }

    /// Moran's I on median-polish residuals, or `NotComputed(Disabled)` when
    /// switched off.
    #[must_use]
    pub fn spatial_autocorrelation(&self, matrix: &MeasurementMatrix) -> SpatialAutocorrelation {
        if self.config.spatial_autocorrelation {
            morans_i(matrix, &self.config.polish)
        } else {
            SpatialAutocorrelation::NotComputed(NotComputedReason::Disabled)
        }
    }

    fn trend_flagged(&self, trend: &Correlation) -> bool {
        trend.coefficient.abs() >= self.config.trend_threshold
            && trend.p_value < self.config.significance_level
    }

    /// Diagnose one plate for one metric.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParams`] if the matrix shape does not match the layout or
    /// the configuration is invalid.
    pub fn detect(
        &self,
        matrix: &MeasurementMatrix,
        layout: &PlateLayout,
        metric: &str,
        plate_id: &str,
    ) -> Result<DiagnosticResult> {
        self.config.validate()?;
        if matrix.shape() != layout.shape() {
            return Err(Error::invalid_params(format!(
                "matrix shape {:?} does not match plate layout {}",
                matrix.shape(),
                layout
            )));
        }

        let (edge, interior) = identify_edge_interior(layout);
        let edge_values = extract_values(matrix, &edge);
        let interior_values = extract_values(matrix, &interior);

        let effect = effect_size(&edge_values, &interior_values);
        let trends = row_col_trends(matrix);
        let corners = corner_deviations(matrix, effect.interior_median, effect.interior_mad);
        let warning_level = self.warning_level(effect.d);

        let n_edge_wells = edge_values.len();
        let n_interior_wells = interior_values.len();
        let low_confidence = n_edge_wells < self.config.min_group_wells
            || n_interior_wells < self.config.min_group_wells;
        if low_confidence {
            warn!(
                plate = plate_id,
                metric,
                n_edge_wells,
                n_interior_wells,
                min = self.config.min_group_wells,
                "too few wells for a confident edge-effect estimate"
            );
        }

        let spatial = self.spatial_autocorrelation(matrix);

        debug!(
            plate = plate_id,
            metric,
            d = effect.d,
            level = %warning_level,
            spatial = spatial.status(),
            "edge-effect diagnosis"
        );

        Ok(DiagnosticResult {
            plate_id: plate_id.to_string(),
            metric: metric.to_string(),
            effect,
            row_trend_flagged: self.trend_flagged(&trends.row),
            col_trend_flagged: self.trend_flagged(&trends.col),
            trends,
            flagged_corners: corners.flagged(self.config.corner_threshold),
            corners,
            warning_level,
            n_edge_wells,
            n_interior_wells,
            low_confidence,
            spatial,
        })
    }

    /// Diagnose every plate of a table for one metric.
    ///
    /// Rows are grouped by the schema's plate column (in order of first
    /// appearance) and mapped onto `layout`.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] naming every missing identifier or metric column;
    /// [`Error::Layout`] / [`Error::InvalidWell`] for bad well identifiers.
    pub fn detect_for_table(
        &self,
        table: &DataFrame,
        metric: &str,
        schema: &TableSchema,
        layout: &PlateLayout,
    ) -> Result<Vec<DiagnosticResult>> {
        self.detect_for_metrics(table, &[metric], schema, layout)
    }

    /// Diagnose every plate of a table for several metrics, plate-major.
    pub fn detect_for_metrics<S: AsRef<str>>(
        &self,
        table: &DataFrame,
        metrics: &[S],
        schema: &TableSchema,
        layout: &PlateLayout,
    ) -> Result<Vec<DiagnosticResult>> {
        let batch = self.plan(table, metrics, schema, layout)?;
        batch
            .units()
            .into_iter()
            .map(|unit| self.detect_unit(&batch, unit, layout))
            .collect()
    }

    pub(crate) fn plan<'a, S: AsRef<str>>(
        &self,
        table: &DataFrame,
        metrics: &'a [S],
        schema: &TableSchema,
        layout: &PlateLayout,
    ) -> Result<PlateBatch<'a>> {
        self.config.validate()?;
        PlateBatch::resolve(table, metrics, schema, layout)
    }

    pub(crate) fn detect_unit(
        &self,
        batch: &PlateBatch<'_>,
        unit: (usize, usize),
        layout: &PlateLayout,
    ) -> Result<DiagnosticResult> {
        let (plate_id, metric, matrix) = batch.unit(unit, layout);
        self.detect(&matrix, layout, metric, plate_id)
    }

    /// Summarize results into a report; see [`generate_report`].
    #[must_use]
    pub fn generate_report(&self, results: &[DiagnosticResult]) -> EdgeEffectReport {
        generate_report(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn noise(r: usize, c: usize) -> f64 {
        ((r as f64) * 12.9898 + (c as f64) * 78.233).sin() * 43_758.545_3 % 1.0
    }

    fn plate_with_edge(offset: f64) -> MeasurementMatrix {
        let layout = PlateLayout::standard(96).unwrap();
        let values = Array2::from_shape_fn(layout.shape(), |(r, c)| {
            let edge = if layout.is_edge(r, c) { offset } else { 0.0 };
            100.0 + noise(r, c) + edge
        });
        MeasurementMatrix::from_values(&values)
    }

    #[test]
    fn test_identify_edge_interior() {
        let layout = PlateLayout::standard(384).unwrap();
        let (edge, interior) = identify_edge_interior(&layout);
        assert_eq!(edge.len(), 2 * 24 + 2 * 14);
        assert_eq!(edge.len() + interior.len(), 384);
        assert!(interior.iter().all(|w| !layout.is_edge(w.row, w.col)));
    }

    #[test]
    fn test_extract_values_drops_missing_and_out_of_bounds() {
        let matrix = MeasurementMatrix::from_rows(vec![
            vec![Some(1.0), None],
            vec![Some(3.0), Some(4.0)],
        ])
        .unwrap();
        let positions = [Well::new(0, 0), Well::new(0, 1), Well::new(9, 9), Well::new(1, 1)];
        assert_eq!(extract_values(&matrix, &positions), vec![1.0, 4.0]);
    }

    #[test]
    fn test_effect_size_sign() {
        let interior = [9.0, 10.0, 11.0, 10.5, 9.5];
        assert!(effect_size(&[15.0, 16.0, 14.0], &interior).d > 0.0);
        assert!(effect_size(&[5.0, 4.0, 6.0], &interior).d < 0.0);
    }

    #[test]
    fn test_effect_size_indeterminate() {
        assert!(effect_size(&[], &[1.0, 2.0, 3.0]).d.is_nan());
        assert!(effect_size(&[1.0], &[]).d.is_nan());
        // zero interior scale
        let e = effect_size(&[3.0, 4.0], &[2.0, 2.0, 2.0]);
        assert!(e.d.is_nan());
        assert_eq!(e.interior_mad, 0.0);
    }

    #[test]
    fn test_row_col_trends() {
        let values = Array2::from_shape_fn((8, 12), |(r, c)| r as f64 * 2.0 + noise(r, c) * 0.1);
        let trends = row_col_trends(&MeasurementMatrix::from_values(&values));
        assert!((trends.row.coefficient - 1.0).abs() < 1e-12);
        assert!(trends.row.p_value < 0.001);
        assert!(trends.col.coefficient.abs() < 1.0);
    }

    #[test]
    fn test_row_col_trends_constant() {
        let values = Array2::from_elem((8, 12), 1.0);
        let trends = row_col_trends(&MeasurementMatrix::from_values(&values));
        assert!(!trends.row.is_defined());
        assert!(!trends.col.is_defined());
    }

    #[test]
    fn test_corner_deviation_exact() {
        let mut values = Array2::from_elem((8, 12), 5.0);
        values[[0, 0]] = 10.0;
        let corners = corner_deviations(&MeasurementMatrix::from_values(&values), 5.0, 1.0);
        assert_eq!(corners.top_left, 5.0);
        assert_eq!(corners.top_right, 0.0);
        assert_eq!(corners.bottom_left, 0.0);
        assert_eq!(corners.bottom_right, 0.0);
    }

    #[test]
    fn test_corner_deviation_missing_or_zero_scale() {
        let mut values = Array2::from_elem((8, 12), Some(5.0));
        values[[7, 11]] = None;
        let matrix = MeasurementMatrix::from_array(values);
        let corners = corner_deviations(&matrix, 5.0, 1.0);
        assert!(corners.bottom_right.is_nan());
        assert!(corner_deviations(&matrix, 5.0, 0.0).top_left.is_nan());
    }

    #[test]
    fn test_detect_edge_effect_critical() {
        let layout = PlateLayout::standard(96).unwrap();
        let detector = EdgeEffectDetector::default();
        let result = detector.detect(&plate_with_edge(5.0), &layout, "Z", "P1").unwrap();

        assert!(result.effect_size() > 1.5);
        assert_eq!(result.warning_level, WarningLevel::Critical);
        assert_eq!(result.n_edge_wells, 36);
        assert_eq!(result.n_interior_wells, 60);
        assert!(!result.low_confidence);
        assert_eq!(result.flagged_corners.len(), 4);
    }

    #[test]
    fn test_detect_negative_edge_effect() {
        let layout = PlateLayout::standard(96).unwrap();
        let result = EdgeEffectDetector::default()
            .detect(&plate_with_edge(-5.0), &layout, "Z", "P1")
            .unwrap();
        assert!(result.effect_size() < -1.5);
        assert_eq!(result.warning_level, WarningLevel::Critical);
    }

    #[test]
    fn test_detect_constant_plate() {
        let layout = PlateLayout::standard(96).unwrap();
        let matrix = MeasurementMatrix::from_values(&Array2::from_elem((8, 12), 7.0));
        let result = EdgeEffectDetector::default()
            .detect(&matrix, &layout, "Z", "flat")
            .unwrap();
        assert!(result.is_indeterminate());
        assert_eq!(result.warning_level, WarningLevel::Info);
        assert_eq!(
            result.spatial,
            SpatialAutocorrelation::NotComputed(NotComputedReason::ZeroVariance)
        );
    }

    #[test]
    fn test_detect_all_missing_plate() {
        let layout = PlateLayout::standard(96).unwrap();
        let matrix = MeasurementMatrix::empty(layout);
        let result = EdgeEffectDetector::default()
            .detect(&matrix, &layout, "Z", "blank")
            .unwrap();
        assert!(result.is_indeterminate());
        assert_eq!(result.warning_level, WarningLevel::Info);
        assert_eq!(result.n_edge_wells, 0);
        assert!(result.low_confidence);
        assert!(result.corners.max().is_nan());
        assert!(result.spatial.statistic().is_none());
    }

    #[test]
    fn test_detect_shape_mismatch() {
        let layout = PlateLayout::standard(384).unwrap();
        assert!(matches!(
            EdgeEffectDetector::default().detect(&plate_with_edge(0.0), &layout, "Z", "P1"),
            Err(Error::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_spatial_disabled() {
        let layout = PlateLayout::standard(96).unwrap();
        let detector =
            EdgeEffectDetector::new(DetectorConfig::default().with_spatial_autocorrelation(false));
        let result = detector.detect(&plate_with_edge(1.0), &layout, "Z", "P1").unwrap();
        assert_eq!(
            result.spatial,
            SpatialAutocorrelation::NotComputed(NotComputedReason::Disabled)
        );
    }

    #[test]
    fn test_detect_reproducible() {
        let layout = PlateLayout::standard(96).unwrap();
        let detector = EdgeEffectDetector::default();
        let a = detector.detect(&plate_with_edge(0.7), &layout, "Z", "P1").unwrap();
        let b = detector.detect(&plate_with_edge(0.7), &layout, "Z", "P1").unwrap();
        assert_eq!(a.effect.d.to_bits(), b.effect.d.to_bits());
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn test_detect_for_table_schema_error() {
        let table = polars::df!("Row" => &["A"], "Col" => &[1i64]).unwrap();
        let layout = PlateLayout::standard(96).unwrap();
        let err = EdgeEffectDetector::default()
            .detect_for_table(&table, "Z_lptA", &TableSchema::default(), &layout)
            .unwrap_err();
        assert_eq!(err, Error::schema(["Plate", "Z_lptA"]));
    }
}
