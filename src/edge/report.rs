//! Multi-plate summary of edge-effect diagnoses.
//!
//! [`generate_report`] aggregates per-plate [`DiagnosticResult`]s into counts
//! per warning level, a trend listing, free-text recommendations and the full
//! detail list. [`correction_efficacy`] compares diagnoses of raw values with
//! diagnoses of B-scored values for the same plates.

use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::{DiagnosticResult, WarningLevel};
use crate::bscore::bscore_column_name;
use crate::stats::Correlation;

/// Counts over a set of diagnostic results.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReportSummary {
    /// Number of (plate, metric) results.
    pub total: usize,
    /// Results classified INFO (includes indeterminate ones).
    pub info: usize,
    /// Results classified WARN.
    pub warn: usize,
    /// Results classified CRITICAL.
    pub critical: usize,
    /// Results whose effect size could not be evaluated.
    pub indeterminate: usize,
    /// Results flagged low confidence.
    pub low_confidence: usize,
    /// Largest finite |d|, NaN if there is none.
    pub max_abs_effect_size: f64,
}

impl ReportSummary {
    fn from_results(results: &[DiagnosticResult]) -> Self {
        let count = |level: WarningLevel| {
            results
                .iter()
                .filter(|r| r.warning_level == level)
                .count()
        };
        let max_abs_effect_size = results
            .iter()
            .map(|r| r.effect.d.abs())
            .filter(|d| d.is_finite())
            .fold(f64::NAN, f64::max);

        Self {
            total: results.len(),
            info: count(WarningLevel::Info),
            warn: count(WarningLevel::Warn),
            critical: count(WarningLevel::Critical),
            indeterminate: results.iter().filter(|r| r.is_indeterminate()).count(),
            low_confidence: results.iter().filter(|r| r.low_confidence).count(),
            max_abs_effect_size,
        }
    }
}

/// Row and column trend of one (plate, metric) result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlateTrend {
    /// Plate identifier.
    pub plate_id: String,
    /// Metric name.
    pub metric: String,
    /// Row-index trend.
    pub row: Correlation,
    /// Column-index trend.
    pub col: Correlation,
    /// Whether the row trend was flagged.
    pub row_flagged: bool,
    /// Whether the column trend was flagged.
    pub col_flagged: bool,
}

/// Aggregate edge-effect report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeEffectReport {
    /// Counts per warning level.
    pub summary: ReportSummary,
    /// Trend listing, in input order.
    pub trends: Vec<PlateTrend>,
    /// Free-text recommendations, most severe first.
    pub recommendations: Vec<String>,
    /// Full per-plate detail, in input order.
    pub details: Vec<DiagnosticResult>,
}

impl EdgeEffectReport {
    /// Results at or above the given level.
    pub fn at_least(&self, level: WarningLevel) -> impl Iterator<Item = &DiagnosticResult> {
        self.details.iter().filter(move |r| r.warning_level >= level)
    }

    /// Whether any result is WARN or CRITICAL.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.summary.warn + self.summary.critical > 0
    }
}

impl fmt::Display for EdgeEffectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(
            f,
            "Edge-effect report: {} result(s), {} INFO, {} WARN, {} CRITICAL, {} indeterminate",
            s.total, s.info, s.warn, s.critical, s.indeterminate
        )?;
        for line in &self.recommendations {
            writeln!(f, "  - {line}")?;
        }
        Ok(())
    }
}

/// Aggregate diagnostic results into a report.
///
/// Recommendations are ordered CRITICAL, WARN, trends, corners, then notes on
/// indeterminate and low-confidence results. When no result reaches WARN, a
/// single "no significant edge effects" line is emitted first.
///
/// # Example
///
/// ```
/// use ndarray::Array2;
/// use plateqc::edge::{generate_report, EdgeEffectDetector};
/// use plateqc::plate::{MeasurementMatrix, PlateLayout};
///
/// let layout = PlateLayout::standard(96).unwrap();
/// let flat = MeasurementMatrix::from_values(&Array2::from_shape_fn((8, 12), |(r, c)| {
///     ((r * 7 + c * 3) % 5) as f64
/// }));
/// let detector = EdgeEffectDetector::default();
/// let result = detector.detect(&flat, &layout, "signal", "P1").unwrap();
///
/// let report = generate_report(&[result]);
/// assert_eq!(report.summary.total, 1);
/// assert_eq!(report.details.len(), 1);
/// ```
#[must_use]
pub fn generate_report(results: &[DiagnosticResult]) -> EdgeEffectReport {
    let summary = ReportSummary::from_results(results);

    let trends = results
        .iter()
        .map(|r| PlateTrend {
            plate_id: r.plate_id.clone(),
            metric: r.metric.clone(),
            row: r.trends.row,
            col: r.trends.col,
            row_flagged: r.row_trend_flagged,
            col_flagged: r.col_trend_flagged,
        })
        .collect();

    EdgeEffectReport {
        summary,
        trends,
        recommendations: recommendations(results, &summary),
        details: results.to_vec(),
    }
}

fn recommendations(results: &[DiagnosticResult], summary: &ReportSummary) -> Vec<String> {
    let mut out = Vec::new();

    if summary.warn + summary.critical == 0 {
        let plates: BTreeSet<&str> = results.iter().map(|r| r.plate_id.as_str()).collect();
        out.push(format!(
            "No significant edge effects detected across {} plate(s)",
            plates.len()
        ));
    }

    for r in results.iter().filter(|r| r.warning_level == WarningLevel::Critical) {
        out.push(format!(
            "CRITICAL: {} on plate {} has a strong edge effect (d = {:.2}); \
             apply B-score correction or exclude edge wells before hit selection",
            r.metric, r.plate_id, r.effect.d
        ));
    }
    for r in results.iter().filter(|r| r.warning_level == WarningLevel::Warn) {
        out.push(format!(
            "WARN: {} on plate {} has a moderate edge effect (d = {:.2}); \
             consider B-score correction",
            r.metric, r.plate_id, r.effect.d
        ));
    }

    for r in results {
        for (flagged, axis, trend) in [
            (r.row_trend_flagged, "row", r.trends.row),
            (r.col_trend_flagged, "column", r.trends.col),
        ] {
            if flagged {
                out.push(format!(
                    "{} on plate {} shows a {axis} gradient (rho = {:.2}, p = {:.3}); \
                     check dispensing and incubation order",
                    r.metric, r.plate_id, trend.coefficient, trend.p_value
                ));
            }
        }
    }

    for r in results.iter().filter(|r| !r.flagged_corners.is_empty()) {
        let corners: Vec<&str> = r.flagged_corners.iter().map(|c| c.as_str()).collect();
        out.push(format!(
            "{} on plate {} has deviating corner wells ({})",
            r.metric,
            r.plate_id,
            corners.join(", ")
        ));
    }

    if summary.indeterminate > 0 {
        out.push(format!(
            "{} result(s) could not be evaluated (empty well group or zero interior spread); \
             inspect these plates manually",
            summary.indeterminate
        ));
    }
    if summary.low_confidence > 0 {
        out.push(format!(
            "{} result(s) rest on too few measured wells; \
             treat their warning levels as low confidence",
            summary.low_confidence
        ));
    }

    out
}

/// Change in edge effect between raw and corrected values of one plate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectionEfficacy {
    /// Plate identifier.
    pub plate_id: String,
    /// Raw metric name.
    pub metric: String,
    /// Effect size before correction.
    pub raw_effect_size: f64,
    /// Effect size after correction.
    pub corrected_effect_size: f64,
    /// Level before correction.
    pub raw_level: WarningLevel,
    /// Level after correction.
    pub corrected_level: WarningLevel,
}

impl CorrectionEfficacy {
    /// `|d_raw| - |d_corrected|`; positive when correction reduced the effect.
    #[must_use]
    pub fn reduction(&self) -> f64 {
        self.raw_effect_size.abs() - self.corrected_effect_size.abs()
    }

    /// Whether a WARN or CRITICAL plate dropped to a determinate INFO.
    #[must_use]
    pub fn resolved(&self) -> bool {
        self.raw_level > WarningLevel::Info
            && self.corrected_level == WarningLevel::Info
            && !self.corrected_effect_size.is_nan()
    }
}

/// Pair raw and corrected diagnoses by plate and metric.
///
/// A corrected result matches a raw one when the plate identifiers are equal
/// and its metric is either the raw metric or its `B_` column name. Raw
/// results without a match are skipped.
#[must_use]
pub fn correction_efficacy(
    raw: &[DiagnosticResult],
    corrected: &[DiagnosticResult],
) -> Vec<CorrectionEfficacy> {
    raw.iter()
        .filter_map(|before| {
            let derived = bscore_column_name(&before.metric);
            let after = corrected.iter().find(|c| {
                c.plate_id == before.plate_id && (c.metric == before.metric || c.metric == derived)
            })?;
            Some(CorrectionEfficacy {
                plate_id: before.plate_id.clone(),
                metric: before.metric.clone(),
                raw_effect_size: before.effect.d,
                corrected_effect_size: after.effect.d,
                raw_level: before.warning_level,
                corrected_level: after.warning_level,
            })
        })
        .collect()
}
