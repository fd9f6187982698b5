//! Spatial autocorrelation of median-polish residuals (Moran's I).
//!
//! Row and column gradients are removed first, so a positive statistic means
//! neighbouring wells resemble each other beyond any additive row/column
//! structure (e.g. evaporation rings, localized dispensing faults).
//!
//! Neighbours are rook-adjacent wells (shared side) with unit weights.
//! Missing wells are excluded. Significance uses the normal approximation
//! under the normality assumption:
//!
//! ```text
//! E[I]   = -1 / (n - 1)
//! Var[I] = (n² S1 - n S2 + 3 S0²) / ((n² - 1) S0²) - E[I]²
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::plate::MeasurementMatrix;
use crate::polish::{median_polish, PolishConfig};
use crate::stats::normal_two_sided_p_value;

/// Why spatial autocorrelation was not computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NotComputedReason {
    /// Turned off in the detector configuration.
    Disabled,
    /// Too few measured wells or no neighbouring pairs.
    InsufficientData,
    /// Residuals have no spread.
    ZeroVariance,
    /// The variance estimate was not positive and finite.
    NumericallyUnstable,
}

impl NotComputedReason {
    /// Snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::InsufficientData => "insufficient_data",
            Self::ZeroVariance => "zero_variance",
            Self::NumericallyUnstable => "numerically_unstable",
        }
    }
}

impl fmt::Display for NotComputedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moran's I result, or the reason it is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpatialAutocorrelation {
    /// The statistic was computed.
    Computed {
        /// Moran's I.
        statistic: f64,
        /// Expected value under no autocorrelation.
        expected: f64,
        /// Standardized deviation from the expectation.
        z_score: f64,
        /// Two-sided p-value.
        p_value: f64,
    },
    /// The statistic was not computed.
    NotComputed(NotComputedReason),
}

impl SpatialAutocorrelation {
    /// Moran's I, if computed.
    #[must_use]
    pub fn statistic(&self) -> Option<f64> {
        match self {
            Self::Computed { statistic, .. } => Some(*statistic),
            Self::NotComputed(_) => None,
        }
    }

    /// Two-sided p-value, if computed.
    #[must_use]
    pub fn p_value(&self) -> Option<f64> {
        match self {
            Self::Computed { p_value, .. } => Some(*p_value),
            Self::NotComputed(_) => None,
        }
    }

    /// `computed` or the not-computed reason.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Computed { .. } => "computed",
            Self::NotComputed(reason) => reason.as_str(),
        }
    }
}

/// Compute Moran's I on the median-polish residuals of a matrix.
///
/// Never fails: degenerate inputs yield [`SpatialAutocorrelation::NotComputed`].
#[must_use]
pub fn morans_i(matrix: &MeasurementMatrix, config: &PolishConfig) -> SpatialAutocorrelation {
    use NotComputedReason::{InsufficientData, NumericallyUnstable, ZeroVariance};

    let Ok(fit) = median_polish(matrix, config) else {
        return SpatialAutocorrelation::NotComputed(InsufficientData);
    };
    let residuals = fit.residuals.as_array();
    let (nrows, ncols) = residuals.dim();

    let values: Vec<f64> = residuals.iter().filter_map(|v| *v).collect();
    let n = values.len();
    if n < 3 {
        return SpatialAutocorrelation::NotComputed(InsufficientData);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let m2: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();

    let scale = matrix.present_values().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if !m2.is_finite() || m2 <= f64::EPSILON * n as f64 * scale.max(1.0).powi(2) {
        return SpatialAutocorrelation::NotComputed(ZeroVariance);
    }

    // Cross products over unordered rook pairs; each pair counts twice in the
    // symmetric weight matrix.
    let mut cross = 0.0;
    let mut pairs = 0usize;
    let mut degree_sq_sum = 0.0;
    for r in 0..nrows {
        for c in 0..ncols {
            let Some(x) = residuals[[r, c]] else { continue };
            let mut degree = 0usize;
            let neighbours = [
                (r.wrapping_sub(1), c),
                (r + 1, c),
                (r, c.wrapping_sub(1)),
                (r, c + 1),
            ];
            for (nr, nc) in neighbours {
                if let Some(Some(y)) = residuals.get((nr, nc)) {
                    degree += 1;
                    // visit each unordered pair once
                    if (nr, nc) > (r, c) {
                        cross += (x - mean) * (y - mean);
                        pairs += 1;
                    }
                }
            }
            degree_sq_sum += (degree * degree) as f64;
        }
    }

    if pairs == 0 {
        return SpatialAutocorrelation::NotComputed(InsufficientData);
    }

    let n_f = n as f64;
    let s0 = 2.0 * pairs as f64;
    let s1 = 4.0 * pairs as f64;
    let s2 = 4.0 * degree_sq_sum;

    let statistic = (n_f / s0) * (2.0 * cross) / m2;
    let expected = -1.0 / (n_f - 1.0);
    let variance = (n_f * n_f * s1 - n_f * s2 + 3.0 * s0 * s0) / ((n_f * n_f - 1.0) * s0 * s0)
        - expected * expected;

    if !statistic.is_finite() || !variance.is_finite() || variance <= 0.0 {
        return SpatialAutocorrelation::NotComputed(NumericallyUnstable);
    }

    let z_score = (statistic - expected) / variance.sqrt();
    SpatialAutocorrelation::Computed {
        statistic,
        expected,
        z_score,
        p_value: normal_two_sided_p_value(z_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn noise(r: usize, c: usize) -> f64 {
        ((r as f64) * 12.9898 + (c as f64) * 78.233).sin() * 43_758.545_3 % 1.0
    }

    #[test]
    fn test_constant_plate_zero_variance() {
        let m = MeasurementMatrix::from_values(&Array2::from_elem((8, 12), 4.0));
        assert_eq!(
            morans_i(&m, &PolishConfig::default()),
            SpatialAutocorrelation::NotComputed(NotComputedReason::ZeroVariance)
        );
    }

    #[test]
    fn test_tiny_plate_insufficient() {
        let m = MeasurementMatrix::from_values(&Array2::from_elem((1, 5), 4.0));
        assert_eq!(
            morans_i(&m, &PolishConfig::default()),
            SpatialAutocorrelation::NotComputed(NotComputedReason::InsufficientData)
        );
    }

    #[test]
    fn test_clustered_residuals_positive() {
        // a warm 3x3 patch in the middle of a noisy plate
        let values = Array2::from_shape_fn((8, 12), |(r, c)| {
            let patch = if (3..6).contains(&r) && (4..7).contains(&c) { 5.0 } else { 0.0 };
            patch + noise(r, c)
        });
        let result = morans_i(&MeasurementMatrix::from_values(&values), &PolishConfig::default());
        let SpatialAutocorrelation::Computed { statistic, p_value, .. } = result else {
            panic!("expected a statistic, got {result:?}");
        };
        assert!(statistic > 0.2, "I = {statistic}");
        assert!(p_value < 0.05, "p = {p_value}");
    }

    #[test]
    fn test_checkerboard_negative() {
        let values = Array2::from_shape_fn((8, 12), |(r, c)| {
            if (r + c) % 2 == 0 { 1.0 } else { -1.0 }
        });
        let result = morans_i(&MeasurementMatrix::from_values(&values), &PolishConfig::default());
        assert!(result.statistic().unwrap() < -0.5);
    }

    #[test]
    fn test_accessors() {
        let not = SpatialAutocorrelation::NotComputed(NotComputedReason::Disabled);
        assert_eq!(not.statistic(), None);
        assert_eq!(not.status(), "disabled");
    }
}
