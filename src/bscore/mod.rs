//! B-score normalization.
//!
//! A B-score is a median-polish residual divided by a robust estimate of the
//! residual spread:
//!
//! ```text
//! B[r, c] = residual[r, c] / (1.4826 × MAD(residuals))
//! ```
//!
//! Row and column artifacts are removed by the polish; the MAD scaling puts
//! every plate on a common, outlier-resistant scale so hits can be ranked
//! across plates.
//!
//! When the residual MAD is zero (e.g. a constant plate) there is no usable
//! scale: every B-score is reported as missing and a [`BScoreNote`] is
//! attached. This is not an error, so one degenerate plate does not stop a
//! batch.

mod batch;

pub use batch::{
    bscore_column_name, bscore_table, metrics_with_prefix, BScoreOutcome, BScoreTable,
    BSCORE_PREFIX,
};
#[cfg(feature = "parallel")]
pub(crate) use batch::{assemble, plan, score_unit};

use std::cmp::Ordering;
use std::fmt;

use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plate::{MeasurementMatrix, Well};
use crate::polish::{median_polish, Decomposition, PolishConfig};
use crate::stats::{mad, median, MAD_SCALE};

/// Low-severity remark explaining why B-scores are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BScoreNote {
    /// Residual MAD is zero, so no scale is available.
    ZeroMad,
    /// The plate has no measured wells.
    NoResiduals,
}

impl fmt::Display for BScoreNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroMad => write!(f, "residual MAD is zero; B-scores not computed"),
            Self::NoResiduals => write!(f, "no measured wells; B-scores not computed"),
        }
    }
}

/// A well flagged by its B-score.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Well position.
    pub well: Well,
    /// B-score of the well.
    pub score: f64,
}

/// B-scores of one plate for one metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BScoreMatrix {
    /// Standardized scores; missing where the input was missing or no scale exists.
    pub scores: MeasurementMatrix,
    /// Median of the residuals (NaN if there are none).
    pub residual_median: f64,
    /// Unscaled MAD of the residuals (NaN if there are none).
    pub residual_mad: f64,
    /// The underlying median-polish decomposition.
    pub decomposition: Decomposition,
    /// Set when scores could not be computed.
    pub note: Option<BScoreNote>,
}

impl BScoreMatrix {
    /// B-score at a position.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.scores.get(row, col)
    }

    /// Wells whose |B| is at least `threshold`, strongest first.
    ///
    /// Ties keep row-major order.
    #[must_use]
    pub fn hits(&self, threshold: f64) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .scores
            .as_array()
            .indexed_iter()
            .filter_map(|((row, col), v)| {
                v.filter(|s| s.abs() >= threshold).map(|score| Hit {
                    well: Well::new(row, col),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .abs()
                .partial_cmp(&a.score.abs())
                .unwrap_or(Ordering::Equal)
        });
        hits
    }
}

/// Compute B-scores for one plate.
///
/// # Errors
///
/// Propagates [`crate::Error::Dimension`] for matrices smaller than 2×2 and
/// [`crate::Error::InvalidParams`] for an invalid solver configuration.
///
/// # Example
///
/// ```
/// use ndarray::Array2;
/// use plateqc::bscore::compute_bscore;
/// use plateqc::plate::MeasurementMatrix;
/// use plateqc::polish::PolishConfig;
///
/// let values = Array2::from_shape_fn((8, 12), |(r, c)| {
///     r as f64 + 0.5 * c as f64 + ((r * 7 + c * 3) % 5) as f64 * 0.1
/// });
/// let matrix = MeasurementMatrix::from_values(&values);
/// let result = compute_bscore(&matrix, &PolishConfig::default()).unwrap();
/// assert!(result.note.is_none());
/// assert_eq!(result.scores.count_present(), 96);
/// ```
pub fn compute_bscore(matrix: &MeasurementMatrix, config: &PolishConfig) -> Result<BScoreMatrix> {
    let decomposition = median_polish(matrix, config)?;
    let residuals: Vec<f64> = decomposition.residuals.present_values().collect();

    let residual_median = median(&residuals).unwrap_or(f64::NAN);
    let residual_mad = mad(&residuals).unwrap_or(f64::NAN);

    let note = if residuals.is_empty() {
        Some(BScoreNote::NoResiduals)
    } else if residual_mad == 0.0 {
        Some(BScoreNote::ZeroMad)
    } else {
        None
    };

    let scores = match note {
        Some(note) => {
            warn!(%note, shape = ?matrix.shape(), "B-scores unavailable for plate");
            MeasurementMatrix::from_array(decomposition.residuals.as_array().mapv(|_| None))
        }
        None => {
            let scale = MAD_SCALE * residual_mad;
            MeasurementMatrix::from_array(
                decomposition
                    .residuals
                    .as_array()
                    .mapv(|v| v.map(|e| e / scale)),
            )
        }
    };

    Ok(BScoreMatrix {
        scores,
        residual_median,
        residual_mad,
        decomposition,
        note,
    })
}
