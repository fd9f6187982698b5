//! Tukey median polish.
//!
//! Decomposes a two-way table into additive effects:
//!
//! ```text
//! value[r, c] = grand + row[r] + col[c] + residual[r, c]
//! ```
//!
//! using medians rather than means at every sweep, so a handful of extreme
//! wells (hits, bubbles, dispensing failures) cannot drag the row and column
//! estimates with them.
//!
//! ## Algorithm
//!
//! 1. Start with zero effects and `residual = input`.
//! 2. Repeat up to `max_iterations` times:
//!    - subtract each row's median residual from the row and add it to the row effect
//!    - subtract each column's median residual from the column and add it to the column effect
//!    - stop once the summed absolute change of all effects in this sweep is below `tolerance`
//! 3. Move the median row effect and the median column effect into the grand effect.
//!
//! Medians take the lower middle value for even counts, which makes the solve
//! deterministic for a given table and configuration. Missing cells stay missing
//! in the residuals; a row or column without any data keeps a zero effect.
//! Hitting the iteration cap is not an error: the decomposition reached at that
//! point is returned with `converged == false`.

use ndarray::{Array1, Array2, Axis};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plate::MeasurementMatrix;
use crate::stats::low_median;

/// Configuration for the median polish solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolishConfig {
    /// Maximum number of row+column sweeps (default: 10).
    pub max_iterations: usize,
    /// Convergence threshold on the summed absolute effect change per sweep (default: 1e-6).
    pub tolerance: f64,
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-6,
        }
    }
}

impl PolishConfig {
    /// Set the maximum number of sweeps.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] for zero iterations or a negative /
    /// non-finite tolerance.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::invalid_params("max_iterations must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::invalid_params(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Result of a median polish.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decomposition {
    /// Overall level of the plate.
    pub grand_effect: f64,
    /// Additive effect of each row (median ≈ 0 over rows with data).
    pub row_effects: Array1<f64>,
    /// Additive effect of each column (median ≈ 0 over columns with data).
    pub col_effects: Array1<f64>,
    /// What is left after removing grand, row and column effects.
    pub residuals: MeasurementMatrix,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap.
    pub converged: bool,
}

impl Decomposition {
    /// Additive fit `grand + row[r] + col[c]` at a position.
    #[must_use]
    pub fn fitted(&self, row: usize, col: usize) -> f64 {
        self.grand_effect + self.row_effects[row] + self.col_effects[col]
    }

    /// Residual at a position; `None` for missing wells.
    #[must_use]
    pub fn residual(&self, row: usize, col: usize) -> Option<f64> {
        self.residuals.get(row, col)
    }

    /// Fitted value plus residual, i.e. the input value (up to rounding).
    #[must_use]
    pub fn reconstruct(&self, row: usize, col: usize) -> Option<f64> {
        self.residual(row, col).map(|e| self.fitted(row, col) + e)
    }

    /// Largest absolute row or column median of the residual table.
    ///
    /// Close to zero at convergence; useful as a quality indicator when
    /// `converged` is false.
    #[must_use]
    pub fn residual_median_abs(&self) -> f64 {
        let residuals = self.residuals.as_array();
        let row_meds = residuals.axis_iter(Axis(0)).filter_map(|lane| {
            let values: Vec<f64> = lane.iter().filter_map(|v| *v).collect();
            low_median(&values)
        });
        let col_meds = residuals.axis_iter(Axis(1)).filter_map(|lane| {
            let values: Vec<f64> = lane.iter().filter_map(|v| *v).collect();
            low_median(&values)
        });
        row_meds.chain(col_meds).fold(0.0, |acc, m| acc.max(m.abs()))
    }
}

/// Median polish solver.
///
/// Holds only configuration; every call to [`MedianPolish::solve`] is independent.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use plateqc::plate::MeasurementMatrix;
/// use plateqc::polish::{MedianPolish, PolishConfig};
///
/// let matrix = MeasurementMatrix::from_values(&array![
///     [11.0, 12.0, 13.0],
///     [21.0, 22.0, 23.0],
///     [31.0, 32.0, 33.0],
/// ]);
/// let fit = MedianPolish::new(PolishConfig::default()).solve(&matrix).unwrap();
///
/// assert_eq!(fit.grand_effect, 22.0);
/// assert_eq!(fit.row_effects.to_vec(), vec![-10.0, 0.0, 10.0]);
/// assert_eq!(fit.col_effects.to_vec(), vec![-1.0, 0.0, 1.0]);
/// assert!(fit.converged);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MedianPolish {
    config: PolishConfig,
}

impl MedianPolish {
    /// Create a solver with the given configuration.
    #[must_use]
    pub fn new(config: PolishConfig) -> Self {
        Self { config }
    }

    /// Create a solver, validating the configuration first.
    pub fn try_new(config: PolishConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The solver's configuration.
    #[must_use]
    pub fn config(&self) -> &PolishConfig {
        &self.config
    }

    /// Decompose a matrix into grand, row, column and residual parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] if the matrix has fewer than 2 rows or
    /// 2 columns, and [`Error::InvalidParams`] for an invalid configuration.
    pub fn solve(&self, matrix: &MeasurementMatrix) -> Result<Decomposition> {
        self.config.validate()?;

        let (nrows, ncols) = matrix.shape();
        if nrows < 2 || ncols < 2 {
            return Err(Error::Dimension {
                rows: nrows,
                cols: ncols,
            });
        }

        let mut residuals: Array2<Option<f64>> = matrix.as_array().clone();
        let mut row_effects = Array1::<f64>::zeros(nrows);
        let mut col_effects = Array1::<f64>::zeros(ncols);

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let mut change = 0.0;

            let rows = residuals.axis_iter_mut(Axis(0)).zip(row_effects.iter_mut());
            for (mut lane, effect) in rows {
                change += sweep(lane.iter_mut(), effect);
            }
            let cols = residuals.axis_iter_mut(Axis(1)).zip(col_effects.iter_mut());
            for (mut lane, effect) in cols {
                change += sweep(lane.iter_mut(), effect);
            }

            if change < self.config.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!(
                rows = nrows,
                cols = ncols,
                iterations,
                tolerance = self.config.tolerance,
                "median polish stopped at iteration cap"
            );
        }

        let row_has_data: Vec<bool> = residuals
            .axis_iter(Axis(0))
            .map(|lane| lane.iter().any(Option::is_some))
            .collect();
        let col_has_data: Vec<bool> = residuals
            .axis_iter(Axis(1))
            .map(|lane| lane.iter().any(Option::is_some))
            .collect();

        let mut grand_effect = 0.0;
        grand_effect += center(&mut row_effects, &row_has_data);
        grand_effect += center(&mut col_effects, &col_has_data);

        Ok(Decomposition {
            grand_effect,
            row_effects,
            col_effects,
            residuals: MeasurementMatrix::from_array(residuals),
            iterations,
            converged,
        })
    }
}

/// Remove the median of one lane from its present cells and fold it into the
/// lane's effect. Returns the absolute change applied.
fn sweep<'a>(cells: impl Iterator<Item = &'a mut Option<f64>>, effect: &mut f64) -> f64 {
    let mut cells: Vec<&mut f64> = cells.filter_map(Option::as_mut).collect();
    let values: Vec<f64> = cells.iter().map(|v| **v).collect();
    let Some(m) = low_median(&values) else {
        return 0.0;
    };
    for v in &mut cells {
        **v -= m;
    }
    *effect += m;
    m.abs()
}

/// Shift effects of lanes with data so their median is zero; returns the shift.
fn center(effects: &mut Array1<f64>, has_data: &[bool]) -> f64 {
    let present: Vec<f64> = effects
        .iter()
        .zip(has_data)
        .filter_map(|(&e, &keep)| keep.then_some(e))
        .collect();
    let Some(shift) = low_median(&present) else {
        return 0.0;
    };
    for (e, &keep) in effects.iter_mut().zip(has_data) {
        if keep {
            *e -= shift;
        }
    }
    shift
}

/// Run median polish with the given configuration.
///
/// Shorthand for `MedianPolish::new(*config).solve(matrix)`.
pub fn median_polish(matrix: &MeasurementMatrix, config: &PolishConfig) -> Result<Decomposition> {
    MedianPolish::new(*config).solve(matrix)
}
