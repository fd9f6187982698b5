//! Dense per-plate measurement matrix with explicit missing cells.

use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{PlateLayout, Well};
use crate::error::{Error, Result};

/// One metric's measurements on one plate.
///
/// Cells are `Option<f64>`: `None` marks a well with no measurement, which is
/// distinct from a measured zero. Non-finite inputs (NaN, ±∞) are stored as
/// missing. The matrix is immutable once built; every algorithm in this crate
/// produces new matrices rather than editing one in place.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementMatrix {
    data: Array2<Option<f64>>,
}

impl MeasurementMatrix {
    /// Build a matrix from an `ndarray` of optional values.
    #[must_use]
    pub fn from_array(data: Array2<Option<f64>>) -> Self {
        Self {
            data: data.mapv(|v| v.filter(|x| x.is_finite())),
        }
    }

    /// Build a matrix from plain floats, treating non-finite values as missing.
    #[must_use]
    pub fn from_values(data: &Array2<f64>) -> Self {
        Self {
            data: data.mapv(|x| x.is_finite().then_some(x)),
        }
    }

    /// Build a matrix from row vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RaggedRows`] if the rows have different lengths.
    ///
    /// ```
    /// use plateqc::plate::MeasurementMatrix;
    ///
    /// let m = MeasurementMatrix::from_rows(vec![
    ///     vec![Some(1.0), None],
    ///     vec![Some(3.0), Some(4.0)],
    /// ]).unwrap();
    /// assert_eq!(m.shape(), (2, 2));
    /// assert_eq!(m.get(0, 1), None);
    /// ```
    pub fn from_rows(rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);

        let mut flat = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != ncols {
                return Err(Error::RaggedRows {
                    row: i,
                    expected: ncols,
                    actual: row.len(),
                });
            }
            flat.extend(row);
        }

        let data = Array2::from_shape_vec((nrows, ncols), flat)
            .map_err(|e| Error::invalid_params(e.to_string()))?;
        Ok(Self::from_array(data))
    }

    /// An all-missing matrix with the given layout's shape.
    #[must_use]
    pub fn empty(layout: PlateLayout) -> Self {
        Self {
            data: Array2::from_elem(layout.shape(), None),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Shape as `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Value at a position; `None` if missing or out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied().flatten()
    }

    /// Value at a well; `None` if missing or out of bounds.
    #[must_use]
    pub fn at(&self, well: Well) -> Option<f64> {
        self.get(well.row, well.col)
    }

    /// Borrow the underlying array.
    #[must_use]
    pub fn as_array(&self) -> &Array2<Option<f64>> {
        &self.data
    }

    /// Iterate over the present (non-missing) values in row-major order.
    pub fn present_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().filter_map(|v| *v)
    }

    /// Present values of one row.
    #[must_use]
    pub fn row_values(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().filter_map(|v| *v).collect()
    }

    /// Present values of one column.
    #[must_use]
    pub fn col_values(&self, col: usize) -> Vec<f64> {
        self.data.column(col).iter().filter_map(|v| *v).collect()
    }

    /// Number of present cells.
    #[must_use]
    pub fn count_present(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }

    /// The plate layout matching this matrix's shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] for a matrix with no rows or columns.
    pub fn layout(&self) -> Result<PlateLayout> {
        PlateLayout::new(self.nrows(), self.ncols())
    }
}

impl From<Array2<Option<f64>>> for MeasurementMatrix {
    fn from(data: Array2<Option<f64>>) -> Self {
        Self::from_array(data)
    }
}
