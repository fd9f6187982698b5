//! Error types for the plateqc library.
//!
//! Only caller misuse is reported through [`Error`]: malformed shapes, wells
//! outside the declared plate layout, missing columns, and invalid
//! configuration. Failures inside polars surface as [`Error::Frame`].
//! Numerical degeneracies (zero MAD, all-missing groups, non-convergence) are
//! carried in-band by the result types instead.

use polars::prelude::PolarsError;
use thiserror::Error;

/// The main error type for the plateqc library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ============ Shape Errors ============
    /// The matrix is too small for a genuine two-way decomposition.
    #[error("matrix of shape {rows}x{cols} is not a two-way table (need at least 2 rows and 2 columns)")]
    Dimension {
        /// Number of rows in the offending matrix.
        rows: usize,
        /// Number of columns in the offending matrix.
        cols: usize,
    },

    /// Input rows have inconsistent lengths.
    #[error("ragged input: row {row} has {actual} cells, expected {expected}")]
    RaggedRows {
        /// Index of the first row with a mismatching length.
        row: usize,
        /// Expected number of cells.
        expected: usize,
        /// Actual number of cells.
        actual: usize,
    },

    // ============ Layout Errors ============
    /// A well position lies outside the declared plate layout.
    #[error("well at row {row}, column {col} is outside the {rows}x{cols} plate layout")]
    Layout {
        /// 0-based row index of the well.
        row: usize,
        /// 0-based column index of the well.
        col: usize,
        /// Number of rows in the layout.
        rows: usize,
        /// Number of columns in the layout.
        cols: usize,
    },

    /// A row label or column number could not be interpreted as a well position.
    #[error("invalid well identifier: {0}")]
    InvalidWell(String),

    // ============ Schema Errors ============
    /// Required columns are missing from tabular input.
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema {
        /// Names of the missing columns.
        missing: Vec<String>,
    },

    /// A column exists but holds the wrong kind of data.
    #[error("column '{column}' has type {actual}, expected {expected}")]
    ColumnType {
        /// Column name.
        column: String,
        /// Expected column kind.
        expected: &'static str,
        /// Actual column kind.
        actual: &'static str,
    },

    /// A data frame operation failed.
    #[error("data frame error: {0}")]
    Frame(String),

    // ============ Parameter Validation Errors ============
    /// Invalid configuration or call parameters.
    #[error("invalid parameters: {message}")]
    InvalidParams {
        /// Description of what is invalid.
        message: String,
    },
}

/// A specialized `Result` type for plateqc operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Create a new `InvalidParams` error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Create a new `Schema` error from the names of the missing columns.
    #[must_use]
    pub fn schema<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Schema {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a new `InvalidWell` error.
    #[must_use]
    pub fn invalid_well(message: impl Into<String>) -> Self {
        Self::InvalidWell(message.into())
    }
}

impl From<PolarsError> for Error {
    fn from(err: PolarsError) -> Self {
        Self::Frame(err.to_string())
    }
}
