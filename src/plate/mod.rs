//! Plate layouts, well identifiers, and measurement matrices.
//!
//! ## Overview
//!
//! - [`PlateLayout`]: grid dimensions of a plate (e.g. 8×12, 16×24)
//! - [`Well`]: a 0-based (row, column) position on a plate
//! - [`MeasurementMatrix`]: one metric's values on one plate, with missing cells
//!
//! ## Notation
//!
//! Wells are named the way plate readers print them: a row label made of
//! letters (`A` is row 0, `Z` row 25, `AA` row 26, ...) followed by a 1-based
//! column number, zero-padded to the width of the largest column number
//! (`A01`..`H12` on a 96-well plate, `A1`..`B3` on a 6-well plate).
//!
//! The outermost ring of a layout (first/last row, first/last column) forms the
//! *edge* wells; everything else is *interior*. The partition is a pure
//! function of the layout and is recomputed on demand.

mod matrix;

pub use matrix::MeasurementMatrix;

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 0-based well position on a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Well {
    /// 0-based row index.
    pub row: usize,
    /// 0-based column index.
    pub col: usize,
}

impl Well {
    /// Create a new well position.
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Well {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Grid dimensions of a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "LayoutDims"))]
pub struct PlateLayout {
    rows: usize,
    cols: usize,
}

/// Unchecked dimensions; deserialized layouts go through [`PlateLayout::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct LayoutDims {
    rows: usize,
    cols: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<LayoutDims> for PlateLayout {
    type Error = Error;

    fn try_from(dims: LayoutDims) -> Result<Self> {
        Self::new(dims.rows, dims.cols)
    }
}

impl PlateLayout {
    /// Create a layout with the given number of rows and columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] if either dimension is zero.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::invalid_params(format!(
                "plate layout must have at least one row and one column, got {rows}x{cols}"
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Layout of a standard SBS plate format from its well count.
    ///
    /// Supported formats: 6, 12, 24, 48, 96, 384 and 1536 wells.
    ///
    /// ```
    /// use plateqc::plate::PlateLayout;
    ///
    /// let layout = PlateLayout::standard(384).unwrap();
    /// assert_eq!((layout.rows(), layout.cols()), (16, 24));
    /// ```
    pub fn standard(wells: usize) -> Result<Self> {
        let (rows, cols) = match wells {
            6 => (2, 3),
            12 => (3, 4),
            24 => (4, 6),
            48 => (6, 8),
            96 => (8, 12),
            384 => (16, 24),
            1536 => (32, 48),
            _ => {
                return Err(Error::invalid_params(format!(
                    "no standard plate format with {wells} wells"
                )))
            }
        };
        Ok(Self { rows, cols })
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `(rows, cols)`, suitable for building an `ndarray`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of wells.
    #[must_use]
    pub const fn well_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the position lies inside the layout.
    #[must_use]
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Return the position as a [`Well`] if it lies inside the layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] for positions outside the plate.
    pub fn check(&self, row: usize, col: usize) -> Result<Well> {
        if self.contains(row, col) {
            Ok(Well::new(row, col))
        } else {
            Err(Error::Layout {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Whether the position belongs to the outermost ring of the plate.
    #[must_use]
    pub const fn is_edge(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.cols
    }

    /// Split every well of the layout into `(edge, interior)` in row-major order.
    #[must_use]
    pub fn partition(&self) -> (Vec<Well>, Vec<Well>) {
        let mut edge = Vec::new();
        let mut interior = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                if self.is_edge(row, col) {
                    edge.push(Well::new(row, col));
                } else {
                    interior.push(Well::new(row, col));
                }
            }
        }
        (edge, interior)
    }

    /// The four corner wells: top-left, top-right, bottom-left, bottom-right.
    #[must_use]
    pub const fn corners(&self) -> [Well; 4] {
        let last_row = self.rows - 1;
        let last_col = self.cols - 1;
        [
            Well::new(0, 0),
            Well::new(0, last_col),
            Well::new(last_row, 0),
            Well::new(last_row, last_col),
        ]
    }

    /// Human-readable name of a well, e.g. `B07`.
    ///
    /// ```
    /// use plateqc::plate::PlateLayout;
    ///
    /// let layout = PlateLayout::standard(96).unwrap();
    /// assert_eq!(layout.well_name(1, 6), "B07");
    /// ```
    #[must_use]
    pub fn well_name(&self, row: usize, col: usize) -> String {
        let width = self.cols.to_string().len();
        format!("{}{:0width$}", row_label(row), col + 1)
    }

    /// Parse a well name such as `B07` or `AA3` into a position on this layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWell`] if the name is malformed and
    /// [`Error::Layout`] if it lies outside the plate.
    pub fn parse_well(&self, name: &str) -> Result<Well> {
        let name = name.trim();
        let split = name
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::invalid_well(format!("'{name}' has no column number")))?;
        let (label, number) = name.split_at(split);
        let row = row_index(label)?;
        let col = column_index(number)?;
        self.check(row, col)
    }
}

impl fmt::Display for PlateLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ({} wells)", self.rows, self.cols, self.well_count())
    }
}

/// Convert a row label (`A`, `B`, ..., `Z`, `AA`, ...) to a 0-based row index.
///
/// Labels are case-insensitive.
///
/// ```
/// use plateqc::plate::row_index;
///
/// assert_eq!(row_index("A").unwrap(), 0);
/// assert_eq!(row_index("h").unwrap(), 7);
/// assert_eq!(row_index("AF").unwrap(), 31);
/// ```
pub fn row_index(label: &str) -> Result<usize> {
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::invalid_well("empty row label"));
    }

    let mut index: usize = 0;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::invalid_well(format!(
                "row label '{label}' must contain only letters"
            )));
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .ok_or_else(|| Error::invalid_well(format!("row label '{label}' is too long")))?;
    }
    Ok(index - 1)
}

/// Convert a 0-based row index to its letter label.
#[must_use]
pub fn row_label(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Convert a 1-based column number (as text) to a 0-based column index.
pub fn column_index(number: &str) -> Result<usize> {
    let number = number.trim();
    let value: usize = number
        .parse()
        .map_err(|_| Error::invalid_well(format!("'{number}' is not a column number")))?;
    column_from_number(value)
}

/// Convert a 1-based column number to a 0-based column index.
pub fn column_from_number(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .ok_or_else(|| Error::invalid_well("column numbers start at 1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_formats() {
        assert_eq!(PlateLayout::standard(96).unwrap().shape(), (8, 12));
        assert_eq!(PlateLayout::standard(384).unwrap().shape(), (16, 24));
        assert_eq!(PlateLayout::standard(1536).unwrap().shape(), (32, 48));
        assert!(PlateLayout::standard(100).is_err());
        assert!(PlateLayout::new(0, 12).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_validates_layout() {
        let layout: PlateLayout = serde_json::from_str(r#"{"rows":16,"cols":24}"#).unwrap();
        assert_eq!(layout, PlateLayout::standard(384).unwrap());
        assert_eq!(serde_json::to_string(&layout).unwrap(), r#"{"rows":16,"cols":24}"#);

        let err = serde_json::from_str::<PlateLayout>(r#"{"rows":0,"cols":12}"#).unwrap_err();
        assert!(err.to_string().contains("at least one row"));
    }

    #[test]
    fn test_row_labels_round_trip() {
        for index in [0, 1, 7, 25, 26, 27, 31, 51, 52, 701, 702] {
            let label = row_label(index);
            assert_eq!(row_index(&label).unwrap(), index, "label {label}");
        }
        assert_eq!(row_label(0), "A");
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
        assert_eq!(row_label(31), "AF");
    }

    #[test]
    fn test_row_index_rejects_garbage() {
        assert!(row_index("").is_err());
        assert!(row_index("A1").is_err());
        assert!(row_index("-").is_err());
    }

    #[test]
    fn test_well_names() {
        let layout = PlateLayout::standard(96).unwrap();
        assert_eq!(layout.well_name(0, 0), "A01");
        assert_eq!(layout.well_name(7, 11), "H12");
        assert_eq!(layout.parse_well("H12").unwrap(), Well::new(7, 11));
        assert_eq!(layout.parse_well("b7").unwrap(), Well::new(1, 6));

        let small = PlateLayout::standard(6).unwrap();
        assert_eq!(small.well_name(1, 2), "B3");
    }

    #[test]
    fn test_parse_well_out_of_layout() {
        let layout = PlateLayout::standard(96).unwrap();
        assert!(matches!(
            layout.parse_well("I01"),
            Err(Error::Layout { row: 8, .. })
        ));
        assert!(matches!(
            layout.parse_well("A13"),
            Err(Error::Layout { col: 12, .. })
        ));
        assert!(matches!(layout.parse_well("A0"), Err(Error::InvalidWell(_))));
        assert!(matches!(layout.parse_well("12"), Err(Error::InvalidWell(_))));
    }

    #[test]
    fn test_partition_96() {
        let layout = PlateLayout::standard(96).unwrap();
        let (edge, interior) = layout.partition();
        // 2*12 + 2*(8-2) = 36 edge wells
        assert_eq!(edge.len(), 36);
        assert_eq!(interior.len(), 60);
        assert!(edge.contains(&Well::new(0, 5)));
        assert!(edge.contains(&Well::new(4, 11)));
        assert!(interior.contains(&Well::new(1, 1)));
        assert!(!interior.contains(&Well::new(7, 0)));
    }

    #[test]
    fn test_partition_thin_plate_has_no_interior() {
        let layout = PlateLayout::new(2, 5).unwrap();
        let (edge, interior) = layout.partition();
        assert_eq!(edge.len(), 10);
        assert!(interior.is_empty());
    }

    #[test]
    fn test_corners() {
        let layout = PlateLayout::new(8, 12).unwrap();
        assert_eq!(
            layout.corners(),
            [
                Well::new(0, 0),
                Well::new(0, 11),
                Well::new(7, 0),
                Well::new(7, 11)
            ]
        );
    }
}
