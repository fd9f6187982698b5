//! Screening tables as polars data frames.
//!
//! Well-level screening data arrives as a [`DataFrame`] with one row per
//! (plate, well). Field names are not fixed: a [`TableSchema`] tells the
//! engine which columns hold the well row label, the column number and the
//! plate identifier. [`ScreenFrame`] adds the lookups the engine needs on top
//! of the frame. Derived columns such as `B_<metric>` are appended to a clone,
//! so the caller's metric columns are never modified.

use polars::prelude::DataType;
pub use polars::prelude::DataFrame;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Names of the identifier columns in a screening frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableSchema {
    /// Column holding the row label (`A`, `B`, ...). Default: `Row`.
    pub row_column: String,
    /// Column holding the 1-based column number. Default: `Col`.
    pub col_column: String,
    /// Column holding the plate identifier; `None` treats the table as one plate.
    /// Default: `Plate`.
    pub plate_column: Option<String>,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            row_column: "Row".to_string(),
            col_column: "Col".to_string(),
            plate_column: Some("Plate".to_string()),
        }
    }
}

impl TableSchema {
    /// Set the plate identifier column.
    #[must_use]
    pub fn with_plate_column(mut self, column: impl Into<String>) -> Self {
        self.plate_column = Some(column.into());
        self
    }

    /// Treat the whole table as a single plate.
    #[must_use]
    pub fn single_plate(mut self) -> Self {
        self.plate_column = None;
        self
    }

    /// Set the row label and column number columns.
    #[must_use]
    pub fn with_well_columns(mut self, row: impl Into<String>, col: impl Into<String>) -> Self {
        self.row_column = row.into();
        self.col_column = col.into();
        self
    }

    /// The identifier columns this schema requires.
    #[must_use]
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.row_column.as_str(), self.col_column.as_str()];
        if let Some(plate) = &self.plate_column {
            cols.push(plate.as_str());
        }
        cols
    }
}

/// Identifier used when a table is treated as a single plate.
pub const SINGLE_PLATE_ID: &str = "plate";

const ROW_INDEX: &str = "__plateqc_row";

fn kind(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::String => "text",
        DataType::Boolean => "boolean",
        d if d.is_numeric() => "numeric",
        _ => "other",
    }
}

/// Screening-table lookups on a polars [`DataFrame`].
pub trait ScreenFrame {
    /// Check that every named column exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] listing all missing columns, in the order given.
    fn require_columns<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>;

    /// Cells of a numeric column as `f64`, `None` where null.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] if absent, [`Error::ColumnType`] if not numeric.
    fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>>;

    /// Cells of a text column, `None` where null.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] if absent, [`Error::ColumnType`] if not text.
    fn text_values(&self, name: &str) -> Result<Vec<Option<String>>>;

    /// Names of numeric columns starting with `prefix`, in frame order.
    fn numeric_columns_with_prefix(&self, prefix: &str) -> Vec<String>;

    /// Group row indices by the value of a plate identifier column.
    ///
    /// With `None`, every row belongs to a single group named
    /// [`SINGLE_PLATE_ID`]. Groups come back in order of first appearance and
    /// identifiers are rendered as text (an integer column gives `"1"`, `"2"`,
    /// ...). Rows with a null identifier are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the identifier column is absent.
    fn plate_groups(&self, column: Option<&str>) -> Result<Vec<(String, Vec<usize>)>>;
}

impl ScreenFrame for DataFrame {
    fn require_columns<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present = self.get_column_names();
        let missing: Vec<&str> = names.into_iter().filter(|n| !present.contains(n)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::schema(missing))
        }
    }

    fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.column(name).map_err(|_| Error::schema([name]))?;
        if !series.dtype().is_numeric() {
            return Err(Error::ColumnType {
                column: name.to_string(),
                expected: "numeric",
                actual: kind(series.dtype()),
            });
        }
        let values = series.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    }

    fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self.column(name).map_err(|_| Error::schema([name]))?;
        let Ok(cells) = series.str() else {
            return Err(Error::ColumnType {
                column: name.to_string(),
                expected: "text",
                actual: kind(series.dtype()),
            });
        };
        Ok(cells.into_iter().map(|s| s.map(str::to_string)).collect())
    }

    fn numeric_columns_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.get_columns()
            .iter()
            .filter(|s| s.name().starts_with(prefix) && s.dtype().is_numeric())
            .map(|s| s.name().to_string())
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn plate_groups(&self, column: Option<&str>) -> Result<Vec<(String, Vec<usize>)>> {
        let Some(name) = column else {
            return Ok(vec![(SINGLE_PLATE_ID.to_string(), (0..self.height()).collect())]);
        };
        self.require_columns([name])?;

        let ids = self.column(name)?.clone();
        let indexed = DataFrame::new(vec![ids])?.with_row_index(ROW_INDEX, None)?;

        let mut groups = Vec::new();
        let mut skipped = 0usize;
        for part in indexed.partition_by_stable([name], true)? {
            let ids = part.column(name)?.cast(&DataType::String)?;
            let Some(id) = ids.str()?.get(0).map(str::to_string) else {
                skipped += part.height();
                continue;
            };
            let rows = part.column(ROW_INDEX)?.cast(&DataType::UInt64)?;
            let rows = rows.u64()?.into_no_null_iter().map(|i| i as usize).collect();
            groups.push((id, rows));
        }

        if skipped > 0 {
            warn!(column = name, rows = skipped, "skipping rows without a plate identifier");
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn sample() -> DataFrame {
        df!(
            "Plate" => &["P1", "P2", "P1", "P2"],
            "Row" => &["A", "A", "B", "B"],
            "Col" => &[1i64, 1, 2, 2],
            "Z_lptA" => &[Some(0.5), None, Some(1.5), Some(2.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_require_lists_all_missing() {
        let table = sample();
        assert!(table.require_columns(["Row", "Col"]).is_ok());
        assert_eq!(
            table.require_columns(["Row", "Well", "Z_gyrB"]),
            Err(Error::schema(["Well", "Z_gyrB"]))
        );
    }

    #[test]
    fn test_numeric_values_casts_integers() {
        let table = sample();
        assert_eq!(
            table.numeric_values("Col").unwrap(),
            vec![Some(1.0), Some(1.0), Some(2.0), Some(2.0)]
        );
        assert_eq!(table.numeric_values("Z_lptA").unwrap()[1], None);
        assert_eq!(table.numeric_values("Z_gyrB"), Err(Error::schema(["Z_gyrB"])));
    }

    #[test]
    fn test_column_type_mismatch() {
        let table = sample();
        assert!(matches!(
            table.numeric_values("Row"),
            Err(Error::ColumnType { expected: "numeric", actual: "text", .. })
        ));
        assert!(matches!(
            table.text_values("Col"),
            Err(Error::ColumnType { expected: "text", actual: "numeric", .. })
        ));
    }

    #[test]
    fn test_plate_groups_preserve_first_appearance() {
        let table = sample();
        let groups = table.plate_groups(Some("Plate")).unwrap();
        assert_eq!(
            groups,
            vec![
                ("P1".to_string(), vec![0, 2]),
                ("P2".to_string(), vec![1, 3])
            ]
        );

        let single = table.plate_groups(None).unwrap();
        assert_eq!(single, vec![(SINGLE_PLATE_ID.to_string(), vec![0, 1, 2, 3])]);

        assert_eq!(table.plate_groups(Some("Barcode")), Err(Error::schema(["Barcode"])));
    }

    #[test]
    fn test_plate_groups_integer_ids_and_nulls() {
        let table = df!("Plate" => &[Some(2i64), None, Some(1), Some(2)]).unwrap();
        let groups = table.plate_groups(Some("Plate")).unwrap();
        assert_eq!(
            groups,
            vec![("2".to_string(), vec![0, 3]), ("1".to_string(), vec![2])]
        );
    }

    #[test]
    fn test_prefix_scan() {
        let table = sample();
        assert_eq!(table.numeric_columns_with_prefix("Z_"), vec!["Z_lptA".to_string()]);
        assert!(table.numeric_columns_with_prefix("R").is_empty());
    }
}
