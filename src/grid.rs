//! Grid mapper: tabular well records to dense plate matrices and back.
//!
//! Row labels are letters starting at `A` (row 0); column numbers are 1-based.
//! A position outside the declared layout is a [`Error::Layout`]. When the
//! same well appears more than once, the last record wins and a warning is
//! logged.

use ndarray::Array2;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plate::{
    column_from_number, column_index, row_index, row_label, MeasurementMatrix, PlateLayout, Well,
};
use crate::table::{DataFrame, ScreenFrame, TableSchema};

/// One well's measurement in tabular form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WellRecord {
    /// Row label (`A`, `B`, ...).
    pub row_label: String,
    /// 1-based column number.
    pub col_number: usize,
    /// Measured value; `None` if the well was not measured.
    pub value: Option<f64>,
}

impl WellRecord {
    /// Create a record for a measured well.
    #[must_use]
    pub fn new(row_label: impl Into<String>, col_number: usize, value: f64) -> Self {
        Self {
            row_label: row_label.into(),
            col_number,
            value: Some(value),
        }
    }

    /// Create a record for a well without a measurement.
    #[must_use]
    pub fn missing(row_label: impl Into<String>, col_number: usize) -> Self {
        Self {
            row_label: row_label.into(),
            col_number,
            value: None,
        }
    }

    /// Resolve this record's position on a layout.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWell`] for unparseable labels, [`Error::Layout`] for
    /// positions outside the plate.
    pub fn well(&self, layout: &PlateLayout) -> Result<Well> {
        let row = row_index(&self.row_label)?;
        let col = column_from_number(self.col_number)?;
        layout.check(row, col)
    }
}

/// Place values onto a layout-shaped matrix, last write wins.
fn fill<I>(cells: I, layout: &PlateLayout) -> MeasurementMatrix
where
    I: IntoIterator<Item = (Well, Option<f64>)>,
{
    let mut data: Array2<Option<f64>> = Array2::from_elem(layout.shape(), None);
    let mut seen: Array2<bool> = Array2::from_elem(layout.shape(), false);

    for (well, value) in cells {
        let idx = (well.row, well.col);
        if seen[idx] {
            warn!(
                well = %layout.well_name(well.row, well.col),
                "duplicate well position, keeping last value"
            );
        }
        seen[idx] = true;
        data[idx] = value;
    }
    MeasurementMatrix::from_array(data)
}

/// Build a matrix from well records.
///
/// Wells without a record are missing.
///
/// # Errors
///
/// Fails with [`Error::Layout`] on the first record outside the layout, or
/// [`Error::InvalidWell`] on an unparseable row label / zero column number.
///
/// ```
/// use plateqc::grid::{to_matrix, WellRecord};
/// use plateqc::plate::PlateLayout;
///
/// let layout = PlateLayout::new(2, 3).unwrap();
/// let records = vec![WellRecord::new("A", 1, 1.5), WellRecord::new("B", 3, 4.0)];
/// let m = to_matrix(&records, &layout).unwrap();
/// assert_eq!(m.get(0, 0), Some(1.5));
/// assert_eq!(m.get(1, 2), Some(4.0));
/// assert_eq!(m.get(0, 1), None);
/// ```
pub fn to_matrix(records: &[WellRecord], layout: &PlateLayout) -> Result<MeasurementMatrix> {
    let cells = records
        .iter()
        .map(|rec| rec.well(layout).map(|w| (w, rec.value)))
        .collect::<Result<Vec<_>>>()?;
    Ok(fill(cells, layout))
}

/// Expand a matrix into one record per cell, row-major.
///
/// Missing cells come back as records with `value == None`.
#[must_use]
pub fn to_rows(matrix: &MeasurementMatrix) -> Vec<WellRecord> {
    matrix
        .as_array()
        .indexed_iter()
        .map(|((row, col), value)| WellRecord {
            row_label: row_label(row),
            col_number: col + 1,
            value: *value,
        })
        .collect()
}

/// Resolve the well position of every table row.
///
/// The row-label column must be text; the column-number column may be
/// numeric (integral values) or text.
///
/// # Errors
///
/// [`Error::Schema`] if an identifier column is absent, [`Error::InvalidWell`]
/// for missing or malformed identifiers, [`Error::Layout`] for wells outside
/// the layout.
pub fn well_positions(
    table: &DataFrame,
    schema: &TableSchema,
    layout: &PlateLayout,
) -> Result<Vec<Well>> {
    table.require_columns([schema.row_column.as_str(), schema.col_column.as_str()])?;
    let labels = table.text_values(&schema.row_column)?;
    let cols = column_indices(table, &schema.col_column)?;

    labels
        .iter()
        .zip(cols)
        .enumerate()
        .map(|(i, (label, col))| {
            let label = label
                .as_deref()
                .ok_or_else(|| Error::invalid_well(format!("row {i} has no row label")))?;
            let row = row_index(label)?;
            layout.check(row, col?)
        })
        .collect()
}

fn column_indices(table: &DataFrame, name: &str) -> Result<Vec<Result<usize>>> {
    let missing = |i: usize| Error::invalid_well(format!("row {i} has no column number"));
    if table.column(name)?.dtype().is_numeric() {
        let numbers = table.numeric_values(name)?;
        Ok(numbers
            .into_iter()
            .enumerate()
            .map(|(i, number)| {
                let number = number.ok_or_else(|| missing(i))?;
                if number.fract() != 0.0 || number < 1.0 {
                    return Err(Error::invalid_well(format!(
                        "row {i}: column number {number} is not a positive integer"
                    )));
                }
                column_from_number(number as usize)
            })
            .collect())
    } else {
        let texts = table.text_values(name)?;
        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| column_index(text.as_deref().ok_or_else(|| missing(i))?))
            .collect())
    }
}

/// Build one plate's matrix for a metric from a subset of table rows.
///
/// `wells` holds the position of every table row (see [`well_positions`]);
/// `rows` selects the rows belonging to the plate.
pub fn plate_matrix(
    values: &[Option<f64>],
    wells: &[Well],
    rows: &[usize],
    layout: &PlateLayout,
) -> MeasurementMatrix {
    fill(rows.iter().map(|&i| (wells[i], values[i])), layout)
}

/// Validated inputs for a table-level batch: the position of every row, the
/// plate groups and the selected metric columns.
pub(crate) struct PlateBatch<'a> {
    pub(crate) wells: Vec<Well>,
    pub(crate) plates: Vec<(String, Vec<usize>)>,
    pub(crate) metrics: Vec<(&'a str, Vec<Option<f64>>)>,
}

impl<'a> PlateBatch<'a> {
    /// Check the schema and metric columns, then resolve wells and plates.
    ///
    /// All missing columns are reported together in one [`Error::Schema`].
    pub(crate) fn resolve<S: AsRef<str>>(
        table: &DataFrame,
        metrics: &'a [S],
        schema: &TableSchema,
        layout: &PlateLayout,
    ) -> Result<Self> {
        if metrics.is_empty() {
            return Err(Error::invalid_params("at least one metric is required"));
        }

        let required = schema
            .required_columns()
            .into_iter()
            .chain(metrics.iter().map(AsRef::as_ref));
        table.require_columns(required)?;

        let metrics = metrics
            .iter()
            .map(|m| {
                let name = m.as_ref();
                table.numeric_values(name).map(|values| (name, values))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            wells: well_positions(table, schema, layout)?,
            plates: table.plate_groups(schema.plate_column.as_deref())?,
            metrics,
        })
    }

    /// All (plate index, metric index) work units, plate-major.
    pub(crate) fn units(&self) -> Vec<(usize, usize)> {
        (0..self.plates.len())
            .flat_map(|p| (0..self.metrics.len()).map(move |m| (p, m)))
            .collect()
    }

    /// Plate identifier, metric name and measurement matrix of one unit.
    pub(crate) fn unit(
        &self,
        (plate, metric): (usize, usize),
        layout: &PlateLayout,
    ) -> (&str, &'a str, MeasurementMatrix) {
        let (plate_id, rows) = &self.plates[plate];
        let (metric_name, values) = &self.metrics[metric];
        (plate_id, *metric_name, plate_matrix(values, &self.wells, rows, layout))
    }
}
