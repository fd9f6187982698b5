//! Table-level B-scoring across plates and metrics.
//!
//! Every (plate, metric) pair is scored independently; results are written to
//! new `B_<metric>` columns of a copy of the input table.

use polars::prelude::{NamedFrom, Series};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{compute_bscore, BScoreMatrix, BScoreNote};
use crate::error::Result;
use crate::grid::PlateBatch;
use crate::plate::PlateLayout;
use crate::polish::PolishConfig;
use crate::table::{DataFrame, ScreenFrame, TableSchema};

/// Prefix of derived B-score columns.
pub const BSCORE_PREFIX: &str = "B_";

/// Name of the B-score column derived from a metric, e.g. `Z_lptA` → `B_Z_lptA`.
#[must_use]
pub fn bscore_column_name(metric: &str) -> String {
    format!("{BSCORE_PREFIX}{metric}")
}

/// Metric columns selected by name prefix.
///
/// Convenience for tables whose metrics share a naming convention (e.g. `Z_`);
/// derived `B_` columns are never selected unless `prefix` itself asks for them.
#[must_use]
pub fn metrics_with_prefix(table: &DataFrame, prefix: &str) -> Vec<String> {
    table
        .numeric_columns_with_prefix(prefix)
        .into_iter()
        .filter(|name| prefix.starts_with(BSCORE_PREFIX) || !name.starts_with(BSCORE_PREFIX))
        .collect()
}

/// Outcome of scoring one (plate, metric) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BScoreOutcome {
    /// Plate identifier.
    pub plate_id: String,
    /// Source metric name.
    pub metric: String,
    /// Median polish sweeps used.
    pub iterations: usize,
    /// Whether median polish converged within the iteration cap.
    pub converged: bool,
    /// Why scores are missing for this plate, if they are.
    pub note: Option<BScoreNote>,
}

/// A table augmented with B-score columns.
#[derive(Debug, Clone)]
pub struct BScoreTable {
    /// Input columns plus one `B_<metric>` column per metric.
    pub table: DataFrame,
    /// One entry per (plate, metric) pair, plates in order of appearance.
    pub outcomes: Vec<BScoreOutcome>,
}

impl BScoreTable {
    /// Outcomes that carry a note.
    pub fn noted(&self) -> impl Iterator<Item = &BScoreOutcome> {
        self.outcomes.iter().filter(|o| o.note.is_some())
    }
}

pub(crate) fn plan<'a, S: AsRef<str>>(
    table: &DataFrame,
    metrics: &'a [S],
    schema: &TableSchema,
    layout: &PlateLayout,
    config: &PolishConfig,
) -> Result<PlateBatch<'a>> {
    config.validate()?;
    PlateBatch::resolve(table, metrics, schema, layout)
}

pub(crate) fn score_unit(
    plan: &PlateBatch<'_>,
    unit: (usize, usize),
    layout: &PlateLayout,
    config: &PolishConfig,
) -> Result<BScoreMatrix> {
    let (_, _, matrix) = plan.unit(unit, layout);
    compute_bscore(&matrix, config)
}

pub(crate) fn assemble(
    table: &DataFrame,
    plan: &PlateBatch<'_>,
    scored: Vec<((usize, usize), BScoreMatrix)>,
) -> Result<BScoreTable> {
    let mut columns: Vec<Vec<Option<f64>>> = vec![vec![None; table.height()]; plan.metrics.len()];
    let mut outcomes = Vec::with_capacity(scored.len());

    for ((plate, metric), result) in scored {
        let (plate_id, rows) = &plan.plates[plate];
        let (metric_name, _) = &plan.metrics[metric];
        for &row in rows {
            columns[metric][row] = result.scores.at(plan.wells[row]);
        }
        outcomes.push(BScoreOutcome {
            plate_id: plate_id.clone(),
            metric: metric_name.to_string(),
            iterations: result.decomposition.iterations,
            converged: result.decomposition.converged,
            note: result.note,
        });
    }

    let mut out = table.clone();
    for ((metric_name, _), values) in plan.metrics.iter().zip(columns) {
        out.with_column(Series::new(&bscore_column_name(metric_name), values))?;
    }
    Ok(BScoreTable {
        table: out,
        outcomes,
    })
}

/// Compute B-scores for every plate and metric of a table.
///
/// Rows are grouped by the schema's plate column; each group is mapped onto
/// `layout` and scored per metric. The returned table keeps every input column
/// untouched and adds `B_<metric>` columns; rerunning on the output replaces
/// them.
///
/// # Errors
///
/// - [`Schema`](crate::Error::Schema) naming every missing identifier or metric column
/// - [`ColumnType`](crate::Error::ColumnType) if a metric column is not numeric
/// - [`Layout`](crate::Error::Layout) or [`InvalidWell`](crate::Error::InvalidWell) for bad
///   well identifiers
/// - [`Dimension`](crate::Error::Dimension) if the layout is smaller than 2×2
///
/// # Example
///
/// ```
/// use plateqc::bscore::bscore_table;
/// use plateqc::plate::PlateLayout;
/// use plateqc::polish::PolishConfig;
/// use polars::df;
/// use plateqc::table::TableSchema;
///
/// let layout = PlateLayout::new(3, 3).unwrap();
/// let mut rows = Vec::new();
/// let mut cols = Vec::new();
/// let mut values = Vec::new();
/// for (r, label) in ["A", "B", "C"].iter().enumerate() {
///     for c in 1..=3 {
///         rows.push(*label);
///         cols.push(c as f64);
///         values.push((r * 3 + c * c) as f64);
///     }
/// }
/// let table = df!("Row" => rows, "Col" => cols, "Z_lptA" => values).unwrap();
///
/// let schema = TableSchema::default().single_plate();
/// let config = PolishConfig::default();
/// let out = bscore_table(&table, &["Z_lptA"], &schema, &layout, &config).unwrap();
/// assert_eq!(out.table.width(), 4);
/// assert!(out.table.column("B_Z_lptA").is_ok());
/// ```
pub fn bscore_table<S: AsRef<str>>(
    table: &DataFrame,
    metrics: &[S],
    schema: &TableSchema,
    layout: &PlateLayout,
    config: &PolishConfig,
) -> Result<BScoreTable> {
    let plan = plan(table, metrics, schema, layout, config)?;
    let scored = plan
        .units()
        .into_iter()
        .map(|unit| score_unit(&plan, unit, layout, config).map(|r| (unit, r)))
        .collect::<Result<Vec<_>>>()?;
    assemble(table, &plan, scored)
}
