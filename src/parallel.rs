//! Parallel batch processing across plates and metrics.
//!
//! Every (plate, metric) pair is independent: no state is shared between
//! units, so B-scoring and edge detection map directly onto a rayon parallel
//! iterator. Results are identical to the sequential functions and come back
//! in the same plate-major order.
//! Enable with the `parallel` feature flag.
//!
//! # Usage
//!
//! ```ignore
//! use plateqc::parallel::par_bscore_table;
//! use plateqc::plate::PlateLayout;
//! use plateqc::polish::PolishConfig;
//! use plateqc::table::TableSchema;
//!
//! // `table` is a polars DataFrame with Plate, Row, Col and metric columns
//!
//! let layout = PlateLayout::standard(384)?;
//! let scored = par_bscore_table(&table, &["Z_lptA", "Z_ompA"], &TableSchema::default(),
//!                               &layout, &PolishConfig::default())?;
//! ```
//!
//! # Performance
//!
//! Parallel processing is most beneficial for:
//! - Screens with many plates or many metrics
//! - 1536-well plates, where one median polish is no longer trivial
//!
//! For a handful of 96-well plates, the sequential versions may be faster due
//! to scheduling overhead.

use rayon::prelude::*;

use crate::bscore::{assemble, plan, score_unit, BScoreTable};
use crate::edge::{DiagnosticResult, EdgeEffectDetector};
use crate::error::Result;
use crate::plate::PlateLayout;
use crate::polish::PolishConfig;
use crate::table::{DataFrame, TableSchema};

/// Parallel version of [`bscore_table`](crate::bscore::bscore_table).
///
/// # Errors
///
/// Same as the sequential function; input validation happens before any
/// plate is scored.
pub fn par_bscore_table<S: AsRef<str>>(
    table: &DataFrame,
    metrics: &[S],
    schema: &TableSchema,
    layout: &PlateLayout,
    config: &PolishConfig,
) -> Result<BScoreTable> {
    let batch = plan(table, metrics, schema, layout, config)?;
    let scored = batch
        .units()
        .into_par_iter()
        .map(|unit| score_unit(&batch, unit, layout, config).map(|r| (unit, r)))
        .collect::<Result<Vec<_>>>()?;
    assemble(table, &batch, scored)
}

/// Parallel version of
/// [`EdgeEffectDetector::detect_for_metrics`](crate::edge::EdgeEffectDetector::detect_for_metrics).
pub fn par_detect_for_metrics<S: AsRef<str>>(
    detector: &EdgeEffectDetector,
    table: &DataFrame,
    metrics: &[S],
    schema: &TableSchema,
    layout: &PlateLayout,
) -> Result<Vec<DiagnosticResult>> {
    let batch = detector.plan(table, metrics, schema, layout)?;
    batch
        .units()
        .into_par_iter()
        .map(|unit| detector.detect_unit(&batch, unit, layout))
        .collect()
}
