//! # plateqc
//!
//! Robust spatial-bias correction and edge-effect diagnostics for multi-well
//! assay plates.
//!
//! ## Overview
//!
//! Screening plates carry systematic artifacts (evaporation at the rim,
//! dispensing drift, row and column gradients) on top of the biological
//! signal. This library provides:
//! - **Grid mapping** between well-level tables and dense plate matrices
//! - **Median polish**: robust two-way decomposition into grand, row and column effects
//! - **B-scores**: median-polish residuals standardized by their scaled MAD
//! - **Edge-effect detection**: edge-versus-interior effect size, row/column
//!   trends, corner deviations and Moran's I, classified INFO/WARN/CRITICAL
//! - **Reports** aggregating many plates, including raw-versus-corrected comparison
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::Array2;
//! use plateqc::prelude::*;
//!
//! let layout = PlateLayout::standard(96).unwrap();
//! let values = Array2::from_shape_fn(layout.shape(), |(r, c)| {
//!     let noise = ((r as f64) * 12.9898 + (c as f64) * 78.233).sin();
//!     let rim = if layout.is_edge(r, c) { 4.0 } else { 0.0 };
//!     50.0 + r as f64 + noise + rim
//! });
//! let matrix = MeasurementMatrix::from_values(&values);
//!
//! // Diagnose the raw plate
//! let detector = EdgeEffectDetector::default();
//! let raw = detector.detect(&matrix, &layout, "signal", "P1").unwrap();
//! assert!(raw.warning_level >= WarningLevel::Warn);
//!
//! // B-score it
//! let scored = compute_bscore(&matrix, &PolishConfig::default()).unwrap();
//! assert!(scored.note.is_none());
//! assert_eq!(scored.scores.shape(), (8, 12));
//! ```
//!
//! ## Missing data
//!
//! Wells without a measurement are `None` in a [`MeasurementMatrix`]; non-finite
//! inputs are treated the same way. Missing wells never contribute to a median,
//! a MAD, a correlation or a neighbour pair.
//!
//! ## Features
//!
//! - `serde`: Serialization of configurations and results, plus JSON export
//! - `parallel`: Batch B-scoring and detection across plates using rayon
//! - `python`: Python bindings via PyO3
//!
//! [`MeasurementMatrix`]: plate::MeasurementMatrix

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod bscore;
pub mod edge;
pub mod error;
pub mod grid;
pub mod plate;
pub mod polish;
#[cfg(feature = "python")]
pub mod python;
pub mod stats;
pub mod table;

#[cfg(feature = "parallel")]
pub mod parallel;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bscore::{
        bscore_table, compute_bscore, metrics_with_prefix, BScoreMatrix, BScoreNote, BScoreTable,
        Hit,
    };
    pub use crate::edge::{
        correction_efficacy, generate_report, DetectorConfig, DiagnosticResult, EdgeEffectDetector,
        EdgeEffectReport, SpatialAutocorrelation, WarningLevel,
    };
    pub use crate::error::{Error, Result};
    pub use crate::grid::{to_matrix, to_rows, WellRecord};
    pub use crate::plate::{MeasurementMatrix, PlateLayout, Well};
    pub use crate::polish::{median_polish, Decomposition, MedianPolish, PolishConfig};
    pub use crate::table::{DataFrame, ScreenFrame, TableSchema};

    #[cfg(feature = "parallel")]
    pub use crate::parallel::{par_bscore_table, par_detect_for_metrics};
}

// Re-export commonly used items at crate root
pub use bscore::{bscore_table, compute_bscore};
pub use edge::{generate_report, EdgeEffectDetector};
pub use error::{Error, Result};
pub use polish::median_polish;

#[cfg(feature = "parallel")]
pub use parallel::{par_bscore_table, par_detect_for_metrics};
