//! Python bindings for plateqc.
//!
//! This module exposes B-scoring and edge-effect detection to Python using
//! PyO3. Plates are passed as lists of rows; `None` (or NaN) marks a missing
//! well. Enable the `python` feature to use this.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::bscore::compute_bscore;
use crate::edge::{
    generate_report, DetectorConfig, DiagnosticResult, EdgeEffectDetector, FlatValue,
};
use crate::error::Error;
use crate::plate::{MeasurementMatrix, PlateLayout};
use crate::polish::PolishConfig;

fn value_error(e: Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn matrix_from_rows(rows: Vec<Vec<Option<f64>>>) -> PyResult<MeasurementMatrix> {
    MeasurementMatrix::from_rows(rows).map_err(value_error)
}

fn rows_from_matrix(matrix: &MeasurementMatrix) -> Vec<Vec<Option<f64>>> {
    matrix
        .as_array()
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect()
}

/// Python wrapper for a B-score result
#[pyclass(name = "BScoreResult")]
pub struct PyBScoreResult {
    /// B-scores, `None` where missing or undefined
    #[pyo3(get)]
    pub scores: Vec<Vec<Option<f64>>>,
    /// Grand effect of the median polish
    #[pyo3(get)]
    pub grand_effect: f64,
    /// Row effects
    #[pyo3(get)]
    pub row_effects: Vec<f64>,
    /// Column effects
    #[pyo3(get)]
    pub col_effects: Vec<f64>,
    /// Whether median polish converged
    #[pyo3(get)]
    pub converged: bool,
    /// Degeneracy note, if any
    #[pyo3(get)]
    pub note: Option<String>,
}

/// Python wrapper for DiagnosticResult
#[pyclass(name = "DiagnosticResult")]
pub struct PyDiagnosticResult {
    inner: DiagnosticResult,
}

#[pymethods]
impl PyDiagnosticResult {
    /// Plate identifier.
    #[getter]
    fn plate_id(&self) -> String {
        self.inner.plate_id.clone()
    }

    /// Metric name.
    #[getter]
    fn metric(&self) -> String {
        self.inner.metric.clone()
    }

    /// Effect size (NaN if indeterminate).
    #[getter]
    fn effect_size(&self) -> f64 {
        self.inner.effect_size()
    }

    /// Warning level as "INFO", "WARN" or "CRITICAL".
    #[getter]
    fn warning_level(&self) -> &'static str {
        self.inner.warning_level.as_str()
    }

    /// Whether the effect size could not be evaluated.
    fn is_indeterminate(&self) -> bool {
        self.inner.is_indeterminate()
    }

    /// Flat record as a dict.
    fn to_dict(&self, py: Python<'_>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        for (key, value) in self.inner.to_flat_map() {
            match value {
                FlatValue::Text(s) => dict.set_item(key, s)?,
                FlatValue::Number(x) => dict.set_item(key, x)?,
                FlatValue::Count(n) => dict.set_item(key, n)?,
                FlatValue::Flag(b) => dict.set_item(key, b)?,
                FlatValue::Missing => dict.set_item(key, py.None())?,
            }
        }
        Ok(dict.into())
    }

    fn __repr__(&self) -> String {
        format!(
            "DiagnosticResult(plate_id={:?}, metric={:?}, effect_size={}, warning_level={})",
            self.inner.plate_id, self.inner.metric, self.inner.effect.d, self.inner.warning_level
        )
    }
}

/// Compute B-scores for one plate.
#[pyfunction]
#[pyo3(signature = (values, max_iterations=10, tolerance=1e-6))]
fn bscore(
    values: Vec<Vec<Option<f64>>>,
    max_iterations: usize,
    tolerance: f64,
) -> PyResult<PyBScoreResult> {
    let matrix = matrix_from_rows(values)?;
    let config = PolishConfig::default()
        .with_max_iterations(max_iterations)
        .with_tolerance(tolerance);
    let result = compute_bscore(&matrix, &config).map_err(value_error)?;

    Ok(PyBScoreResult {
        scores: rows_from_matrix(&result.scores),
        grand_effect: result.decomposition.grand_effect,
        row_effects: result.decomposition.row_effects.to_vec(),
        col_effects: result.decomposition.col_effects.to_vec(),
        converged: result.decomposition.converged,
        note: result.note.map(|n| n.to_string()),
    })
}

/// Diagnose edge effects on one plate.
#[pyfunction]
#[pyo3(signature = (
    values,
    metric="value",
    plate_id="plate",
    warn_threshold=0.8,
    critical_threshold=1.5,
    spatial_autocorrelation=true,
))]
fn detect(
    values: Vec<Vec<Option<f64>>>,
    metric: &str,
    plate_id: &str,
    warn_threshold: f64,
    critical_threshold: f64,
    spatial_autocorrelation: bool,
) -> PyResult<PyDiagnosticResult> {
    let matrix = matrix_from_rows(values)?;
    let layout = matrix.layout().map_err(value_error)?;
    let config = DetectorConfig::default()
        .with_thresholds(warn_threshold, critical_threshold)
        .with_spatial_autocorrelation(spatial_autocorrelation);
    let detector = EdgeEffectDetector::try_new(config).map_err(value_error)?;
    let inner = detector
        .detect(&matrix, &layout, metric, plate_id)
        .map_err(value_error)?;
    Ok(PyDiagnosticResult { inner })
}

/// Summarize diagnoses into report recommendations.
#[pyfunction]
fn recommendations(
    py: Python<'_>,
    results: Vec<PyRef<'_, PyDiagnosticResult>>,
) -> PyResult<PyObject> {
    let results: Vec<DiagnosticResult> = results.iter().map(|r| r.inner.clone()).collect();
    let report = generate_report(&results);
    Ok(PyList::new(py, report.recommendations).into())
}

/// Standard plate shape `(rows, cols)` for a well count.
#[pyfunction]
fn plate_shape(wells: usize) -> PyResult<(usize, usize)> {
    PlateLayout::standard(wells)
        .map(|layout| layout.shape())
        .map_err(value_error)
}

/// The plateqc Python module.
#[pymodule]
fn plateqc(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyBScoreResult>()?;
    m.add_class::<PyDiagnosticResult>()?;
    m.add_function(wrap_pyfunction!(bscore, m)?)?;
    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add_function(wrap_pyfunction!(recommendations, m)?)?;
    m.add_function(wrap_pyfunction!(plate_shape, m)?)?;
    Ok(())
}
