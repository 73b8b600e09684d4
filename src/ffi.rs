//! Python FFI bindings via PyO3.
//!
//! Lets the Python I/O layer (CSV reading, column aliasing, CLI) hand rows to
//! the Rust core and get output rows back as dictionaries keyed by the output
//! column names.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! import json
//! from kinship_core import Pipeline, process_rows, OUTPUT_COLUMNS
//!
//! rows = [
//!     {"name": "Bee Guild", "scope": "our city", "kinships": "Moss Choir",
//!      "openness": "7", "practices": "weekly meetings"},
//!     ...
//! ]
//! out = process_rows(rows)                       # offline, rule-based only
//! out = process_rows(rows, row_payloads=json.dumps(answers))
//!
//! pipeline = Pipeline('{"energy": {"lambda": 0.3}}')
//! out = pipeline.process_rows(rows)
//! print(out[0]["Color"])                         # "#RRGGBB"
//! ```
//!
//! `row_payloads` and `link_payloads` are JSON arrays with one object per
//! input row. A payload that does not parse, or whose length differs from the
//! row count, sends every row down the rule-based path.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::PipelineConfig;
use crate::error::Error;
use crate::hash;
use crate::pipeline::Pipeline;
use crate::record::OutputRow;
use crate::signals::{validate_batch_str, LinkSignals, Precomputed, RowSignals, SurveyRow};

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::InvariantViolation { .. } => PyRuntimeError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Read one text cell; missing keys and `None` become the empty string.
fn cell(row: &Bound<'_, PyDict>, key: &str) -> PyResult<String> {
    match row.get_item(key)? {
        Some(value) if !value.is_none() => Ok(value.str()?.to_string()),
        _ => Ok(String::new()),
    }
}

fn survey_row(row: &Bound<'_, PyDict>) -> PyResult<SurveyRow> {
    Ok(SurveyRow {
        name: cell(row, "name")?,
        values: cell(row, "values")?,
        kinships: cell(row, "kinships")?,
        knowledgebase: cell(row, "knowledgebase")?,
        openness: cell(row, "openness")?,
        scope: cell(row, "scope")?,
        practices: cell(row, "practices")?,
        own_words: cell(row, "own_words")?,
    })
}

fn output_dict<'py>(py: Python<'py>, row: &OutputRow) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new_bound(py);
    d.set_item("Name", &row.name)?;
    d.set_item("Kinships", &row.kinships)?;
    d.set_item("Affiliation", &row.affiliation)?;
    d.set_item("Knowledgebase", row.knowledgebase)?;
    d.set_item("Openness", row.openness)?;
    d.set_item("Scope", &row.scope)?;
    d.set_item("Sides", row.sides)?;
    d.set_item("InteriorParticleCount", row.interior_particle_count)?;
    d.set_item("ParticlesPerEdge", row.particles_per_edge)?;
    d.set_item("BorderParticleCount", row.border_particle_count)?;
    d.set_item("TotalParticleCount", row.total_particle_count)?;
    d.set_item("Color", &row.color)?;
    Ok(d)
}

fn run<'py>(
    py: Python<'py>,
    pipeline: &Pipeline,
    rows: Vec<Bound<'py, PyDict>>,
    row_payloads: Option<&str>,
    link_payloads: Option<&str>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let survey: Vec<SurveyRow> = rows.iter().map(survey_row).collect::<PyResult<_>>()?;
    let n = survey.len();
    let mut source = Precomputed::new();
    if let Some(text) = row_payloads {
        source = source.with_rows(validate_batch_str(text, n, RowSignals::from_json));
    }
    if let Some(text) = link_payloads {
        source = source.with_links(validate_batch_str(text, n, LinkSignals::from_json));
    }
    let out = py.allow_threads(|| pipeline.run_rows(&survey, &source)).map_err(to_py_err)?;
    out.iter().map(|row| output_dict(py, row)).collect()
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// A configured derivation pipeline.
///
/// Args:
///     config_json: optional JSON document overriding any subset of the
///                  default configuration.
#[pyclass(name = "Pipeline")]
pub struct PyPipeline {
    inner: Pipeline,
}

#[pymethods]
impl PyPipeline {
    /// Build a pipeline, validating the configuration.
    #[new]
    #[pyo3(signature = (config_json=None))]
    pub fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(text) => PipelineConfig::from_json_str(text).map_err(to_py_err)?,
            None => PipelineConfig::default(),
        };
        Ok(Self { inner: Pipeline::new(config).map_err(to_py_err)? })
    }

    /// Process rows (list of dicts with lowercase field keys).
    #[pyo3(signature = (rows, row_payloads=None, link_payloads=None))]
    pub fn process_rows<'py>(
        &self,
        py: Python<'py>,
        rows: Vec<Bound<'py, PyDict>>,
        row_payloads: Option<&str>,
        link_payloads: Option<&str>,
    ) -> PyResult<Vec<Bound<'py, PyDict>>> {
        run(py, &self.inner, rows, row_payloads, link_payloads)
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!("Pipeline({:?})", self.inner.config())
    }
}

// ── Functions ────────────────────────────────────────────────────────────────

/// Process rows with the default configuration.
#[pyfunction]
#[pyo3(signature = (rows, row_payloads=None, link_payloads=None))]
pub fn process_rows<'py>(
    py: Python<'py>,
    rows: Vec<Bound<'py, PyDict>>,
    row_payloads: Option<&str>,
    link_payloads: Option<&str>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    run(py, &Pipeline::default(), rows, row_payloads, link_payloads)
}

/// Stable 64-bit hash used for every tie-break.
#[pyfunction]
pub fn stable_hash(text: &str) -> u64 {
    hash::stable_hash(text)
}

// ── Module entry point ───────────────────────────────────────────────────────

/// kinship-core Python bindings.
#[pymodule]
pub fn kinship_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPipeline>()?;
    m.add_function(wrap_pyfunction!(process_rows, m)?)?;
    m.add_function(wrap_pyfunction!(stable_hash, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("OUTPUT_COLUMNS", OutputRow::COLUMNS.to_vec())?;
    Ok(())
}
