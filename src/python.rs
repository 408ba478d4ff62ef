//! Python bindings for conllx-eval
//!
//! This module provides PyO3-based Python bindings for the Rust core. An
//! alignment oracle can be supplied from Python as any callable taking the
//! two oracle sentences and returning `(left, right)` index pairs.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::align::{AlignmentDecision, AlignmentOracle, LcsOracle, OracleError, Pairing};
use crate::conllx::{FormatError, HeaderKind, parse};
use crate::corpus::{CorpusError, load_corpus};
use crate::score::{EvalConfig, Evaluator, ScoreError};
use crate::tree::Corpus;

/// Convert CorpusError to Python exception
impl From<CorpusError> for PyErr {
    fn from(err: CorpusError) -> PyErr {
        match err {
            CorpusError::Io { .. } => PyIOError::new_err(err.to_string()),
            CorpusError::Format { .. } => PyValueError::new_err(err.to_string()),
        }
    }
}

impl From<FormatError> for PyErr {
    fn from(err: FormatError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<ScoreError> for PyErr {
    fn from(err: ScoreError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Oracle backed by a Python callable
struct PyOracle {
    callable: Py<PyAny>,
}

impl AlignmentOracle for PyOracle {
    fn align(&self, left: &str, right: &str) -> Result<AlignmentDecision, OracleError> {
        Python::attach(|py| {
            let pairs: Vec<(Option<usize>, Option<usize>)> = self
                .callable
                .bind(py)
                .call1((left, right))
                .and_then(|result| result.extract().map_err(Into::into))
                .map_err(|e| OracleError(e.to_string()))?;
            Ok(pairs.into_iter().map(Pairing::from).collect())
        })
    }
}

fn evaluator(oracle: Option<Py<PyAny>>) -> Evaluator<Box<dyn AlignmentOracle>> {
    let oracle: Box<dyn AlignmentOracle> = match oracle {
        Some(callable) => Box::new(PyOracle { callable }),
        None => Box::new(LcsOracle),
    };
    Evaluator::new(oracle, EvalConfig::default())
}

fn score_corpora(
    py: Python<'_>,
    gold: &Corpus,
    parsed: &Corpus,
    oracle: Option<Py<PyAny>>,
) -> PyResult<HashMap<String, f64>> {
    let evaluator = evaluator(oracle);
    let report = py.detach(|| evaluator.score(gold, parsed))?;

    let mut scores: HashMap<String, f64> = report
        .metrics()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    scores.extend(
        report
            .counts()
            .into_iter()
            .map(|(name, count)| (name.to_string(), count as f64)),
    );
    Ok(scores)
}

/// Merge clitic tokens back into orthographic words.
///
/// Args:
///     tokens: token forms, clitics marked with "+"
///
/// Returns:
///     list of words
///
/// Raises:
///     ValueError: if the clitic sequence is invalid
#[pyfunction(name = "resegment")]
fn py_resegment(tokens: Vec<String>) -> PyResult<Vec<String>> {
    crate::resegment::resegment(&tokens).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Score a parsed corpus against a gold corpus, both given as text.
///
/// Args:
///     gold: gold CoNLL-X text
///     parsed: parsed CoNLL-X text
///     header: "conllx" (10 columns) or "catib" (6 columns)
///     oracle: optional callable (str, str) -> list[tuple[int | None, int | None]]
///
/// Returns:
///     dict of metric name to value
#[pyfunction]
#[pyo3(signature = (gold, parsed, header="conllx", oracle=None))]
fn evaluate(
    py: Python<'_>,
    gold: &str,
    parsed: &str,
    header: &str,
    oracle: Option<Py<PyAny>>,
) -> PyResult<HashMap<String, f64>> {
    let header: HeaderKind = header.parse()?;
    let gold = parse(gold, header)?;
    let parsed = parse(parsed, header)?;
    score_corpora(py, &gold, &parsed, oracle)
}

/// Score a parsed corpus file against a gold corpus file.
///
/// Automatically detects and handles gzip-compressed files (.gz).
#[pyfunction]
#[pyo3(signature = (gold_path, parsed_path, header="conllx", oracle=None))]
fn evaluate_files(
    py: Python<'_>,
    gold_path: &str,
    parsed_path: &str,
    header: &str,
    oracle: Option<Py<PyAny>>,
) -> PyResult<HashMap<String, f64>> {
    let header: HeaderKind = header.parse()?;
    let gold = load_corpus(gold_path, header)?;
    let parsed = load_corpus(parsed_path, header)?;
    score_corpora(py, &gold, &parsed, oracle)
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn conllx_eval(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_resegment, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_files, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
