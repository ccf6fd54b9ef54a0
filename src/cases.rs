//! Case files: one expected/actual record pair per JSON file.
//!
//! ```json
//! { "document_id": "invoice-001", "expected": { ... }, "actual": { ... } }
//! ```

use crate::error::{AccuracyError, Result};
use crate::evaluator::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// An expected/actual pair for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCase {
    pub document_id: String,
    pub expected: Record,
    pub actual: Record,
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    document_id: Option<String>,
    expected: Option<Value>,
    actual: Option<Value>,
}

impl EvaluationCase {
    pub fn new(document_id: impl Into<String>, expected: Record, actual: Record) -> Self {
        Self {
            document_id: document_id.into(),
            expected,
            actual,
        }
    }
}

/// Load one case file. The document id defaults to the file stem.
pub fn load_case(path: &Path) -> Result<EvaluationCase> {
    let content = fs::read_to_string(path).map_err(|e| AccuracyError::io(path, e))?;
    let file: CaseFile = serde_json::from_str(&content).map_err(|e| invalid(path, e.to_string()))?;

    let document_id = file.document_id.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(EvaluationCase {
        document_id,
        expected: record(path, "expected", file.expected)?,
        actual: record(path, "actual", file.actual)?,
    })
}

/// Load a bare record (a JSON object) from a file.
pub fn load_record(path: &Path) -> Result<Record> {
    let content = fs::read_to_string(path).map_err(|e| AccuracyError::io(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| invalid(path, e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(invalid(path, format!("expected a JSON object, found {}", kind(&other)))),
    }
}

/// All `*.json` files under `dir`, sorted by path.
pub fn discover_cases(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AccuracyError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path.to_path_buf());
        }
    }

    debug!(dir = %dir.display(), count = paths.len(), "discovered case files");
    Ok(paths)
}

fn record(path: &Path, side: &str, value: Option<Value>) -> Result<Record> {
    match value {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(invalid(
            path,
            format!("'{side}' must be an object, found {}", kind(&other)),
        )),
        None => Err(invalid(path, format!("missing '{side}' record"))),
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> AccuracyError {
    AccuracyError::InvalidCase {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
