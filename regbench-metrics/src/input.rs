//! Loading persisted operation records.

use std::path::{Path, PathBuf};

use regbench_types::OperationRecord;
use serde_json::Value;
use thiserror::Error;

/// Name of the field wrapping the records in object-shaped input.
const RECORDS_FIELD: &str = "records";

/// Errors loading the input file.
///
/// All of these are fatal for an invocation, and no output is produced.
#[derive(Debug, Error)]
pub enum InputError {
    /// The input file does not exist.
    #[error("input file not found: {}", path.display())]
    NotFound {
        /// The path that was given.
        path: PathBuf,
    },
    /// The input file exists but could not be read.
    #[error("failed to read input file {}", path.display())]
    Io {
        /// The path that was given.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The input is not valid JSON.
    #[error("input is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// The input is valid JSON, but neither an array nor an object with a `records` array.
    #[error("expected a JSON array of records or an object with a `records` array")]
    Shape,
    /// None of the array elements is a record with an `iter` field.
    #[error("no records with `iter` found ({skipped} invalid elements skipped)")]
    NoRecords {
        /// Number of elements that were not valid records.
        skipped: usize,
    },
}

/// The valid records of an input file.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Records in file order.
    pub records: Vec<OperationRecord>,
    /// Number of array elements that were not valid records.
    pub skipped: usize,
}

/// Reads and validates the records in the JSON file at `path`.
pub fn load_records(path: &Path) -> Result<Dataset, InputError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            InputError::NotFound {
                path: path.to_owned(),
            }
        } else {
            InputError::Io {
                path: path.to_owned(),
                source,
            }
        }
    })?;

    parse_records(&contents)
}

/// Parses records from a JSON document.
///
/// Accepts a bare array or an object wrapping the array in a `records` field. Elements that are not
/// valid records are skipped with a warning and counted in [`Dataset::skipped`].
pub fn parse_records(json: &str) -> Result<Dataset, InputError> {
    let elements = match serde_json::from_str(json)? {
        Value::Array(elements) => elements,
        Value::Object(mut object) => match object.remove(RECORDS_FIELD) {
            Some(Value::Array(elements)) => elements,
            _ => return Err(InputError::Shape),
        },
        _ => return Err(InputError::Shape),
    };

    let mut dataset = Dataset::default();
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<OperationRecord>(element) {
            Ok(record) => dataset.records.push(record),
            Err(error) => {
                tracing::warn!(index, %error, "skipping invalid record");
                dataset.skipped += 1;
            }
        }
    }

    if dataset.records.is_empty() {
        return Err(InputError::NoRecords {
            skipped: dataset.skipped,
        });
    }

    Ok(dataset)
}
