//! Row input and job output files.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::jobs::{BulkJob, Row};

/// Reads a JSON array of row objects from `path`.
pub async fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    parse_rows(&raw).with_context(|| format!("Invalid rows in {}", path.display()))
}

/// Parses a JSON array of flat objects into rows.
///
/// Numbers and booleans become their JSON text (barcodes are often exported
/// as numbers); `null` cells are dropped. Nested values are rejected.
pub fn parse_rows(raw: &str) -> Result<Vec<Row>> {
    let values: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(raw).context("Expected a JSON array of objects")?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, object)| {
            let mut row = Row::with_capacity(object.len());
            for (column, value) in object {
                let cell = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => continue,
                    Value::Array(_) | Value::Object(_) => bail!(
                        "Row {} column {:?} holds a nested value",
                        index + 1,
                        column
                    ),
                };
                row.insert(column, cell);
            }
            Ok(row)
        })
        .collect()
}

/// Writes `job` (results included) as pretty JSON.
pub async fn write_job(path: &Path, job: &BulkJob) -> Result<()> {
    let body = serde_json::to_vec_pretty(job).context("Failed to serialize job")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write results to {}", path.display()))
}
