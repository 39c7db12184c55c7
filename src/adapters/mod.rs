//! Dataset ingestion for the CLI shell: JSON / CSV loading, column-name
//! normalization and the synthetic "Record Count" metric. The core engine
//! assumes these duties already happened.

use crate::domain::model::{Dataset, Record};
use crate::utils::error::{ForgeError, Result};
use std::collections::HashMap;
use std::path::Path;

pub const RECORD_COUNT_COLUMN: &str = "Record Count";

/// Loads a dataset from a file, picking the parser from `format` ("json",
/// "csv") or the file extension when "auto".
pub fn load_path<P: AsRef<Path>>(path: P, format: &str) -> Result<Dataset> {
    let path = path.as_ref();
    let resolved = match format {
        "auto" => match path.extension().and_then(|e| e.to_str()) {
            Some("json") => "json",
            Some("csv") => "csv",
            other => {
                return Err(ForgeError::UnsupportedFormat(format!(
                    "cannot infer format from extension {:?}",
                    other.unwrap_or("")
                )))
            }
        },
        "json" | "csv" => format,
        other => return Err(ForgeError::UnsupportedFormat(other.to_string())),
    };

    let content = std::fs::read_to_string(path)?;
    match resolved {
        "json" => load_json_str(&content),
        _ => load_csv_str(&content),
    }
}

/// Parses a JSON array of flat objects. Column order follows first
/// encounter; names are trimmed and de-duplicated.
pub fn load_json_str(content: &str) -> Result<Dataset> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = value.as_array().ok_or_else(|| ForgeError::ProcessingError {
        message: "expected a JSON array of objects".to_string(),
    })?;

    let mut columns: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        let obj = item.as_object().ok_or_else(|| ForgeError::ProcessingError {
            message: "expected every dataset row to be a JSON object".to_string(),
        })?;
        let mut data = HashMap::new();
        let mut seen_in_row: HashMap<String, usize> = HashMap::new();
        for (raw_key, cell) in obj {
            let name = unique_name(raw_key, &mut seen_in_row);
            if !columns.contains(&name) {
                columns.push(name.clone());
            }
            data.insert(name, cell.clone());
        }
        records.push(Record { data });
    }

    Ok(Dataset { columns, records })
}

/// Parses CSV with a header row. Numeric-looking cells become JSON numbers,
/// empty cells become null.
pub fn load_csv_str(content: &str) -> Result<Dataset> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let mut seen: HashMap<String, usize> = HashMap::new();
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| unique_name(h, &mut seen))
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut data = HashMap::new();
        for (name, cell) in columns.iter().zip(row.iter()) {
            data.insert(name.clone(), infer_cell(cell));
        }
        records.push(Record { data });
    }

    Ok(Dataset { columns, records })
}

/// Adds the count-of-one column the engine's count-based metrics rely on.
/// No-op when the dataset already carries one.
pub fn inject_record_count(dataset: &mut Dataset) {
    if dataset.has_column(RECORD_COUNT_COLUMN) {
        return;
    }
    dataset.columns.push(RECORD_COUNT_COLUMN.to_string());
    for record in &mut dataset.records {
        record
            .data
            .insert(RECORD_COUNT_COLUMN.to_string(), serde_json::Value::from(1));
    }
}

/// Trims a raw column name and suffixes duplicates with `_2`, `_3`, ...
fn unique_name(raw: &str, seen: &mut HashMap<String, usize>) -> String {
    let base = raw.trim().to_string();
    let n = seen.entry(base.clone()).or_insert(0);
    *n += 1;
    if *n == 1 {
        base
    } else {
        format!("{}_{}", base, n)
    }
}

fn infer_cell(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return serde_json::Value::from(f);
        }
    }
    serde_json::Value::String(trimmed.to_string())
}
