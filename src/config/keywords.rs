use crate::utils::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Keyword tables driving the heuristic branching. Defaults cover common
/// English business datasets; any table can be overridden from a TOML file
/// without touching the selection logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    /// Metric names that always win primary-metric selection.
    pub high_priority_metrics: Vec<String>,
    /// Metric names tried after the high-priority table.
    pub medium_priority_metrics: Vec<String>,
    /// Substrings marking a column as an identifier.
    pub identifier: Vec<String>,
    /// Demographic categories preferred for composition charts.
    pub demographic: Vec<String>,
    /// Names confirming a date-classified column really is a timeline.
    pub date_like: Vec<String>,
    /// Maintenance branch: columns excluded from sensor metrics.
    pub maintenance_exclude: Vec<String>,
    /// Maintenance branch: device/category column names.
    pub device: Vec<String>,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            high_priority_metrics: to_vec(&["emission", "revenue", "sales", "profit", "cost"]),
            medium_priority_metrics: to_vec(&[
                "amount", "price", "value", "score", "salary", "expense",
            ]),
            identifier: to_vec(&["id", "key", "code", "index", "pk"]),
            demographic: to_vec(&["gender", "sex", "demographic"]),
            date_like: to_vec(&[
                "date",
                "day",
                "month",
                "year",
                "created",
                "updated",
                "timestamp",
            ]),
            maintenance_exclude: to_vec(&["failure", "record count", "id", "year", "udi", "no"]),
            device: to_vec(&["device", "machine", "type", "product"]),
        }
    }
}

fn to_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl KeywordTables {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ForgeError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ForgeError::ConfigError {
            message: format!("keyword table parsing error: {}", e),
        })
    }
}

/// Case-insensitive "name contains any keyword" check used everywhere the
/// heuristics branch on column names.
pub fn name_matches(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k.as_str()))
}
