use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the uploaded dataset. Cells stay as raw JSON values until the
/// classifier resolves a semantic type per column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }
}

/// Uniform-shaped tabular dataset. `columns` preserves the input column
/// order; records may omit a column, which reads as null.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// All cells of one column, in row order, resolved to tagged values.
    pub fn column_cells(&self, name: &str) -> Vec<Cell> {
        self.records
            .iter()
            .map(|r| Cell::from_value(r.get(name)))
            .collect()
    }
}

/// Tagged cell value. Raw JSON cells are resolved into this once so the
/// selector and aggregator never re-inspect `serde_json::Value` shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Null,
}

impl Cell {
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Cell::Null,
            Some(serde_json::Value::Number(n)) => match n.as_f64() {
                Some(f) if f.is_finite() => Cell::Number(f),
                _ => Cell::Null,
            },
            Some(serde_json::Value::Bool(b)) => Cell::Number(if *b { 1.0 } else { 0.0 }),
            Some(serde_json::Value::String(s)) => Cell::Text(s.clone()),
            Some(other) => Cell::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Stable string form used as a grouping key. Integral numbers render
    /// without a fractional part so that 0/1 flag columns group as "0"/"1".
    pub fn group_key(&self) -> Option<String> {
        match self {
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Date(d) => Some(d.to_string()),
            Cell::Null => None,
        }
    }

    /// JSON value for chart payloads, preserving the original flavor.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Number(n) => number_value(*n),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Date(d) => serde_json::Value::String(d.to_string()),
            Cell::Null => serde_json::Value::Null,
        }
    }
}

/// f64 -> JSON number, emitting integers without a trailing ".0".
pub fn number_value(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Value::from(n)
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Best-effort coercion of free text to a calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in DATE_FORMATS {
        if fmt.contains("%H") {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Some(dt.date());
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Id,
    Date,
    String,
}

/// Inferred semantic description of one dataset column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub is_categorical: bool,
    pub unique_count: usize,
    pub null_count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Full per-dataset classification result, in input column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub columns: Vec<ColumnProfile>,
    pub row_count: usize,
}

impl Analysis {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "treemap")]
    Treemap,
    #[serde(rename = "histogram")]
    Histogram,
    #[serde(rename = "boxPlot")]
    BoxPlot,
    #[serde(rename = "scatter")]
    Scatter,
    #[serde(rename = "radar")]
    Radar,
}

/// Tells the aggregator which grouping/sampling procedure materializes a
/// chart's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggDirective {
    Mean,
    SumByCategory,
    RadarMean,
    MultiBarMean,
    ScatterGroup,
    DateBucket,
    RawSample,
    QuantileByGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(rename = "dataKey")]
    pub data_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Value>>,
}

pub type DataRow = serde_json::Map<String, serde_json::Value>;

/// A selected chart recommendation. `data` is populated by the aggregator;
/// a failed aggregation leaves it absent rather than failing the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(rename = "dataKey", skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    #[serde(rename = "nameKey", skip_serializing_if = "Option::is_none")]
    pub name_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<Series>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_col: Option<String>,
    #[serde(rename = "agg_type", skip_serializing_if = "Option::is_none")]
    pub agg: Option<AggDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataRow>>,
}

impl ChartSpec {
    pub fn new(chart_type: ChartType, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            chart_type,
            title: title.into(),
            description: description.into(),
            x: None,
            y: None,
            data_key: None,
            name_key: None,
            series: None,
            metrics: None,
            group_col: None,
            agg: None,
            data: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiType {
    Total,
    Average,
    Count,
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KpiValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A single labeled summary statistic surfaced alongside the charts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub value: KpiValue,
    #[serde(rename = "type")]
    pub kpi_type: KpiType,
}

impl Kpi {
    pub fn new(label: impl Into<String>, value: KpiValue, kpi_type: KpiType) -> Self {
        Self {
            label: label.into(),
            value,
            kpi_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "rowCount")]
    pub row_count: usize,
}

/// Final engine output handed back to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub analysis: Analysis,
    pub charts: Vec<ChartSpec>,
    pub kpis: Vec<Kpi>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_resolves_json_flavors() {
        assert_eq!(Cell::from_value(Some(&serde_json::json!(3.5))), Cell::Number(3.5));
        assert_eq!(Cell::from_value(Some(&serde_json::json!(true))), Cell::Number(1.0));
        assert_eq!(
            Cell::from_value(Some(&serde_json::json!("hello"))),
            Cell::Text("hello".to_string())
        );
        assert_eq!(Cell::from_value(Some(&serde_json::Value::Null)), Cell::Null);
        assert_eq!(Cell::from_value(None), Cell::Null);
    }

    #[test]
    fn group_key_renders_flags_without_fraction() {
        assert_eq!(Cell::Number(0.0).group_key().as_deref(), Some("0"));
        assert_eq!(Cell::Number(1.0).group_key().as_deref(), Some("1"));
        assert_eq!(Cell::Number(2.5).group_key().as_deref(), Some("2.5"));
        assert_eq!(Cell::Null.group_key(), None);
    }

    #[test]
    fn parse_date_accepts_common_layouts() {
        assert_eq!(
            parse_date("2023-06-15"),
            NaiveDate::from_ymd_opt(2023, 6, 15)
        );
        assert_eq!(
            parse_date("06/15/2023"),
            NaiveDate::from_ymd_opt(2023, 6, 15)
        );
        assert_eq!(
            parse_date("2023-06-15T10:30:00Z"),
            NaiveDate::from_ymd_opt(2023, 6, 15)
        );
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn dataset_missing_fields_read_as_null() {
        let mut data = HashMap::new();
        data.insert("a".to_string(), serde_json::json!(1));
        let dataset = Dataset {
            columns: vec!["a".to_string(), "b".to_string()],
            records: vec![Record { data }],
        };
        assert_eq!(dataset.column_cells("b"), vec![Cell::Null]);
    }

    #[test]
    fn kpi_value_serializes_untagged() {
        let kpi = Kpi::new("Failure Rate", KpiValue::Text("5.0000%".into()), KpiType::Percentage);
        let json = serde_json::to_value(&kpi).unwrap();
        assert_eq!(json["value"], serde_json::json!("5.0000%"));
        assert_eq!(json["type"], serde_json::json!("percentage"));
    }
}
