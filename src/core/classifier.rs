use crate::config::keywords::{name_matches, KeywordTables};
use crate::domain::model::{Analysis, Cell, ColumnProfile, Dataset, SemanticType};
use crate::utils::stats;
use std::collections::HashSet;

/// Assigns each column a semantic type and categorical flag, producing the
/// per-dataset Analysis the selector works from.
pub struct TypeClassifier<'a> {
    keywords: &'a KeywordTables,
}

impl<'a> TypeClassifier<'a> {
    pub fn new(keywords: &'a KeywordTables) -> Self {
        Self { keywords }
    }

    pub fn analyze(&self, dataset: &Dataset) -> Analysis {
        let row_count = dataset.row_count();
        let columns = dataset
            .columns
            .iter()
            .map(|name| {
                let cells = dataset.column_cells(name);
                self.classify(&cells, name, row_count)
            })
            .collect();

        Analysis { columns, row_count }
    }

    pub fn classify(&self, cells: &[Cell], name: &str, row_count: usize) -> ColumnProfile {
        let non_null: Vec<&Cell> = cells.iter().filter(|c| !c.is_null()).collect();
        let null_count = cells.len() - non_null.len();
        let unique_count = distinct_count(&non_null);

        let semantic_type = self.semantic_type(&non_null, name, unique_count, row_count);

        let unique_ratio = if row_count > 0 {
            unique_count as f64 / row_count as f64
        } else {
            0.0
        };
        let is_categorical = match semantic_type {
            SemanticType::String => unique_count < 50 || unique_ratio < 0.05,
            SemanticType::Numeric => unique_count < 10,
            SemanticType::Id | SemanticType::Date => false,
        };

        let (min, max, mean) = if semantic_type == SemanticType::Numeric {
            numeric_stats(&non_null)
        } else {
            (None, None, None)
        };

        ColumnProfile {
            name: name.to_string(),
            semantic_type,
            is_categorical,
            unique_count,
            null_count,
            min,
            max,
            mean,
        }
    }

    fn semantic_type(
        &self,
        non_null: &[&Cell],
        name: &str,
        unique_count: usize,
        row_count: usize,
    ) -> SemanticType {
        if !non_null.is_empty() && non_null.iter().all(|c| matches!(c, Cell::Number(_))) {
            let all_integral = non_null
                .iter()
                .all(|c| matches!(c, Cell::Number(n) if n.fract() == 0.0));
            let id_name = name_matches(name, &self.keywords.identifier);
            if all_integral && unique_count == row_count && id_name {
                return SemanticType::Id;
            }
            return SemanticType::Numeric;
        }

        if !non_null.is_empty() && non_null.iter().all(|c| matches!(c, Cell::Date(_))) {
            return SemanticType::Date;
        }

        // Date coercion on text values: 80% of non-null cells must parse.
        let parseable = non_null.iter().filter(|c| c.as_date().is_some()).count();
        if !non_null.is_empty() && parseable as f64 >= non_null.len() as f64 * 0.8 {
            return SemanticType::Date;
        }

        SemanticType::String
    }
}

fn distinct_count(non_null: &[&Cell]) -> usize {
    let mut seen = HashSet::new();
    for cell in non_null {
        let key = match cell {
            Cell::Number(n) => format!("n:{}", n.to_bits()),
            Cell::Text(s) => format!("t:{}", s),
            Cell::Date(d) => format!("d:{}", d),
            Cell::Null => continue,
        };
        seen.insert(key);
    }
    seen.len()
}

/// min/max/mean of a numeric column. Any degenerate case collapses to zeros
/// instead of propagating an error.
fn numeric_stats(non_null: &[&Cell]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let values: Vec<f64> = non_null.iter().filter_map(|c| c.as_f64()).collect();
    if values.is_empty() {
        return (Some(0.0), Some(0.0), Some(0.0));
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = stats::mean(&values).unwrap_or(0.0);
    if !min.is_finite() || !max.is_finite() || !mean.is_finite() {
        return (Some(0.0), Some(0.0), Some(0.0));
    }
    (Some(min), Some(max), Some(mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn classify(cells: Vec<Cell>, name: &str) -> ColumnProfile {
        let keywords = KeywordTables::default();
        let row_count = cells.len();
        TypeClassifier::new(&keywords).classify(&cells, name, row_count)
    }

    fn numbers(values: &[f64]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Number(*v)).collect()
    }

    #[test]
    fn integral_unique_id_named_column_is_id() {
        let profile = classify(numbers(&[1.0, 2.0, 3.0, 4.0]), "user_id");
        assert_eq!(profile.semantic_type, SemanticType::Id);
        assert!(!profile.is_categorical);
        assert_eq!(profile.min, None);
    }

    #[test]
    fn id_requires_all_three_conditions() {
        // duplicate values
        let p = classify(numbers(&[1.0, 2.0, 2.0, 4.0]), "user_id");
        assert_eq!(p.semantic_type, SemanticType::Numeric);
        // no identifier keyword in the name
        let p = classify(numbers(&[1.0, 2.0, 3.0, 4.0]), "temperature");
        assert_eq!(p.semantic_type, SemanticType::Numeric);
        // non-integral values
        let p = classify(numbers(&[1.5, 2.5, 3.5, 4.5]), "user_id");
        assert_eq!(p.semantic_type, SemanticType::Numeric);
    }

    #[test]
    fn numeric_stats_are_computed() {
        let profile = classify(numbers(&[10.0, 20.0, 30.0]), "Price");
        assert_eq!(profile.semantic_type, SemanticType::Numeric);
        assert_eq!(profile.min, Some(10.0));
        assert_eq!(profile.max, Some(30.0));
        assert_eq!(profile.mean, Some(20.0));
    }

    #[test]
    fn low_cardinality_numeric_is_categorical() {
        let cells: Vec<Cell> = (0..100).map(|i| Cell::Number((i % 3) as f64)).collect();
        let profile = classify(cells, "rating");
        assert_eq!(profile.semantic_type, SemanticType::Numeric);
        assert!(profile.is_categorical);
    }

    #[test]
    fn text_dates_above_threshold_classify_as_date() {
        let mut cells: Vec<Cell> = (1..=9)
            .map(|d| Cell::Text(format!("2024-03-{:02}", d)))
            .collect();
        cells.push(Cell::Text("garbage".to_string()));
        let profile = classify(cells, "order_date");
        assert_eq!(profile.semantic_type, SemanticType::Date);
        assert!(!profile.is_categorical);
    }

    #[test]
    fn text_dates_below_threshold_stay_string() {
        let cells = vec![
            Cell::Text("2024-03-01".to_string()),
            Cell::Text("north".to_string()),
            Cell::Text("south".to_string()),
            Cell::Text("east".to_string()),
        ];
        let profile = classify(cells, "region");
        assert_eq!(profile.semantic_type, SemanticType::String);
        assert!(profile.is_categorical);
    }

    #[test]
    fn typed_date_cells_classify_as_date() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let profile = classify(vec![Cell::Date(d), Cell::Date(d)], "when");
        assert_eq!(profile.semantic_type, SemanticType::Date);
    }

    #[test]
    fn string_with_high_cardinality_is_not_categorical() {
        let cells: Vec<Cell> = (0..200).map(|i| Cell::Text(format!("name-{}", i))).collect();
        let profile = classify(cells, "customer");
        assert_eq!(profile.semantic_type, SemanticType::String);
        assert!(!profile.is_categorical);
    }

    #[test]
    fn null_and_unique_counts_are_bounded() {
        let cells = vec![Cell::Number(1.0), Cell::Null, Cell::Number(1.0), Cell::Null];
        let profile = classify(cells, "score");
        assert_eq!(profile.null_count, 2);
        assert_eq!(profile.unique_count, 1);
    }

    #[test]
    fn empty_column_defaults() {
        let keywords = KeywordTables::default();
        let profile = TypeClassifier::new(&keywords).classify(&[], "anything", 0);
        assert_eq!(profile.semantic_type, SemanticType::String);
        assert_eq!(profile.unique_count, 0);
        assert_eq!(profile.null_count, 0);
    }

    #[test]
    fn analyze_preserves_column_order_and_row_count() {
        let mut records = Vec::new();
        for i in 0..5 {
            let mut data = std::collections::HashMap::new();
            data.insert("b".to_string(), serde_json::json!(i));
            data.insert("a".to_string(), serde_json::json!("x"));
            records.push(crate::domain::model::Record { data });
        }
        let dataset = Dataset {
            columns: vec!["b".to_string(), "a".to_string()],
            records,
        };
        let keywords = KeywordTables::default();
        let analysis = TypeClassifier::new(&keywords).analyze(&dataset);
        assert_eq!(analysis.row_count, 5);
        assert_eq!(analysis.columns[0].name, "b");
        assert_eq!(analysis.columns[1].name, "a");
    }
}
