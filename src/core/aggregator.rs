use crate::domain::model::{
    number_value, AggDirective, Cell, ChartSpec, ChartType, DataRow, Dataset,
};
use crate::utils::error::{ForgeError, Result};
use crate::utils::stats;
use chrono::{Datelike, NaiveDate};
use rand::seq::index::sample as index_sample;
use std::collections::{BTreeMap, HashMap};

const SCATTER_GROUP_SAMPLE: usize = 300;
const SCATTER_SAMPLE: usize = 100;
const CATEGORY_TOP_N: usize = 10;
const LINE_MAX_POINTS: usize = 50;
const BOX_PLOT_TOP_GROUPS: usize = 20;

/// Materializes the concrete plotted data for each selected chart. A failure
/// in one chart only leaves that chart's data absent; the request never
/// aborts here.
pub struct Aggregator;

impl Aggregator {
    pub fn materialize_all(charts: &mut [ChartSpec], dataset: &Dataset) {
        for chart in charts.iter_mut() {
            // Histogram data is produced during selection.
            if chart.data.is_some() {
                continue;
            }
            if let Err(e) = materialize_chart(chart, dataset) {
                tracing::warn!(title = %chart.title, error = %e, "chart aggregation failed, leaving data empty");
                chart.data = None;
            }
        }
    }
}

fn materialize_chart(chart: &mut ChartSpec, dataset: &Dataset) -> Result<()> {
    match chart.agg {
        Some(AggDirective::RadarMean) | Some(AggDirective::MultiBarMean) => {
            chart.data = Some(grouped_metric_means(chart, dataset)?);
        }
        Some(AggDirective::ScatterGroup) => grouped_scatter(chart, dataset)?,
        Some(AggDirective::RawSample) => {
            chart.data = Some(raw_sample(chart, dataset)?);
        }
        Some(AggDirective::QuantileByGroup) => {
            chart.data = Some(box_plot_groups(chart, dataset)?);
        }
        Some(AggDirective::DateBucket) => {
            chart.data = Some(line_points(chart, dataset)?);
        }
        Some(AggDirective::Mean) | Some(AggDirective::SumByCategory) => {
            chart.data = Some(category_aggregate(chart, dataset)?);
        }
        None => match chart.chart_type {
            ChartType::Bar | ChartType::Pie | ChartType::Treemap => {
                chart.data = Some(category_aggregate(chart, dataset)?);
            }
            ChartType::Line => {
                chart.data = Some(line_points(chart, dataset)?);
            }
            ChartType::Scatter => {
                chart.data = Some(raw_sample(chart, dataset)?);
            }
            ChartType::BoxPlot => {
                chart.data = Some(box_plot_groups(chart, dataset)?);
            }
            ChartType::Histogram | ChartType::Radar => {}
        },
    }
    Ok(())
}

fn required<'c>(field: Option<&'c String>, what: &str) -> Result<&'c str> {
    field.map(|s| s.as_str()).ok_or_else(|| ForgeError::ProcessingError {
        message: format!("chart is missing its {} binding", what),
    })
}

/// radar_mean / multi_bar_mean: per-group mean of each declared metric,
/// reshaped to one row per metric with a field per group value.
fn grouped_metric_means(chart: &ChartSpec, dataset: &Dataset) -> Result<Vec<DataRow>> {
    let group_col = required(chart.group_col.as_ref(), "grouping column")?;
    let x_field = required(chart.x.as_ref(), "x axis")?;
    let metrics = chart.metrics.as_ref().ok_or_else(|| ForgeError::ProcessingError {
        message: "chart declares no metrics".to_string(),
    })?;

    let group_cells = dataset.column_cells(group_col);
    // group key -> metric -> (sum, count); BTreeMap keeps "0"/"1" ordered.
    let mut groups: BTreeMap<String, HashMap<String, (f64, usize)>> = BTreeMap::new();

    for (row_idx, group_cell) in group_cells.iter().enumerate() {
        let key = group_cell
            .group_key()
            .unwrap_or_else(|| "Unknown".to_string());
        let entry = groups.entry(key).or_default();
        for metric in metrics {
            let cell = Cell::from_value(dataset.records[row_idx].get(metric));
            if let Some(v) = cell.as_f64() {
                let slot = entry.entry(metric.clone()).or_insert((0.0, 0));
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    let mut rows = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let mut row = DataRow::new();
        row.insert(
            x_field.to_string(),
            serde_json::Value::String(metric.clone()),
        );
        for (key, per_metric) in &groups {
            if let Some((sum, count)) = per_metric.get(metric) {
                if *count > 0 {
                    row.insert(key.clone(), number_value(sum / *count as f64));
                }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// scatter_group: bounded sample split into per-series coordinate lists.
fn grouped_scatter(chart: &mut ChartSpec, dataset: &Dataset) -> Result<()> {
    let x_col = required(chart.x.as_ref(), "x axis")?.to_string();
    let y_col = required(chart.y.as_ref(), "y axis")?.to_string();
    let group_col = required(chart.group_col.as_ref(), "grouping column")?.to_string();
    let series = chart.series.as_mut().ok_or_else(|| ForgeError::ProcessingError {
        message: "grouped scatter declares no series".to_string(),
    })?;

    let indices = sample_indices(dataset.row_count(), SCATTER_GROUP_SAMPLE);
    for s in series.iter_mut() {
        let mut points = Vec::new();
        for &i in &indices {
            let record = &dataset.records[i];
            let group_key = Cell::from_value(record.get(&group_col)).group_key();
            if group_key.as_deref() != Some(s.data_key.as_str()) {
                continue;
            }
            let x = Cell::from_value(record.get(&x_col));
            let y = Cell::from_value(record.get(&y_col));
            if x.is_null() || y.is_null() {
                continue;
            }
            let mut point = DataRow::new();
            point.insert(x_col.clone(), x.to_json());
            point.insert(y_col.clone(), y.to_json());
            points.push(serde_json::Value::Object(point));
        }
        s.data = Some(points);
    }
    Ok(())
}

/// bar / pie / treemap: group by category, aggregate the metric by sum (or
/// mean when directed), keep the top groups by aggregated value.
fn category_aggregate(chart: &mut ChartSpec, dataset: &Dataset) -> Result<Vec<DataRow>> {
    let x_col = chart
        .x
        .clone()
        .or_else(|| chart.name_key.clone())
        .ok_or_else(|| ForgeError::ProcessingError {
            message: "chart is missing its category binding".to_string(),
        })?;
    let y_col = chart
        .y
        .clone()
        .or_else(|| chart.data_key.clone())
        .ok_or_else(|| ForgeError::ProcessingError {
            message: "chart is missing its value binding".to_string(),
        })?;
    let use_mean = chart.agg == Some(AggDirective::Mean);

    // Grouping a column against itself would collide on the output field.
    let out_field = if x_col == y_col {
        chart.y = Some("value".to_string());
        "value".to_string()
    } else {
        y_col.clone()
    };

    let mut groups: Vec<(String, serde_json::Value, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in &dataset.records {
        let x_cell = Cell::from_value(record.get(&x_col));
        let Some(key) = x_cell.group_key() else { continue };
        let value = match Cell::from_value(record.get(&y_col)).as_f64() {
            Some(v) => v,
            None => continue,
        };
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, x_cell.to_json(), 0.0, 0));
            groups.len() - 1
        });
        groups[idx].2 += value;
        groups[idx].3 += 1;
    }

    let mut aggregated: Vec<(serde_json::Value, f64)> = groups
        .into_iter()
        .filter(|(_, _, _, count)| *count > 0)
        .map(|(_, label, sum, count)| {
            let value = if use_mean { sum / count as f64 } else { sum };
            (label, value)
        })
        .collect();
    aggregated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    aggregated.truncate(CATEGORY_TOP_N);

    Ok(aggregated
        .into_iter()
        .map(|(label, value)| {
            let mut row = DataRow::new();
            row.insert(x_col.clone(), label);
            row.insert(out_field.clone(), number_value(value));
            row
        })
        .collect())
}

/// line / area: numeric x groups-and-averages ascending; anything else is
/// coerced to dates and bucketed by month-year with summed y.
fn line_points(chart: &ChartSpec, dataset: &Dataset) -> Result<Vec<DataRow>> {
    let x_col = required(chart.x.as_ref(), "x axis")?;
    let y_col = required(chart.y.as_ref(), "y axis")?;

    let x_cells = dataset.column_cells(x_col);
    let non_null: Vec<&Cell> = x_cells.iter().filter(|c| !c.is_null()).collect();
    let numeric_x =
        !non_null.is_empty() && non_null.iter().all(|c| matches!(c, Cell::Number(_)));

    if numeric_x {
        let mut groups: BTreeMap<u64, (f64, f64, usize)> = BTreeMap::new();
        for (i, x_cell) in x_cells.iter().enumerate() {
            let Some(x) = x_cell.as_f64() else { continue };
            let Some(y) = Cell::from_value(dataset.records[i].get(y_col)).as_f64() else {
                continue;
            };
            let entry = groups.entry(x.to_bits()).or_insert((x, 0.0, 0));
            entry.1 += y;
            entry.2 += 1;
        }

        let mut points: Vec<(f64, f64)> = groups
            .into_values()
            .map(|(x, sum, count)| (x, sum / count as f64))
            .collect();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        points.truncate(LINE_MAX_POINTS);

        return Ok(points
            .into_iter()
            .map(|(x, y)| {
                let mut row = DataRow::new();
                row.insert(x_col.to_string(), number_value(x));
                row.insert(y_col.to_string(), number_value(y));
                row
            })
            .collect());
    }

    // Month-year buckets, summed, chronological by the underlying date.
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (i, x_cell) in x_cells.iter().enumerate() {
        let Some(date) = x_cell.as_date() else { continue };
        let Some(y) = Cell::from_value(dataset.records[i].get(y_col)).as_f64() else {
            continue;
        };
        let month_start = date
            .with_day(1)
            .ok_or_else(|| ForgeError::ProcessingError {
                message: "invalid bucket date".to_string(),
            })?;
        *buckets.entry(month_start).or_insert(0.0) += y;
    }

    Ok(buckets
        .into_iter()
        .map(|(month, sum)| {
            let mut row = DataRow::new();
            row.insert(
                x_col.to_string(),
                serde_json::Value::String(month.format("%b %Y").to_string()),
            );
            row.insert(y_col.to_string(), number_value(sum));
            row
        })
        .collect())
}

/// Ungrouped scatter: bounded random sample projected onto the two axes.
fn raw_sample(chart: &ChartSpec, dataset: &Dataset) -> Result<Vec<DataRow>> {
    let x_col = required(chart.x.as_ref(), "x axis")?;
    let y_col = required(chart.y.as_ref(), "y axis")?;

    let indices = sample_indices(dataset.row_count(), SCATTER_SAMPLE);
    let mut rows = Vec::with_capacity(indices.len());
    for i in indices {
        let record = &dataset.records[i];
        let x = Cell::from_value(record.get(x_col));
        let y = Cell::from_value(record.get(y_col));
        if x.is_null() || y.is_null() {
            continue;
        }
        let mut row = DataRow::new();
        row.insert(x_col.to_string(), x.to_json());
        row.insert(y_col.to_string(), y.to_json());
        rows.push(row);
    }
    Ok(rows)
}

/// Box plot: five-number summary per category, keeping the most populated
/// groups. The grouping key is renamed to the fixed "category" axis field.
fn box_plot_groups(chart: &ChartSpec, dataset: &Dataset) -> Result<Vec<DataRow>> {
    let x_col = required(chart.x.as_ref(), "x axis")?;
    let y_col = required(chart.y.as_ref(), "y axis")?;

    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in &dataset.records {
        let Some(key) = Cell::from_value(record.get(x_col)).group_key() else {
            continue;
        };
        let Some(y) = Cell::from_value(record.get(y_col)).as_f64() else {
            continue;
        };
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(y);
    }

    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    groups.truncate(BOX_PLOT_TOP_GROUPS);

    let mut rows = Vec::with_capacity(groups.len());
    for (key, mut values) in groups {
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let summary = [
            ("min", values[0]),
            ("q1", stats::quantile(&values, 0.25).unwrap_or(values[0])),
            ("median", stats::quantile(&values, 0.5).unwrap_or(values[0])),
            ("q3", stats::quantile(&values, 0.75).unwrap_or(values[0])),
            ("max", values[values.len() - 1]),
        ];
        let mut row = DataRow::new();
        row.insert("category".to_string(), serde_json::Value::String(key));
        for (field, value) in summary {
            row.insert(field.to_string(), serde_json::Value::from(value));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Unseeded random sample of row indices, capped at `cap`. Repeat requests
/// may sample different points; accepted non-determinism.
fn sample_indices(len: usize, cap: usize) -> Vec<usize> {
    let amount = cap.min(len);
    if amount == 0 {
        return Vec::new();
    }
    index_sample(&mut rand::thread_rng(), len, amount).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Record, Series};
    use std::collections::HashMap;

    fn dataset(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> Dataset {
        let records = rows
            .into_iter()
            .map(|row| {
                let mut data = HashMap::new();
                for (name, value) in columns.iter().zip(row) {
                    data.insert(name.to_string(), value);
                }
                Record { data }
            })
            .collect();
        Dataset {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            records,
        }
    }

    #[test]
    fn radar_mean_reshapes_one_row_per_metric() {
        let rows = vec![
            vec![serde_json::json!(0), serde_json::json!(10.0), serde_json::json!(100.0)],
            vec![serde_json::json!(0), serde_json::json!(20.0), serde_json::json!(200.0)],
            vec![serde_json::json!(1), serde_json::json!(40.0), serde_json::json!(400.0)],
        ];
        let ds = dataset(&["Failure", "Temp", "Torque"], rows);
        let mut chart = ChartSpec::new(ChartType::Radar, "t", "d");
        chart.x = Some("subject".to_string());
        chart.metrics = Some(vec!["Temp".to_string(), "Torque".to_string()]);
        chart.group_col = Some("Failure".to_string());
        chart.agg = Some(AggDirective::RadarMean);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["subject"], serde_json::json!("Temp"));
        assert_eq!(data[0]["0"], serde_json::json!(15));
        assert_eq!(data[0]["1"], serde_json::json!(40));
        assert_eq!(data[1]["subject"], serde_json::json!("Torque"));
        assert_eq!(data[1]["0"], serde_json::json!(150));
    }

    #[test]
    fn radar_mean_uses_unknown_for_missing_group() {
        let rows = vec![
            vec![serde_json::Value::Null, serde_json::json!(6.0)],
            vec![serde_json::json!(1), serde_json::json!(2.0)],
        ];
        let ds = dataset(&["Failure", "Temp"], rows);
        let mut chart = ChartSpec::new(ChartType::Radar, "t", "d");
        chart.x = Some("subject".to_string());
        chart.metrics = Some(vec!["Temp".to_string()]);
        chart.group_col = Some("Failure".to_string());
        chart.agg = Some(AggDirective::RadarMean);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data[0]["Unknown"], serde_json::json!(6));
        assert_eq!(data[0]["1"], serde_json::json!(2));
    }

    #[test]
    fn category_sum_sorts_descending_and_keeps_top_ten() {
        let rows: Vec<Vec<serde_json::Value>> = (0..120)
            .map(|i| {
                vec![
                    serde_json::json!(format!("cat-{:02}", i % 12)),
                    serde_json::json!((i % 12) as f64 + 1.0),
                ]
            })
            .collect();
        let ds = dataset(&["Category", "Revenue"], rows);
        let mut chart = ChartSpec::new(ChartType::Bar, "t", "d");
        chart.x = Some("Category".to_string());
        chart.y = Some("Revenue".to_string());
        chart.agg = Some(AggDirective::SumByCategory);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 10);
        let values: Vec<f64> = data.iter().map(|r| r["Revenue"].as_f64().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        // The two lowest-sum categories fell off.
        assert_eq!(data[0]["Category"], serde_json::json!("cat-11"));
    }

    #[test]
    fn mean_directive_averages_instead_of_summing() {
        let rows = vec![
            vec![serde_json::json!("A"), serde_json::json!(10.0)],
            vec![serde_json::json!("A"), serde_json::json!(20.0)],
            vec![serde_json::json!("B"), serde_json::json!(5.0)],
        ];
        let ds = dataset(&["Category", "Score"], rows);
        let mut chart = ChartSpec::new(ChartType::Bar, "t", "d");
        chart.x = Some("Category".to_string());
        chart.y = Some("Score".to_string());
        chart.agg = Some(AggDirective::Mean);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        let a = data.iter().find(|r| r["Category"] == serde_json::json!("A")).unwrap();
        assert_eq!(a["Score"], serde_json::json!(15));
    }

    #[test]
    fn same_column_grouping_renames_value_field() {
        let rows = vec![
            vec![serde_json::json!(5.0)],
            vec![serde_json::json!(5.0)],
            vec![serde_json::json!(7.0)],
        ];
        let ds = dataset(&["Price"], rows);
        let mut chart = ChartSpec::new(ChartType::Pie, "t", "d");
        chart.x = Some("Price".to_string());
        chart.y = Some("Price".to_string());
        chart.agg = Some(AggDirective::SumByCategory);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        assert_eq!(chart.y.as_deref(), Some("value"));
        let data = chart.data.unwrap();
        assert!(data.iter().all(|r| r.contains_key("value")));
        let ten = data.iter().find(|r| r["value"] == serde_json::json!(10)).unwrap();
        assert_eq!(ten["Price"], serde_json::json!(5));
    }

    #[test]
    fn line_with_numeric_x_averages_and_sorts_ascending() {
        let rows = vec![
            vec![serde_json::json!(3.0), serde_json::json!(30.0)],
            vec![serde_json::json!(1.0), serde_json::json!(10.0)],
            vec![serde_json::json!(1.0), serde_json::json!(20.0)],
            vec![serde_json::json!(2.0), serde_json::json!(5.0)],
        ];
        let ds = dataset(&["Hours", "Score"], rows);
        let mut chart = ChartSpec::new(ChartType::Line, "t", "d");
        chart.x = Some("Hours".to_string());
        chart.y = Some("Score".to_string());
        chart.agg = Some(AggDirective::DateBucket);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["Hours"], serde_json::json!(1));
        assert_eq!(data[0]["Score"], serde_json::json!(15));
        assert_eq!(data[2]["Hours"], serde_json::json!(3));
    }

    #[test]
    fn line_with_text_dates_buckets_by_month_chronologically() {
        let rows = vec![
            vec![serde_json::json!("2024-02-10"), serde_json::json!(5.0)],
            vec![serde_json::json!("2023-12-01"), serde_json::json!(1.0)],
            vec![serde_json::json!("2024-02-20"), serde_json::json!(7.0)],
            vec![serde_json::json!("bogus"), serde_json::json!(99.0)],
        ];
        let ds = dataset(&["Order Date", "Revenue"], rows);
        let mut chart = ChartSpec::new(ChartType::Line, "t", "d");
        chart.x = Some("Order Date".to_string());
        chart.y = Some("Revenue".to_string());
        chart.agg = Some(AggDirective::DateBucket);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["Order Date"], serde_json::json!("Dec 2023"));
        assert_eq!(data[0]["Revenue"], serde_json::json!(1));
        assert_eq!(data[1]["Order Date"], serde_json::json!("Feb 2024"));
        assert_eq!(data[1]["Revenue"], serde_json::json!(12));
    }

    #[test]
    fn scatter_sample_is_bounded() {
        let rows: Vec<Vec<serde_json::Value>> = (0..500)
            .map(|i| vec![serde_json::json!(i as f64), serde_json::json!(i as f64 * 2.0)])
            .collect();
        let ds = dataset(&["A", "B"], rows);
        let mut chart = ChartSpec::new(ChartType::Scatter, "t", "d");
        chart.x = Some("A".to_string());
        chart.y = Some("B".to_string());
        chart.agg = Some(AggDirective::RawSample);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 100);
        assert!(data.iter().all(|r| r.contains_key("A") && r.contains_key("B")));
    }

    #[test]
    fn grouped_scatter_partitions_points_into_series() {
        let rows: Vec<Vec<serde_json::Value>> = (0..50)
            .map(|i| {
                vec![
                    serde_json::json!(i % 2),
                    serde_json::json!(i as f64),
                    serde_json::json!(i as f64 + 0.5),
                ]
            })
            .collect();
        let ds = dataset(&["Failure", "Temp", "Torque"], rows);
        let mut chart = ChartSpec::new(ChartType::Scatter, "t", "d");
        chart.x = Some("Temp".to_string());
        chart.y = Some("Torque".to_string());
        chart.group_col = Some("Failure".to_string());
        chart.series = Some(vec![
            Series {
                name: "Healthy".to_string(),
                data_key: "0".to_string(),
                stroke: None,
                fill: None,
                data: None,
            },
            Series {
                name: "Failed".to_string(),
                data_key: "1".to_string(),
                stroke: None,
                fill: None,
                data: None,
            },
        ]);
        chart.agg = Some(AggDirective::ScatterGroup);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let series = chart.series.unwrap();
        let healthy = series[0].data.as_ref().unwrap();
        let failed = series[1].data.as_ref().unwrap();
        assert_eq!(healthy.len() + failed.len(), 50);
        assert!(healthy
            .iter()
            .all(|p| p["Temp"].as_f64().unwrap() % 2.0 == 0.0));
    }

    #[test]
    fn box_plot_summary_is_ordered_and_count_free() {
        let mut rows = Vec::new();
        for i in 0..30 {
            rows.push(vec![serde_json::json!("A"), serde_json::json!(i as f64)]);
        }
        for i in 0..10 {
            rows.push(vec![serde_json::json!("B"), serde_json::json!(100.0 + i as f64)]);
        }
        let ds = dataset(&["Grade", "Score"], rows);
        let mut chart = ChartSpec::new(ChartType::BoxPlot, "t", "d");
        chart.x = Some("Grade".to_string());
        chart.y = Some("Score".to_string());
        chart.agg = Some(AggDirective::QuantileByGroup);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 2);
        // Most populated group first.
        assert_eq!(data[0]["category"], serde_json::json!("A"));
        for row in &data {
            let min = row["min"].as_f64().unwrap();
            let q1 = row["q1"].as_f64().unwrap();
            let median = row["median"].as_f64().unwrap();
            let q3 = row["q3"].as_f64().unwrap();
            let max = row["max"].as_f64().unwrap();
            assert!(min <= q1 && q1 <= median && median <= q3 && q3 <= max);
            assert!(!row.contains_key("count"));
        }
    }

    #[test]
    fn box_plot_coerces_text_numbers_and_drops_garbage() {
        let rows = vec![
            vec![serde_json::json!("A"), serde_json::json!("12.5")],
            vec![serde_json::json!("A"), serde_json::json!("oops")],
            vec![serde_json::json!("A"), serde_json::json!(7.5)],
        ];
        let ds = dataset(&["Grade", "Score"], rows);
        let mut chart = ChartSpec::new(ChartType::BoxPlot, "t", "d");
        chart.x = Some("Grade".to_string());
        chart.y = Some("Score".to_string());
        chart.agg = Some(AggDirective::QuantileByGroup);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        let data = chart.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["min"], serde_json::json!(7.5));
        assert_eq!(data[0]["max"], serde_json::json!(12.5));
    }

    #[test]
    fn failed_chart_keeps_data_absent_without_aborting() {
        let ds = dataset(&["A"], vec![vec![serde_json::json!(1.0)]]);
        // Missing axis bindings: aggregation fails, data stays absent.
        let mut broken = ChartSpec::new(ChartType::Bar, "broken", "d");
        broken.agg = Some(AggDirective::SumByCategory);
        let mut fine = ChartSpec::new(ChartType::Bar, "fine", "d");
        fine.x = Some("A".to_string());
        fine.y = Some("A".to_string());
        fine.agg = Some(AggDirective::SumByCategory);

        let mut charts = vec![broken, fine];
        Aggregator::materialize_all(&mut charts, &ds);
        assert!(charts[0].data.is_none());
        assert!(charts[1].data.is_some());
    }

    #[test]
    fn precomputed_histogram_data_is_left_alone() {
        let ds = dataset(&["A"], vec![vec![serde_json::json!(1.0)]]);
        let mut chart = ChartSpec::new(ChartType::Histogram, "t", "d");
        let mut row = DataRow::new();
        row.insert("range".to_string(), serde_json::json!("0-1"));
        row.insert("count".to_string(), serde_json::json!(3));
        chart.data = Some(vec![row.clone()]);

        Aggregator::materialize_all(std::slice::from_mut(&mut chart), &ds);
        assert_eq!(chart.data, Some(vec![row]));
    }
}
