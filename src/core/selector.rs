use crate::config::keywords::{name_matches, KeywordTables};
use crate::domain::model::{
    AggDirective, Analysis, ChartSpec, ChartType, ColumnProfile, DataRow, Dataset, Kpi, KpiType,
    KpiValue, SemanticType, Series,
};
use crate::utils::stats;
use std::collections::HashSet;

const MAX_CHARTS: usize = 4;

const HEALTHY_COLOR: &str = "#10b981";
const FAILED_COLOR: &str = "#ef4444";

/// Picks up to four diverse charts and a KPI list from the Analysis via
/// ordered heuristic rules. Pure: no mutation of inputs, fresh output per
/// call.
pub struct ChartSelector<'a> {
    keywords: &'a KeywordTables,
}

/// Ordered chart list plus the titles already taken. Passed through the rule
/// pipeline instead of mutating shared state.
#[derive(Default)]
struct ChartAccumulator {
    charts: Vec<ChartSpec>,
    titles: HashSet<String>,
}

impl ChartAccumulator {
    /// Appends unless the title is already present. First occurrence wins.
    fn push(&mut self, chart: ChartSpec) {
        if self.titles.insert(chart.title.clone()) {
            self.charts.push(chart);
        }
    }
}

/// Everything a slot rule may look at, resolved once before the slots run.
struct SlotContext<'a> {
    dataset: &'a Dataset,
    /// Numeric columns in input order; synthesized "Record Count" when the
    /// dataset has no numeric column at all.
    numeric_cols: Vec<ColumnProfile>,
    /// Categorical columns sorted descending by unique count.
    cat_cols: Vec<ColumnProfile>,
    primary: ColumnProfile,
    major_cat: Option<ColumnProfile>,
    demo_cat: Option<ColumnProfile>,
    date_col: Option<ColumnProfile>,
}

type SlotRule = fn(&SlotContext) -> Option<ChartSpec>;

impl<'a> ChartSelector<'a> {
    pub fn new(keywords: &'a KeywordTables) -> Self {
        Self { keywords }
    }

    pub fn select(
        &self,
        analysis: &Analysis,
        dataset: &Dataset,
        domain_hint: &str,
    ) -> (Vec<ChartSpec>, Vec<Kpi>) {
        if domain_hint.to_lowercase().contains("maint") {
            if let Some(result) = self.select_maintenance(analysis, dataset) {
                return result;
            }
            tracing::debug!("maintenance hint without a failure column, using general rules");
        }
        self.select_general(analysis, dataset)
    }

    // --- Specialized maintenance dashboard ---

    /// Fires only when a failure column exists; returns the reduced
    /// maintenance chart/KPI set without padding to four charts.
    fn select_maintenance(
        &self,
        analysis: &Analysis,
        dataset: &Dataset,
    ) -> Option<(Vec<ChartSpec>, Vec<Kpi>)> {
        let columns = &analysis.columns;
        let failure_col = columns
            .iter()
            .find(|c| c.name.to_lowercase().contains("failure"))?;

        let device_col = columns.iter().find(|c| {
            let lower = c.name.to_lowercase();
            name_matches(&c.name, &self.keywords.device)
                && !lower.contains("failure")
                && !lower.contains("id")
        });
        if let Some(date_col) = columns.iter().find(|c| c.semantic_type == SemanticType::Date) {
            tracing::debug!(column = %date_col.name, "maintenance dataset has a date column");
        }
        let sensor_metrics: Vec<&ColumnProfile> = columns
            .iter()
            .filter(|c| {
                c.semantic_type == SemanticType::Numeric
                    && !name_matches(&c.name, &self.keywords.maintenance_exclude)
            })
            .collect();

        let row_count = analysis.row_count;
        let mut kpis = vec![Kpi::new(
            "Total Records",
            KpiValue::Integer(row_count as i64),
            KpiType::Total,
        )];

        let total_failures: f64 = dataset
            .column_cells(&failure_col.name)
            .iter()
            .filter_map(|c| c.as_f64())
            .sum();
        kpis.push(Kpi::new(
            "Total Failures",
            KpiValue::Integer(total_failures as i64),
            KpiType::Total,
        ));

        let fail_rate = if row_count > 0 {
            total_failures / row_count as f64 * 100.0
        } else {
            0.0
        };
        kpis.push(Kpi::new(
            "Failure Rate",
            KpiValue::Text(format!("{:.4}%", fail_rate)),
            KpiType::Percentage,
        ));

        if let Some(device) = device_col {
            kpis.push(Kpi::new(
                "Device Types",
                KpiValue::Integer(device.unique_count as i64),
                KpiType::Count,
            ));
        }

        let mut acc = ChartAccumulator::default();

        // Radar comparing mean sensor readings between failure groups.
        if sensor_metrics.len() >= 3 {
            let top_sensors: Vec<String> =
                sensor_metrics.iter().take(5).map(|c| c.name.clone()).collect();
            let mut chart = ChartSpec::new(
                ChartType::Radar,
                "Sensor Health Profile",
                "Comparing average sensor readings for Healthy vs. Failed devices.",
            );
            chart.x = Some("subject".to_string());
            chart.series = Some(vec![
                series("Healthy", "0", HEALTHY_COLOR, true),
                series("Failed", "1", FAILED_COLOR, true),
            ]);
            chart.metrics = Some(top_sensors);
            chart.group_col = Some(failure_col.name.clone());
            chart.agg = Some(AggDirective::RadarMean);
            acc.push(chart);
        }

        if let Some(device) = device_col {
            let mut chart = ChartSpec::new(
                ChartType::Pie,
                "Device Type Distribution",
                "Distribution of device types by record count.",
            );
            chart.x = Some(device.name.clone());
            chart.y = Some("Record Count".to_string());
            chart.data_key = Some("Record Count".to_string());
            chart.name_key = Some(device.name.clone());
            chart.agg = Some(AggDirective::SumByCategory);
            acc.push(chart);
        }

        if !sensor_metrics.is_empty() {
            let bar_sensors: Vec<String> =
                sensor_metrics.iter().take(3).map(|c| c.name.clone()).collect();
            let mut chart = ChartSpec::new(
                ChartType::Bar,
                "Sensor Metrics Comparison",
                "Side-by-side comparison of sensor values.",
            );
            chart.x = Some("metric".to_string());
            chart.series = Some(vec![
                series("Healthy", "0", HEALTHY_COLOR, false),
                series("Failed", "1", FAILED_COLOR, false),
            ]);
            chart.metrics = Some(bar_sensors);
            chart.group_col = Some(failure_col.name.clone());
            chart.agg = Some(AggDirective::MultiBarMean);
            acc.push(chart);
        }

        Some((acc.charts, kpis))
    }

    // --- General branch ---

    fn select_general(&self, analysis: &Analysis, dataset: &Dataset) -> (Vec<ChartSpec>, Vec<Kpi>) {
        let ctx = self.build_context(analysis, dataset);

        // One ordered rule table per slot; the first builder to produce a
        // chart wins that slot.
        let slots: [&[SlotRule]; 4] = [
            &[
                trend_over_date,
                trend_over_ordinal_numeric,
                ranked_bar,
                overview_bar,
            ],
            &[composition_pie, composition_treemap, composition_fallback_pie],
            &[distribution_box_plot, distribution_histogram],
            &[relationship_scatter, relationship_secondary_bar],
        ];

        let mut acc = ChartAccumulator::default();
        for rules in slots {
            for rule in rules {
                if let Some(chart) = rule(&ctx) {
                    acc.push(chart);
                    break;
                }
            }
        }

        let mut charts = acc.charts;
        charts.truncate(MAX_CHARTS);

        // Single generic filler; never loop hunting for a fifth idea.
        if charts.len() < MAX_CHARTS && !acc.titles.contains("Metric Overview") {
            let mut filler = ChartSpec::new(
                ChartType::Bar,
                "Metric Overview",
                "Overview of primary metrics.",
            );
            filler.x = Some(
                ctx.major_cat
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Category".to_string()),
            );
            filler.y = Some(ctx.primary.name.clone());
            filler.agg = Some(AggDirective::SumByCategory);
            charts.push(filler);
        }

        let kpis = self.general_kpis(analysis, dataset, &ctx);
        (charts, kpis)
    }

    fn build_context<'c>(&self, analysis: &Analysis, dataset: &'c Dataset) -> SlotContext<'c> {
        let mut numeric_cols: Vec<ColumnProfile> = analysis
            .columns
            .iter()
            .filter(|c| c.semantic_type == SemanticType::Numeric)
            .cloned()
            .collect();

        if numeric_cols.is_empty() {
            // Purely categorical dataset: synthesize a count metric.
            numeric_cols.push(ColumnProfile {
                name: "Record Count".to_string(),
                semantic_type: SemanticType::Numeric,
                is_categorical: false,
                unique_count: 1,
                null_count: 0,
                min: Some(0.0),
                max: Some(analysis.row_count as f64),
                mean: Some(analysis.row_count as f64 / 2.0),
            });
        }

        let primary = self.pick_primary_metric(&numeric_cols);

        let mut cat_cols: Vec<ColumnProfile> = analysis
            .columns
            .iter()
            .filter(|c| c.is_categorical)
            .cloned()
            .collect();
        cat_cols.sort_by(|a, b| b.unique_count.cmp(&a.unique_count));

        let major_cat = cat_cols.first().cloned();
        let demo_cat = cat_cols
            .iter()
            .find(|c| name_matches(&c.name, &self.keywords.demographic))
            .cloned();

        // Only date columns with date-like names count as real timelines;
        // coerced lookalikes (hour counts etc.) are ignored here.
        let date_col = analysis
            .columns
            .iter()
            .find(|c| {
                c.semantic_type == SemanticType::Date
                    && name_matches(&c.name, &self.keywords.date_like)
            })
            .cloned();

        SlotContext {
            dataset,
            numeric_cols,
            cat_cols,
            primary,
            major_cat,
            demo_cat,
            date_col,
        }
    }

    /// Primary metric priority chain: business keywords, then medium-priority
    /// names, then the first large-range non-id numeric, then anything.
    fn pick_primary_metric(&self, numeric_cols: &[ColumnProfile]) -> ColumnProfile {
        if let Some(col) = numeric_cols
            .iter()
            .find(|c| name_matches(&c.name, &self.keywords.high_priority_metrics))
        {
            return col.clone();
        }
        if let Some(col) = numeric_cols
            .iter()
            .find(|c| name_matches(&c.name, &self.keywords.medium_priority_metrics))
        {
            return col.clone();
        }
        if let Some(col) = numeric_cols.iter().find(|c| {
            let lower = c.name.to_lowercase();
            c.max.unwrap_or(0.0) > 100.0 && !lower.contains("id") && !lower.contains("record count")
        }) {
            return col.clone();
        }
        numeric_cols[0].clone()
    }

    fn general_kpis(
        &self,
        analysis: &Analysis,
        dataset: &Dataset,
        ctx: &SlotContext,
    ) -> Vec<Kpi> {
        let mut kpis = vec![Kpi::new(
            "Total Records",
            KpiValue::Integer(analysis.row_count as i64),
            KpiType::Total,
        )];

        // If the primary metric resolved to the synthetic count, substitute a
        // real value column for the sum/average KPIs when one exists.
        let mut kpi_metric = ctx.primary.clone();
        if kpi_metric.name.to_lowercase().contains("record count") {
            if let Some(alt) = ctx.numeric_cols.iter().find(|c| {
                let lower = c.name.to_lowercase();
                !lower.contains("record count") && !lower.contains("id")
            }) {
                kpi_metric = alt.clone();
            }
        }

        if !kpi_metric.name.to_lowercase().contains("record count") {
            let values: Vec<f64> = dataset
                .column_cells(&kpi_metric.name)
                .iter()
                .filter_map(|c| c.as_f64())
                .collect();
            let total: f64 = values.iter().sum();
            let average = stats::mean(&values).unwrap_or(0.0);
            kpis.push(Kpi::new(
                format!("Total {}", kpi_metric.name),
                kpi_number(total),
                KpiType::Total,
            ));
            kpis.push(Kpi::new(
                format!("Average {}", kpi_metric.name),
                kpi_number(average),
                KpiType::Average,
            ));
        }

        if let Some(major) = &ctx.major_cat {
            kpis.push(Kpi::new(
                format!("{} Count", major.name),
                KpiValue::Integer(major.unique_count as i64),
                KpiType::Count,
            ));
        }

        kpis
    }
}

fn series(name: &str, data_key: &str, color: &str, with_stroke: bool) -> Series {
    Series {
        name: name.to_string(),
        data_key: data_key.to_string(),
        stroke: with_stroke.then(|| color.to_string()),
        fill: Some(color.to_string()),
        data: None,
    }
}

fn kpi_number(n: f64) -> KpiValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        KpiValue::Integer(n as i64)
    } else {
        KpiValue::Float(n)
    }
}

// --- Slot 1: trend / comparison ---

fn trend_over_date(ctx: &SlotContext) -> Option<ChartSpec> {
    let date_col = ctx.date_col.as_ref()?;
    let mut chart = ChartSpec::new(
        ChartType::Line,
        format!("{} Trend", ctx.primary.name),
        format!("Timeline of {} over {}.", ctx.primary.name, date_col.name),
    );
    chart.x = Some(date_col.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.data_key = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::DateBucket);
    Some(chart)
}

/// Line over a non-primary numeric axis with a sensible number of distinct
/// values (e.g. score vs. training hours).
fn trend_over_ordinal_numeric(ctx: &SlotContext) -> Option<ChartSpec> {
    let ord_col = ctx.numeric_cols.iter().find(|c| {
        let lower = c.name.to_lowercase();
        c.name != ctx.primary.name
            && (5..=50).contains(&c.unique_count)
            && !lower.contains("record count")
            && !lower.contains("id")
    })?;
    let mut chart = ChartSpec::new(
        ChartType::Line,
        format!("{} by {}", ctx.primary.name, ord_col.name),
        format!("{} grouped by {}.", ctx.primary.name, ord_col.name),
    );
    chart.x = Some(ord_col.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.data_key = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::DateBucket);
    Some(chart)
}

fn ranked_bar(ctx: &SlotContext) -> Option<ChartSpec> {
    let major = ctx.major_cat.as_ref().filter(|c| c.unique_count > 10)?;
    let mut chart = ChartSpec::new(
        ChartType::Bar,
        format!("Top {} by {}", ctx.primary.name, major.name),
        format!("Ranking top {} by {}.", major.name, ctx.primary.name),
    );
    chart.x = Some(major.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.data_key = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}

fn overview_bar(ctx: &SlotContext) -> Option<ChartSpec> {
    let axis = ctx
        .major_cat
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Item".to_string());
    let mut chart = ChartSpec::new(
        ChartType::Bar,
        format!("{} Overview", ctx.primary.name),
        "General overview.",
    );
    chart.x = Some(axis);
    chart.y = Some(ctx.primary.name.clone());
    chart.data_key = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}

// --- Slot 2: composition ---

/// Demographic categories (or any small-cardinality category) get a pie of
/// record counts rather than a sum of some unrelated metric.
fn composition_pie(ctx: &SlotContext) -> Option<ChartSpec> {
    let target = ctx.demo_cat.as_ref().or_else(|| {
        ctx.cat_cols
            .iter()
            .find(|c| (2..=8).contains(&c.unique_count))
    })?;

    let count_col = ctx
        .numeric_cols
        .iter()
        .find(|c| c.name.to_lowercase().contains("record count"));
    let y_val = count_col.map(|c| c.name.clone()).unwrap_or_else(|| ctx.primary.name.clone());

    let mut chart = ChartSpec::new(
        ChartType::Pie,
        format!("Distribution by {}", target.name),
        format!("Breakdown of records by {}.", target.name),
    );
    chart.x = Some(target.name.clone());
    chart.y = Some(y_val);
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}

fn composition_treemap(ctx: &SlotContext) -> Option<ChartSpec> {
    let treemap_cat = ctx
        .cat_cols
        .iter()
        .find(|c| c.unique_count > 10 && c.unique_count < 50)?;
    let mut chart = ChartSpec::new(
        ChartType::Treemap,
        format!("{} Heatmap", ctx.primary.name),
        format!(
            "Density view of {} across {}.",
            ctx.primary.name, treemap_cat.name
        ),
    );
    chart.x = Some(treemap_cat.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}

fn composition_fallback_pie(ctx: &SlotContext) -> Option<ChartSpec> {
    let major = ctx.major_cat.as_ref()?;
    let mut chart = ChartSpec::new(
        ChartType::Pie,
        format!("Distribution by {}", major.name),
        format!("Distribution by {}.", major.name),
    );
    chart.x = Some(major.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}

// --- Slot 3: distribution ---

/// Box plot wants a string category; low-cardinality numerics can be flagged
/// categorical and would pair the metric against itself.
fn distribution_box_plot(ctx: &SlotContext) -> Option<ChartSpec> {
    let box_cat = ctx.cat_cols.iter().find(|c| {
        c.semantic_type == SemanticType::String
            && (2..=15).contains(&c.unique_count)
            && c.name != ctx.primary.name
    })?;
    let mut chart = ChartSpec::new(
        ChartType::BoxPlot,
        format!("{} Distribution by {}", ctx.primary.name, box_cat.name),
        "Statistical distribution (min, max, median) by category.",
    );
    chart.x = Some(box_cat.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::QuantileByGroup);
    Some(chart)
}

/// Histogram data is materialized here rather than in the aggregator; the
/// chart is skipped outright when the metric is degenerate.
fn distribution_histogram(ctx: &SlotContext) -> Option<ChartSpec> {
    let values: Vec<f64> = ctx
        .dataset
        .column_cells(&ctx.primary.name)
        .iter()
        .filter_map(|c| c.as_f64())
        .collect();
    let distinct: HashSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    if distinct.len() < 2 {
        return None;
    }

    let (counts, edges) = stats::histogram(&values, 10)?;
    let data: Vec<DataRow> = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let mut row = DataRow::new();
            row.insert(
                "range".to_string(),
                serde_json::Value::String(format!("{:.0}-{:.0}", edges[i], edges[i + 1])),
            );
            row.insert("count".to_string(), serde_json::Value::from(count));
            row
        })
        .collect();

    let mut chart = ChartSpec::new(
        ChartType::Histogram,
        format!("{} Frequencies", ctx.primary.name),
        format!("Frequency distribution of {}.", ctx.primary.name),
    );
    chart.x = Some("range".to_string());
    chart.y = Some("count".to_string());
    chart.data = Some(data);
    Some(chart)
}

// --- Slot 4: relationship ---

fn relationship_scatter(ctx: &SlotContext) -> Option<ChartSpec> {
    let secondary = ctx.numeric_cols.iter().find(|c| {
        let lower = c.name.to_lowercase();
        c.name != ctx.primary.name && !lower.contains("record count") && !lower.contains("id")
    })?;
    let mut chart = ChartSpec::new(
        ChartType::Scatter,
        format!("{} vs {}", ctx.primary.name, secondary.name),
        "Correlation analysis between metrics.",
    );
    chart.x = Some(ctx.primary.name.clone());
    chart.y = Some(secondary.name.clone());
    chart.agg = Some(AggDirective::RawSample);
    Some(chart)
}

fn relationship_secondary_bar(ctx: &SlotContext) -> Option<ChartSpec> {
    let secondary_cat = ctx.cat_cols.get(1)?;
    let mut chart = ChartSpec::new(
        ChartType::Bar,
        format!("Analysis by {}", secondary_cat.name),
        format!("Secondary view by {}.", secondary_cat.name),
    );
    chart.x = Some(secondary_cat.name.clone());
    chart.y = Some(ctx.primary.name.clone());
    chart.agg = Some(AggDirective::SumByCategory);
    Some(chart)
}
