use crate::config::KeywordTables;
use crate::core::aggregator::Aggregator;
use crate::core::classifier::TypeClassifier;
use crate::core::selector::ChartSelector;
use crate::domain::model::{Dataset, Metadata, Recommendation};
use crate::utils::error::{ForgeError, Result};

/// Stateless two-stage pipeline: classify columns, select charts and KPIs,
/// then materialize the plotted data. A fresh Recommendation per call, no
/// shared state across requests.
pub struct InsightEngine {
    keywords: KeywordTables,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    pub fn new() -> Self {
        Self {
            keywords: KeywordTables::default(),
        }
    }

    pub fn with_keywords(keywords: KeywordTables) -> Self {
        Self { keywords }
    }

    pub fn analyze(&self, dataset: &Dataset, domain_hint: &str) -> Result<Recommendation> {
        if dataset.records.is_empty() {
            return Err(ForgeError::EmptyDataset);
        }

        tracing::debug!(
            rows = dataset.row_count(),
            columns = dataset.columns.len(),
            hint = domain_hint,
            "analyzing dataset"
        );

        let classifier = TypeClassifier::new(&self.keywords);
        let analysis = classifier.analyze(dataset);
        tracing::debug!(profiles = analysis.columns.len(), "classification complete");

        let selector = ChartSelector::new(&self.keywords);
        let (mut charts, kpis) = selector.select(&analysis, dataset, domain_hint);
        tracing::debug!(charts = charts.len(), kpis = kpis.len(), "charts selected");

        Aggregator::materialize_all(&mut charts, dataset);

        let row_count = analysis.row_count;
        Ok(Recommendation {
            analysis,
            charts,
            kpis,
            metadata: Metadata { row_count },
        })
    }
}
