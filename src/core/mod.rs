pub mod aggregator;
pub mod classifier;
pub mod engine;
pub mod selector;

pub use crate::domain::model::{Analysis, ChartSpec, Dataset, Kpi, Recommendation};
pub use crate::utils::error::Result;
pub use engine::InsightEngine;
