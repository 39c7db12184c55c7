pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::KeywordTables;
pub use core::InsightEngine;
pub use domain::model::{
    Analysis, ChartSpec, ColumnProfile, Dataset, Kpi, Recommendation, Record,
};
pub use utils::error::{ForgeError, Result};
