pub mod keywords;

pub use keywords::KeywordTables;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "chart-forge")]
#[command(about = "Profile a tabular dataset and recommend dashboard charts")]
pub struct CliConfig {
    /// Input dataset: a JSON array of objects or a CSV file with headers
    pub input: String,

    #[arg(long, default_value = "auto", help = "Input format: auto, json or csv")]
    pub format: String,

    #[arg(
        long,
        default_value = "general",
        help = "Domain hint; only \"maint\" selects the maintenance heuristics"
    )]
    pub project_type: String,

    #[arg(long, help = "TOML file overriding the heuristic keyword tables")]
    pub keywords: Option<String>,

    #[arg(long, help = "Write the recommendation JSON here instead of stdout")]
    pub output: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}
