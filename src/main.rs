use anyhow::Context;
use chart_forge::utils::logger;
use chart_forge::{adapters, CliConfig, InsightEngine, KeywordTables};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);
    tracing::info!("Starting chart-forge");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let keywords = match &config.keywords {
        Some(path) => KeywordTables::from_file(path)
            .with_context(|| format!("failed to load keyword tables from {}", path))?,
        None => KeywordTables::default(),
    };

    let mut dataset = adapters::load_path(&config.input, &config.format)
        .with_context(|| format!("failed to load dataset from {}", config.input))?;
    adapters::inject_record_count(&mut dataset);
    tracing::info!(
        rows = dataset.row_count(),
        columns = dataset.columns.len(),
        "dataset loaded"
    );

    let engine = InsightEngine::with_keywords(keywords);
    let recommendation = engine
        .analyze(&dataset, &config.project_type)
        .context("analysis failed")?;
    tracing::info!(
        charts = recommendation.charts.len(),
        kpis = recommendation.kpis.len(),
        "recommendation ready"
    );

    let json = serde_json::to_string_pretty(&recommendation)?;
    match &config.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path))?;
            println!("✅ Recommendation written to {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
