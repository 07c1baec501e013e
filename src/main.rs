use std::sync::Arc;
use anyhow::Result;
use clap::Parser;
use BvrClassify::cli::Args;
use BvrClassify::run_classification;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Arc::new(args.into_config()?);
    log::info!("Configuration\n{}", config.summary());

    let report = run_classification(Arc::clone(&config))?;

    print!("{}", report);
    if let Some(path) = &config.output_json {
        report.write_json(path)?;
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}
