use aer_ifs::config::{RunConfig, Store};
use aer_ifs::runner::Runner;

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "aer-ifs")]
#[command(
    about = "Derive lidar ratio and MEC from IFS speciated AOD and collocate them with stations"
)]
struct Cli {
    /// Path to the run configuration (JSON)
    #[arg(long, default_value = "./data/config/aer_ifs.json")]
    config: PathBuf,

    /// Evaluation date (YYYY-MM-DD), today by default
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Storage system substituted for {store} in source directories
    #[arg(long, value_enum)]
    store: Option<Store>,

    /// Output directory, overrides the configuration
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip station collocation
    #[arg(long)]
    no_stations: bool,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "aer_ifs=warn" } else { "aer_ifs=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = RunConfig::from_file(&cli.config)?;
    if let Some(store) = cli.store {
        config = config.with_store(store);
    }
    if let Some(output) = cli.output {
        config = config.with_output_directory(output);
    }
    if cli.no_stations {
        config = config.without_stations();
    }

    let date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let summary = Runner::new(&config, date).run()?;

    info!(
        aod = %summary.aod_file.display(),
        humidity = %summary.humidity_file.display(),
        fields = summary.field_files.len(),
        collocated = summary.collocated,
        failed = summary.failed,
        "run finished"
    );
    if let Some(path) = summary.apriori_file {
        info!(path = %path.display(), "a-priori file ready");
    }

    Ok(())
}
