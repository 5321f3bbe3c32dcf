//! azv - command-line front end of azvisor

use azvisor::cli::Cli;
use azvisor::config::{self, Config};
use azvisor::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.debug);

    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting azvisor");

    let config = load(&cli)?;
    cli.execute(config).await?;

    Ok(())
}

fn load(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => config::load_from_path(Some(path.as_path()))?,
        None => config::load_config_no_validation()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "azvisor=debug" } else { "azvisor=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
