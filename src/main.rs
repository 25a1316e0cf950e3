use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use travelcast_core::{AppError, Config};
use travelcast_weather::TravelService;

/// District travel advice from Open-Meteo temperature and PM2.5 forecasts
#[derive(Debug, Parser)]
#[command(name = "travelcast", version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "TRAVELCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Override the district dataset path from the config
    #[arg(long)]
    districts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the districts in the catalog
    Districts,
    /// Coolest and cleanest districts over the forecast window
    Top,
    /// Should you travel from one district to another on a given date?
    Recommend {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Travel date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
    },
}

fn main() -> Result<()> {
    travelcast_core::init()?;

    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<String, AppError> {
    let (mut config, _) = Config::load_validated(cli.config.as_deref())?;
    if let Some(path) = cli.districts {
        config.catalog.districts_path = path;
    }

    let service = TravelService::from_config(&config)?;

    let output = match cli.command {
        Command::Districts => to_json(&service.districts())?,
        Command::Top => to_json(&service.top_districts()?)?,
        Command::Recommend { from, to, date } => to_json(&service.recommend(&from, &to, date)?)?,
    };
    Ok(output)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .context("Failed to serialize output")
        .map_err(AppError::from)
}
