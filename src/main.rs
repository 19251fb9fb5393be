//! CLI entry point for the Sydney commute happiness index.
//!
//! Provides subcommands for building a feature table from cleaned commute and
//! weather data, scoring a feature table, and inspecting the resolved settings.

use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sydney_pulse::features::engineer::{
    build_commute_features, build_weather_features, join_features, read_commute_observations,
    read_weather_readings,
};
use sydney_pulse::features::parser::{read_feature_table_path, write_feature_table_path};
use sydney_pulse::output::{print_json, write_schi_csv};
use sydney_pulse::{Settings, compute_schi};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "sydney_pulse")]
#[command(about = "Compute the Sydney Commute Happiness Index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a feature table and write the SCHI table
    Compute {
        /// Feature table CSV keyed by geography_unit_id and date
        #[arg(short, long, value_name = "FEATURES_CSV")]
        input: String,

        /// CSV file to write SCHI rows to
        #[arg(short, long, default_value = "data/processed/schi.csv")]
        output: String,
    },
    /// Build a feature table from cleaned commute trips and weather readings
    BuildFeatures {
        /// Cleaned commute trips CSV
        #[arg(long)]
        commute: String,

        /// Cleaned weather readings CSV
        #[arg(long)]
        weather: String,

        /// CSV file to write the joined feature table to
        #[arg(short, long, default_value = "data/processed/features.csv")]
        output: String,
    },
    /// Print the settings resolved from the environment
    ShowConfig,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/sydney_pulse.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("sydney_pulse.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    run(cli.command, |key| std::env::var(key).ok())
}

/// Dispatches a subcommand. Settings are resolved only by the commands that use
/// them, and are immutable for the rest of the run.
fn run<F>(command: Commands, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let load_settings =
        || Settings::from_lookup(&lookup).context("invalid SCHI configuration");

    match command {
        Commands::Compute { input, output } => compute(&load_settings()?, &input, &output)?,
        Commands::BuildFeatures {
            commute,
            weather,
            output,
        } => build_features(&commute, &weather, &output)?,
        Commands::ShowConfig => {
            info!("{}", serde_json::to_string_pretty(&load_settings()?)?);
        }
    }

    Ok(())
}

/// Reads a feature table, scores it and writes the SCHI table.
#[tracing::instrument(skip(settings))]
fn compute(settings: &Settings, input: &str, output: &str) -> Result<()> {
    let table = read_feature_table_path(input)
        .with_context(|| format!("failed to read feature table '{input}'"))?;
    info!(
        rows = table.len(),
        geography = %settings.geography(),
        timezone = settings.timezone(),
        "Feature table loaded"
    );

    let run = compute_schi(&table, settings)?;

    write_schi_csv(output, &run.rows)
        .with_context(|| format!("failed to write SCHI table '{output}'"))?;
    print_json(&run.summary())?;

    info!(output, "SCHI table written");
    Ok(())
}

/// Builds and writes a feature table from cleaned commute and weather CSVs.
#[tracing::instrument]
fn build_features(commute: &str, weather: &str, output: &str) -> Result<()> {
    let trips = read_commute_observations(
        File::open(commute).with_context(|| format!("failed to open '{commute}'"))?,
    )?;
    let readings = read_weather_readings(
        File::open(weather).with_context(|| format!("failed to open '{weather}'"))?,
    )?;
    info!(trips = trips.len(), readings = readings.len(), "Observations loaded");

    let table = join_features(
        &build_commute_features(&trips),
        &build_weather_features(&readings),
    )?;

    write_feature_table_path(output, &table)
        .with_context(|| format!("failed to write feature table '{output}'"))?;

    info!(output, rows = table.len(), "Feature table written");
    Ok(())
}
