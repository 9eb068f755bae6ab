//! SolarCast CLI - database migrations and model tooling.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! solarcast migrate
//!
//! # Train and write artifacts
//! solarcast train --data Solar_Power_Prediction.csv --out artifacts
//!
//! # Score stored artifacts
//! solarcast evaluate --data Solar_Power_Prediction.csv --model artifacts
//!
//! # Predict from a JSON file
//! solarcast predict --model artifacts --input days.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use solarcast_forecast::TrainingConfig;
use solarcast_forecast::forest::{DEFAULT_ESTIMATORS, DEFAULT_RANDOM_STATE};
use solarcast_forecast::impute::DEFAULT_NEIGHBORS;
use solarcast_forecast::pipeline::DEFAULT_TEST_SIZE;

mod commands;

#[derive(Parser)]
#[command(name = "solarcast")]
#[command(author, version, about = "SolarCast CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,

    /// Train the model and write artifacts
    Train {
        /// Raw dataset CSV
        #[arg(short, long, default_value = "Solar_Power_Prediction.csv")]
        data: PathBuf,

        /// Artifact output directory
        #[arg(short, long, default_value = "artifacts")]
        out: PathBuf,

        /// Number of trees in the forest
        #[arg(long, default_value_t = DEFAULT_ESTIMATORS)]
        trees: usize,

        /// Seed for the split and the forest
        #[arg(long, default_value_t = DEFAULT_RANDOM_STATE)]
        seed: u64,

        /// Neighbors used to impute missing values
        #[arg(long, default_value_t = DEFAULT_NEIGHBORS)]
        neighbors: usize,

        /// Share of days held out for scoring
        #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
        test_size: f64,
    },

    /// Score stored artifacts against a dataset
    Evaluate {
        /// Raw dataset CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        model: PathBuf,

        /// Neighbors used to impute missing values
        #[arg(long, default_value_t = DEFAULT_NEIGHBORS)]
        neighbors: usize,
    },

    /// Predict from a JSON object or array of feature rows
    Predict {
        /// Artifact directory
        #[arg(short, long, default_value = "artifacts")]
        model: PathBuf,

        /// JSON input file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "solarcast=info,solarcast_forecast=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Train {
            data,
            out,
            trees,
            seed,
            neighbors,
            test_size,
        } => {
            let config = TrainingConfig {
                n_estimators: trees,
                random_state: seed,
                n_neighbors: neighbors,
                test_size,
                ..TrainingConfig::new(data, out)
            };
            commands::model::train(&config)?;
        }
        Commands::Evaluate {
            data,
            model,
            neighbors,
        } => commands::model::evaluate(&data, &model, neighbors)?,
        Commands::Predict { model, input } => commands::model::predict(&model, &input)?,
    }
    Ok(())
}
