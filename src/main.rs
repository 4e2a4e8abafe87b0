mod cli;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands, NormalizeArgs};
use geosubmit::config::Config;
use geosubmit::observability;
use geosubmit::submission::{BatchCounts, NormalizedObservation, validate_and_normalize};
use serde::Serialize;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Serialize)]
struct NormalizeOutput {
    observations: Vec<NormalizedObservation>,
    counts: BatchCounts,
}

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let config = match cli.config {
                Some(path) => Config::load_from_path(path)?,
                None => Config::load()?,
            };
            geosubmit::api::run(config, args.address).await?
        }
        Commands::Normalize(args) => normalize(args)?,
    }

    Ok(())
}

fn normalize(args: NormalizeArgs) -> Result<(), AnyError> {
    let data = std::fs::read(&args.input)?;
    let raw: serde_json::Value = serde_json::from_slice(&data)?;
    let submission = validate_and_normalize(&raw, Utc::now())?;

    let output = NormalizeOutput {
        observations: submission.observations.into_observations(),
        counts: submission.counts,
    };
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}
