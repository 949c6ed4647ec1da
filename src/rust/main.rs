use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use persona::{BenchmarkHarness, BuiltinModel, Config, InferenceService, ModelManager, Trainer};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; falls back to $PERSONA_CONFIG, ./persona.toml, then defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on the configured dataset and persist the artifacts
    Train,
    /// Predict the personality type of one text
    Predict {
        text: String,
        #[arg(long)]
        requester_id: Option<String>,
    },
    /// Predict several texts, given as arguments or one per line in a file
    Batch {
        texts: Vec<String>,
        #[arg(short, long, conflicts_with = "texts")]
        file: Option<PathBuf>,
    },
    /// Describe the persisted model
    Describe,
    /// Retrain from the dataset and activate the new model
    Retrain,
    /// Compare the baseline with the configured pretrained models
    Benchmark {
        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Fetch the encoder used by embedding benchmark entries
    DownloadModel {
        /// Force a fresh download of the model files
        #[arg(long)]
        fresh: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn serving(config: &Config) -> anyhow::Result<InferenceService> {
    let service = InferenceService::new();
    service
        .load_from_dir(&config.output.model_dir)
        .with_context(|| format!("no usable model in {:?}; run `persona train` first", config.output.model_dir))?;
    Ok(service)
}

fn read_texts(texts: Vec<String>, file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    let texts = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {:?}", path))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
        None => texts,
    };
    if texts.is_empty() {
        bail!("no texts given");
    }
    Ok(texts)
}

async fn download_model(fresh: bool) -> anyhow::Result<()> {
    let manager = ModelManager::new_default()?;
    let model = BuiltinModel::MiniLM;

    if fresh {
        info!("Fresh download requested, removing any existing model files");
        manager.remove_download(model)?;
    }
    manager.ensure_model_downloaded(model).await?;
    println!("Model ready in {:?}", manager.models_dir());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    persona::init_logger();
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Train => {
            let started = Instant::now();
            let mut trainer = Trainer::from_config(&config);
            let (_, report) = tokio::task::spawn_blocking(move || trainer.run_default()).await??;
            info!("Training finished in {:.2?}", started.elapsed());
            print_json(&report)?;
        }
        Command::Predict { text, requester_id } => {
            let service = serving(&config)?;
            print_json(&service.predict_one(&text, requester_id.as_deref())?)?;
        }
        Command::Batch { texts, file } => {
            let texts = read_texts(texts, file)?;
            let service = serving(&config)?;
            print_json(&service.predict_batch(&texts)?)?;
        }
        Command::Describe => {
            let service = serving(&config)?;
            print_json(&service.describe_model()?)?;
        }
        Command::Retrain => {
            let service = InferenceService::new();
            if let Err(e) = service.load_from_dir(&config.output.model_dir) {
                info!("Starting without an active model: {}", e);
            }
            print_json(&service.reload(Trainer::from_config(&config)).await?)?;
        }
        Command::Benchmark { json } => {
            let report = BenchmarkHarness::new(config).run().await?;
            if json {
                print_json(&report)?;
            } else {
                print!("{}", report);
            }
        }
        Command::DownloadModel { fresh } => download_model(fresh).await?,
    }

    Ok(())
}
