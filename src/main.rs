use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use sqa_pipeline::config::{Config, Secrets};
use sqa_pipeline::core::{RunSummary, SceneLayout};
use sqa_pipeline::datastore::{SupabaseTable, TaskTable};
use sqa_pipeline::orchestration::{GeminiClient, ModelClient};
use sqa_pipeline::state::{OutputCollection, SharedCollection};
use sqa_pipeline::workflow::{Generator, ScoreReport, Scorer, ScoringOptions, TaskScorer, Uploader};
use sqa_pipeline::{Error, Result};

/// Situated question-answering dataset pipeline: generate, score, upload.
#[derive(Parser, Debug)]
#[command(name = "sqa")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:
    GEMINI_API_KEY  API key for the Gemini API (generate, score)
    SUPABASE_URL    Supabase project URL (score, upload)
    SUPABASE_KEY    Supabase API key (score, upload)
    SQA_DEBUG=1     Enable debug logging (alternative to --debug)
    RUST_LOG        Full log filter, overrides both

A .env file in the working directory is loaded first.")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Path to a config file (default: ./sqa.toml, then ~/.sqa/sqa.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Generate SQA examples for a range of scenes
    Generate {
        /// First scene index (inclusive)
        #[arg(long)]
        start: Option<u32>,

        /// Last scene index (exclusive)
        #[arg(long)]
        end: Option<u32>,
    },

    /// Score a per-scene sample of tasks from the task table
    Score {
        /// Number of concurrent workers
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Tasks drawn per source per scene
        #[arg(long)]
        sample_size: Option<usize>,

        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write scores from a scoring output back to the task table
    Upload {
        /// Scoring output to upload (default: scoring_output from config)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
    },

    /// Print the mean score per source of a scoring output
    Report {
        /// Scoring output to summarize (default: scoring_output from config)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    sqa_pipeline::log::init_with_debug(cli.debug);

    let config = Config::load(cli.config.as_deref())?;
    let secrets = Secrets::from_env();
    debug!("Config: {:?}", config);
    debug!("Secrets: {:?}", secrets);

    match cli.command {
        Command::Generate { start, end } => run_generate(&config, &secrets, start, end).await,
        Command::Score {
            workers,
            sample_size,
            seed,
        } => {
            let options = ScoringOptions {
                workers: workers.unwrap_or(config.workers),
                sample_size: sample_size.unwrap_or(config.sample_size),
                seed,
            };
            run_score(&config, &secrets, options).await
        }
        Command::Upload { input } => {
            let input = input.unwrap_or_else(|| config.scoring_output.clone());
            run_upload(&config, &secrets, input).await
        }
        Command::Report { input, json } => {
            let input = input.unwrap_or_else(|| config.scoring_output.clone());
            run_report(input, json).await
        }
    }
}

async fn run_generate(
    config: &Config,
    secrets: &Secrets,
    start: Option<u32>,
    end: Option<u32>,
) -> Result<()> {
    let start = start.unwrap_or(config.scene_start);
    let end = end.unwrap_or(config.scene_end);
    if start > end {
        return Err(Error::Validation(format!(
            "--start ({}) is after --end ({})",
            start, end
        )));
    }

    let model: Arc<dyn ModelClient> = Arc::new(GeminiClient::from_config(config, secrets));
    let generator = Generator::new(
        model,
        &config.generator_model,
        SceneLayout::from_config(config),
        OutputCollection::new(&config.generation_output),
    );
    let summary = generator.run(start..end).await;
    print_summary("generate", &summary);
    Ok(())
}

async fn run_score(config: &Config, secrets: &Secrets, options: ScoringOptions) -> Result<()> {
    if options.workers == 0 || options.sample_size == 0 {
        return Err(Error::Validation(
            "--workers and --sample-size must be at least 1".to_string(),
        ));
    }

    let model: Arc<dyn ModelClient> = Arc::new(GeminiClient::from_config(config, secrets));
    let table: Arc<dyn TaskTable> = Arc::new(SupabaseTable::from_config(config, secrets));
    let output = SharedCollection::new(OutputCollection::new(&config.scoring_output));
    let scorer = TaskScorer::new(
        model,
        &config.scorer_model,
        SceneLayout::from_config(config),
        output,
    );

    info!(
        "Scoring with {} workers into {}",
        options.workers,
        config.scoring_output.display()
    );
    let summary = Scorer::new(table, scorer, options).run().await?;
    print_summary("score", &summary);
    Ok(())
}

async fn run_upload(config: &Config, secrets: &Secrets, input: PathBuf) -> Result<()> {
    let table: Arc<dyn TaskTable> = Arc::new(SupabaseTable::from_config(config, secrets));
    let summary = Uploader::new(table).run(&input).await?;
    print_summary("upload", &summary);
    Ok(())
}

async fn run_report(input: PathBuf, json: bool) -> Result<()> {
    let report = ScoreReport::load(&input).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_empty() {
        println!("No scored records in {}", input.display());
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn print_summary(command: &str, summary: &RunSummary) {
    println!("{}: {}", command, summary);
}
