//! # marks-rag CLI (`mrag`)
//!
//! Ask questions against a vector index, inspect the selected embedding
//! model, run diagnostics, or serve the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! mrag --config ./config/mrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mrag ask "<question>"` | Answer a question scaled to `--marks` |
//! | `mrag serve` | Start the HTTP server |
//! | `mrag diagnose` | Health checks, test queries, and recommendations |
//! | `mrag stats` | Index, model, and benchmark overview |
//! | `mrag models` | List catalog models, optionally for one dimension |
//!
//! `PINECONE_API_KEY` and `GROQ_API_KEY` must be set for every command
//! except `models`. `OPENAI_API_KEY` is needed only when an OpenAI model
//! is loaded. Log verbosity is controlled by `MRAG_LOG` (default `info`).
//!
//! ## Examples
//!
//! ```bash
//! # Eight-mark answer with the auto-selected model
//! mrag ask "Explain the waterfall model" --marks 8
//!
//! # Skip auto-detection and force a model
//! mrag --model bge-base-en-v1.5 ask "What is regression testing?"
//!
//! # Full diagnosis, saved as JSON
//! mrag diagnose --save --out ./reports
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use marks_rag::config::{self, Config, EmbeddingMode};
use marks_rag::diagnose;
use marks_rag::pipeline::{Pipeline, QueryOptions};
use marks_rag::server;
use marks_rag::stats;
use marks_rag_core::catalog;
use marks_rag_core::models::QueryResult;

/// marks-rag CLI: marks-scaled answers grounded in a vector index.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mrag",
    about = "marks-rag: marks-scaled exam answers grounded in a vector index",
    version,
    long_about = "marks-rag discovers the dimension of a Pinecone index, benchmarks the \
    embedding models that could have built it, and answers questions with a Groq-hosted \
    model using a prompt scaled to the requested marks."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mrag.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/mrag.toml")]
    config: PathBuf,

    /// Force an embedding model, skipping auto-detection.
    ///
    /// Must be a catalog identifier (see `mrag models`). If it fails to
    /// load, auto-detection runs instead.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question.
    ///
    /// Retrieves matching documents with the active embedding model and
    /// generates an answer whose depth follows `--marks`.
    Ask {
        /// The question.
        query: String,

        /// Marks the answer is worth. Bands start at 1, 2, 3, 5, 8, 10, and
        /// 15; other values use the largest band below them.
        #[arg(long, default_value_t = 5)]
        marks: u32,

        /// Number of documents to retrieve. Defaults to `[retrieval].top_k`.
        #[arg(long)]
        top_k: Option<usize>,

        /// Sampling temperature for generation.
        #[arg(long, default_value_t = 0.3)]
        temperature: f32,

        /// Minimum similarity score for a document to be used.
        #[arg(long)]
        min_score: Option<f32>,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/query`, `/model`, `/stats`,
    /// `/diagnose`, and `/health`.
    Serve,

    /// Run diagnostics.
    ///
    /// Checks index connectivity, embedding, generation, and retrieval,
    /// then runs a fixed set of test questions.
    Diagnose {
        /// Run one test question instead of the full diagnosis.
        #[arg(long)]
        quick: bool,

        /// Write the report as JSON.
        #[arg(long)]
        save: bool,

        /// Directory for saved reports.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Show index, model, and query statistics.
    Stats,

    /// List known embedding models.
    Models {
        /// Only models producing vectors of this dimension, in selection order.
        #[arg(long)]
        dimension: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("MRAG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        // Commands that don't require config
        Commands::Models { dimension } => {
            print_models(dimension);
        }
        Commands::Ask {
            ref query,
            marks,
            top_k,
            temperature,
            min_score,
            json,
        } => {
            let cfg = load_config(&cli)?;
            let pipeline = Pipeline::from_config(&cfg).await?;
            let defaults = pipeline.retrieval_options();
            let options = QueryOptions {
                marks,
                top_k: top_k.unwrap_or(defaults.top_k),
                temperature,
                min_score: min_score.unwrap_or(defaults.min_score),
            };
            let result = pipeline.answer(query, &options).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_answer(&result);
            }
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            let cfg = load_config(&cli)?;
            let pipeline = Pipeline::from_config(&cfg).await?;
            server::run_server(Arc::new(pipeline), &cfg.server.bind, &cfg.server.cors_origins)
                .await?;
        }
        Commands::Diagnose {
            quick,
            save,
            ref out,
        } => {
            let cfg = load_config(&cli)?;
            let pipeline = Pipeline::from_config(&cfg).await?;
            if quick {
                let result = diagnose::quick_test(&pipeline).await;
                print_answer(&result);
                if save {
                    let path = diagnose::save_report(&result, out)?;
                    println!("Report saved to {}", path.display());
                }
            } else {
                let report = diagnose::run_full_diagnosis(&pipeline).await;
                diagnose::print_full_report(&report);
                if save {
                    let path = diagnose::save_report(&report, out)?;
                    println!();
                    println!("Report saved to {}", path.display());
                }
            }
        }
        Commands::Stats => {
            let cfg = load_config(&cli)?;
            let pipeline = Pipeline::from_config(&cfg).await?;
            stats::print_stats(&pipeline.system_stats());
        }
    }

    Ok(())
}

/// Load the config file and apply `--model`.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = config::load_config(&cli.config)?;
    if let Some(model) = &cli.model {
        cfg.embedding.mode = EmbeddingMode::Forced;
        cfg.embedding.model = Some(model.clone());
        config::validate(&cfg)?;
    }
    Ok(cfg)
}

fn print_answer(result: &QueryResult) {
    println!("{}", result.answer);
    println!();

    if !result.sources.is_empty() {
        println!("{:<5} {:>7}  {:<24} PREVIEW", "RANK", "SCORE", "ID");
        for source in &result.sources {
            let preview: String = source
                .preview
                .chars()
                .map(|c| if c.is_whitespace() { ' ' } else { c })
                .take(60)
                .collect();
            println!(
                "{:<5} {:>7.4}  {:<24} {}",
                source.rank, source.score, source.id, preview
            );
        }
        println!();
    }

    println!(
        "model: {} | dimension: {} | marks: {} | time: {}",
        result.active_model,
        result.index_dimension,
        result.marks,
        stats::format_secs(result.query_time)
    );
    if let Some(error) = &result.error {
        println!("error: {}", error);
    }
}

fn print_models(dimension: Option<usize>) {
    let models = match dimension {
        Some(d) => catalog::compatible_models(d),
        None => catalog::CATALOG.to_vec(),
    };
    if models.is_empty() {
        println!("No known models for this dimension.");
        if let Some(d) = dimension {
            let fallback = catalog::default_for_dimension(d);
            println!(
                "Default fallback: {} ({} dims)",
                fallback.identifier, fallback.dimension
            );
        }
        return;
    }

    println!("{:<40} {:>6}  {:<8} RECOMMENDED", "MODEL", "DIMS", "BACKEND");
    for model in models {
        let recommended = catalog::recommended_for(model.dimension).contains(&model.identifier);
        println!(
            "{:<40} {:>6}  {:<8} {}",
            model.identifier,
            model.dimension,
            format!("{:?}", model.backend).to_lowercase(),
            if recommended { "yes" } else { "" }
        );
    }
}
