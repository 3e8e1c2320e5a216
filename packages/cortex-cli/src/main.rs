//! Cortex command-line front end.
//!
//! Asks a research question against a document collection and prints the
//! answer with its verified citations.

mod config;
mod render;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use grounding::{
    AgentEvent, GroundingConfig, GroundingError, GroundingOrchestrator, PipelineResult, Question,
    ResearchAgent, SelectionPolicy,
};
use mcp_client::McpClient;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "cortex")]
#[command(about = "Ask research questions and get verified citations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ground the collection's draft answer
    Ask {
        #[command(flatten)]
        args: QuestionArgs,

        /// Cite only the single best candidate
        #[arg(long)]
        single: bool,

        /// Skip semantic reranking
        #[arg(long)]
        no_rerank: bool,
    },

    /// Compose a final answer with the research agent
    Chat {
        #[command(flatten)]
        args: QuestionArgs,

        /// Print reasoning steps as they complete
        #[arg(long)]
        stream: bool,
    },

    /// Generate an answer that cites enumerated chunks
    Grounded {
        #[command(flatten)]
        args: QuestionArgs,
    },
}

#[derive(Args)]
struct QuestionArgs {
    /// Collection to query
    collection: i64,

    /// The question
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,

    /// Maximum number of citations
    #[arg(long)]
    max_sources: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl QuestionArgs {
    fn question(&self) -> Question {
        Question::new(self.collection, self.question.join(" "))
    }

    fn grounding_config(&self, config: &Config) -> GroundingConfig {
        let grounding = config.grounding_config();
        match self.max_sources {
            Some(n) => grounding.with_max_sources(n),
            None => grounding,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so stdout stays parseable with --json)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,grounding=info,mcp_client=info,cortex=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    info!(mcp_url = %config.mcp_url, "Starting Cortex");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            ctrl_c.cancel();
        }
    });

    let failed = match cli.command {
        Commands::Ask {
            args,
            single,
            no_rerank,
        } => ask(&config, &args, single, no_rerank, cancel).await?,
        Commands::Chat { args, stream } => chat(&config, &args, stream, cancel).await?,
        Commands::Grounded { args } => grounded(&config, &args, cancel).await?,
    };

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Orchestrator over the MCP service, used as both retriever and chunk store.
fn orchestrator(
    config: &Config,
    grounding: GroundingConfig,
) -> GroundingOrchestrator<McpClient, McpClient> {
    let client = config.mcp_client();
    GroundingOrchestrator::new(client.clone(), client).with_config(grounding)
}

async fn ask(
    config: &Config,
    args: &QuestionArgs,
    single: bool,
    no_rerank: bool,
    cancel: CancellationToken,
) -> Result<bool> {
    let mut grounding = args.grounding_config(config);
    if single {
        grounding = grounding.with_selection(SelectionPolicy::SingleBest);
    }
    if no_rerank {
        grounding = grounding.with_rerank(false);
    }

    let rerank = grounding.rerank;
    let mut orchestrator = orchestrator(config, grounding);
    match config.gemini() {
        Some(gemini) if rerank => orchestrator = orchestrator.with_embedder(Arc::new(gemini)),
        None if rerank => info!("GEMINI_API_KEY not set, semantic ranking disabled"),
        _ => {}
    }

    let result = orchestrator
        .run_with_cancel(&args.question(), cancel)
        .await
        .map_err(cancelled)?;

    print_pipeline_result(&result, args.json)?;
    Ok(result.is_error())
}

async fn grounded(config: &Config, args: &QuestionArgs, cancel: CancellationToken) -> Result<bool> {
    let gemini = Arc::new(config.require_gemini()?);
    let grounding = args.grounding_config(config);

    let mut orchestrator = orchestrator(config, grounding).with_generator(gemini.clone());
    if orchestrator.config().rerank {
        orchestrator = orchestrator.with_embedder(gemini);
    }

    let result = orchestrator
        .run_grounded_with_cancel(&args.question(), cancel)
        .await
        .map_err(cancelled)?;

    print_pipeline_result(&result, args.json)?;
    Ok(result.is_error())
}

async fn chat(
    config: &Config,
    args: &QuestionArgs,
    stream: bool,
    cancel: CancellationToken,
) -> Result<bool> {
    let gemini = Arc::new(config.require_gemini()?);
    let grounding = args.grounding_config(config);

    let mut orchestrator = orchestrator(config, grounding);
    if orchestrator.config().rerank {
        orchestrator = orchestrator.with_embedder(gemini.clone());
    }
    let agent = ResearchAgent::new(orchestrator, gemini);
    let question = args.question();

    if !stream {
        let response = agent
            .chat_with_cancel(&question, cancel)
            .await
            .map_err(cancelled)?;
        if args.json {
            print_json(&response)?;
        } else {
            render::print_agent_response(&response);
        }
        return Ok(response.is_error());
    }

    let mut events = agent.chat_stream(&question);
    let mut failed = false;
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(GroundingError::Cancelled)),
            event = events.next() => event,
        };
        let Some(event) = event else { break };

        if args.json {
            // One JSON object per line
            println!(
                "{}",
                serde_json::to_string(&event).context("Failed to serialize event")?
            );
        }

        match event {
            AgentEvent::Step(step) if !args.json => render::print_step(&step),
            AgentEvent::Done(response) => {
                failed = response.is_error();
                if !args.json {
                    render::print_agent_response(&response);
                }
            }
            _ => {}
        }
    }

    Ok(failed)
}

fn print_pipeline_result(result: &PipelineResult, json: bool) -> Result<()> {
    if json {
        print_json(result)
    } else {
        render::print_result(result);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn cancelled(e: GroundingError) -> anyhow::Error {
    anyhow::Error::new(e).context("Run cancelled")
}
