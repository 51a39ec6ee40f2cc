//! # LuxMap CLI
//!
//! Talk to LuxMap AI from the terminal: describe a trip, refine the plan it
//! proposes, approve it, and get back a cited travel report.
//!
//! ```bash
//! cargo run -- "Four days in Dubai, luxury hotels and hidden cafes"
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use luxmap_agent::{Config, InteractivePlanner, OllamaModel, PlannerReply, SessionState};

#[derive(Parser, Debug)]
#[command(
    name = "luxmap",
    version,
    about = "LuxMap AI: plans a trip with you, then researches it and writes a cited travel report",
    long_about = r#"
LuxMap AI turns any travel request into a plan, refines it with your feedback,
and once you approve it ("looks good, run it") researches the web, critiques
and improves its findings, and writes a travel report with linked sources.

PREREQUISITES:
  1. Install Ollama: https://ollama.ai
  2. Pull a model: ollama pull llama3.2
  3. Start Ollama: ollama serve

EXAMPLES:
  luxmap "A weekend in Lisbon for food lovers"
  luxmap --yes "Three days in Tokyo on a budget"
  luxmap --session trip.json "Add a day trip to Sintra"
"#
)]
struct Args {
    /// Trip request or feedback on the current plan
    #[arg(value_name = "QUERY")]
    query: Option<String>,

    /// Worker model for planning and research
    #[arg(short = 'm', long = "model", env = "WORKER_MODEL")]
    model: Option<String>,

    /// Critic model for evaluation and report writing
    #[arg(long = "critic-model", env = "CRITIC_MODEL")]
    critic_model: Option<String>,

    /// Load the session from this JSON file and save it back on exit
    #[arg(short = 's', long = "session", value_name = "PATH")]
    session: Option<PathBuf>,

    /// Approve the first plan without asking
    #[arg(short = 'y', long = "yes", default_value = "false")]
    yes: bool,

    /// Cap on evaluate/refine iterations
    #[arg(long = "max-iterations")]
    max_iterations: Option<usize>,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(model) = args.model.clone() {
        config.worker_model = model;
    }
    if let Some(model) = args.critic_model.clone() {
        config.critic_model = model;
    }
    if let Some(n) = args.max_iterations {
        config.max_search_iterations = n;
    }
    config.validate()?;

    info!(
        agent = %config.internal_agent_name(),
        worker = %config.worker_model,
        critic = %config.critic_model,
        host = %config.ollama_host,
        "Configuration loaded"
    );

    let mut session = match &args.session {
        Some(path) if path.exists() => SessionState::load(path)
            .with_context(|| format!("Failed to load session {}", path.display()))?,
        _ => SessionState::new(),
    };

    let planner = InteractivePlanner::new(&config, Arc::new(OllamaModel::new(&config)));
    let outcome = converse(&planner, &mut session, &args).await;

    if let Some(path) = &args.session {
        session
            .save(path)
            .with_context(|| format!("Failed to save session {}", path.display()))?;
        info!(path = %path.display(), "Session saved");
    }

    if let Err(e) = &outcome {
        error!(error = %e, "LuxMap failed");
        if e.to_string().to_lowercase().contains("connection refused") {
            eprintln!("\nTip: make sure Ollama is running: ollama serve");
        }
    }
    outcome
}

/// Read messages from the command line and stdin until a report is
/// produced, the user quits, or input ends.
async fn converse(planner: &InteractivePlanner, session: &mut SessionState, args: &Args) -> Result<()> {
    let mut next = match &args.query {
        Some(query) => Some(query.clone()),
        None if session.research_plan().is_some() => read_message("Feedback or approval")?,
        None => read_message("Where would you like to go?")?,
    };

    while let Some(message) = next.take() {
        let reply = planner.handle(session, &message).await?;

        match reply {
            PlannerReply::Report(report) => {
                print_block("TRAVEL REPORT", &report);
                return Ok(());
            }
            PlannerReply::Plan(plan) => {
                print_block("TRAVEL PLAN", &plan);
                if args.yes {
                    if let PlannerReply::Report(report) = planner.execute(session).await? {
                        print_block("TRAVEL REPORT", &report);
                    }
                    return Ok(());
                }
                next = read_message("Feedback, or approve the plan to run it (\"quit\" to stop)")?;
            }
        }
    }

    Ok(())
}

fn read_message(prompt: &str) -> Result<Option<String>> {
    print!("\n{prompt}\n> ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }

    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}

fn print_block(title: &str, body: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}\n", "=".repeat(60));
    println!("{body}");
    println!("\n{}", "=".repeat(60));
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(Level::DEBUG.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
