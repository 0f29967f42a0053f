//! Minimal operator CLI (spec §6). The HTTP/WebSocket front-ends an embedder
//! would actually ship are out of scope; this binary exists so a config file
//! and a flow set can be smoke-tested from a terminal.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dialogue_core::command::Command;
use dialogue_core::context::RuntimeContextBuilder;
use dialogue_core::ids::SessionId;
use dialogue_core::nlu::{NluAdapter, NluInput, NluOutput};
use dialogue_core::runtime::RuntimeLoop;
use dialogue_core::{Error, RuntimeConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dialogue-cli", about = "Operator CLI for the dialogue runtime")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Launch an interactive session against the flows wired into this build.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Not supported by this build: prompt optimization lives in the
    /// understanding layer, which this crate treats as an external collaborator.
    Optimize {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        trials: u32,
    },
}

/// Stands in for the NLU adapter this crate treats as an external
/// collaborator (spec §1): every message comes back `OutOfScope`, so the
/// loop is exercisable end to end without a real understanding layer wired
/// in. An embedder replaces this with `RuntimeContextBuilder::nlu_adapter`.
struct EchoNlu;

#[async_trait]
impl NluAdapter for EchoNlu {
    async fn predict(&self, input: NluInput) -> dialogue_core::Result<NluOutput> {
        Ok(NluOutput {
            commands: vec![Command::OutOfScope { topic: input.user_message }],
            entities: Vec::new(),
            confidence: 1.0,
            reasoning: "no understanding layer wired into this build".to_string(),
        })
    }
}

fn load_config(path: &PathBuf) -> dialogue_core::Result<RuntimeConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::configuration(format!("reading {}: {e}", path.display())))?;
    let mut config: RuntimeConfig = serde_json::from_str(&contents)
        .map_err(|e| Error::configuration(format!("parsing {}: {e}", path.display())))?;
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    dialogue_core::observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Optimize { .. } => {
            eprintln!("optimize is not supported by this build: prompt optimization is delegated to the understanding layer");
            ExitCode::from(2)
        }
        CliCommand::Run { config } => match run(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(Error::Configuration(msg)) => {
                eprintln!("configuration error: {msg}");
                ExitCode::from(2)
            }
            Err(e) => {
                eprintln!("runtime error: {e}");
                ExitCode::from(1)
            }
        },
    }
}

async fn run(config_path: PathBuf) -> dialogue_core::Result<()> {
    let config = load_config(&config_path)?;
    let runtime = Arc::new(
        RuntimeContextBuilder::new(config)
            .nlu_adapter(Arc::new(EchoNlu))
            .build()?,
    );
    let checkpointer = Arc::new(dialogue_core::checkpoint::InMemoryCheckpointer::new());
    let runtime_loop = RuntimeLoop::new(runtime, checkpointer);
    let session_id = SessionId::new();

    println!("session {session_id} started; type a message and press enter (Ctrl-D to quit)");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(Error::from)?;
        if line.trim().is_empty() {
            continue;
        }
        let result = runtime_loop.process_message(&session_id, line).await?;
        println!("{}", result.response);
        io::stdout().flush().map_err(Error::from)?;
    }
    Ok(())
}
