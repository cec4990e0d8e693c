// Simmer - time-boxed multi-phase query refinement
// Main entry point

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossterm::{cursor::Show, execute};
use std::path::PathBuf;
use std::sync::Arc;

use simmer::cli::Repl;
use simmer::completion::{CompletionClient, HttpCompletionClient};
use simmer::config::{load_config, ConfigOverrides};
use simmer::context::collect_context;
use simmer::logging::init_logging;
use simmer::refine::{build_system_instruction, ProgressReporter, Session, TerminalSink};
use simmer::server::{ensure_server, terminate_pid, ServerPid};

#[derive(Parser, Debug)]
#[command(
    name = "simmer",
    about = "Think, draft and validate every request against a local completion server",
    version
)]
struct Args {
    /// Config file (defaults to ~/.simmer/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Completion server base URL (e.g. http://127.0.0.1:8080)
    #[arg(long)]
    endpoint: Option<String>,

    /// GGUF model for an auto-started server
    #[arg(long, value_name = "FILE")]
    model_path: Option<PathBuf>,

    /// Never start an inference server
    #[arg(long)]
    no_server: bool,

    /// File or directory folded into the system prompt (repeatable)
    #[arg(long = "context", value_name = "PATH")]
    context: Vec<PathBuf>,

    /// Minimum seconds of the Thinking phase
    #[arg(long)]
    thinking_secs: Option<u64>,

    /// Minimum seconds of the Validation phase
    #[arg(long)]
    validation_secs: Option<u64>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            model_path: self.model_path.clone(),
            no_server: self.no_server,
            context_paths: self.context.clone(),
            thinking_secs: self.thinking_secs,
            validation_secs: self.validation_secs,
            temperature: self.temperature,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref(), &args.overrides())?;

    let server_pid = ServerPid::new();
    install_interrupt_handler(server_pid.clone())?;
    let server = ensure_server(&config.server, &config.endpoint, &server_pid).await?;

    let context = collect_context(&config.context.paths, config.context.max_file_bytes);
    let system = build_system_instruction(&config.system_prompt, &context);

    let client: Arc<dyn CompletionClient> = Arc::new(HttpCompletionClient::new(&config.endpoint)?);
    let progress = ProgressReporter::new(Arc::new(TerminalSink::new()), config.refine.tick());
    let session = Session::new(client, progress, &config.refine, system);

    let result = match Repl::new(session) {
        Ok(mut repl) => repl.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = server.shutdown().await {
        tracing::warn!("Failed to stop inference server: {}", e);
    }

    result
}

/// Ctrl-C outside the prompt (server startup or a completion call): restore
/// the cursor, stop a server we started, and exit.
fn install_interrupt_handler(server_pid: ServerPid) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = execute!(std::io::stderr(), Show);
        eprintln!();
        if let Some(pid) = server_pid.get() {
            terminate_pid(pid);
        }
        std::process::exit(130);
    })
    .context("Failed to install Ctrl-C handler")
}
