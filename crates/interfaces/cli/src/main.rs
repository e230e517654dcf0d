mod interactive;
mod memory_cmds;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use kabo_config::{AppConfig, TelemetryConfig};
use kabo_memory::{DataDirLock, MemoryPaths};
use kabo_runtime::AgentRuntime;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "kabo",
    version,
    about = "Kabo-chan, a conversational persona with long-term memory"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a line chat session (the default).
    Chat,
    /// Send one message and print the reply.
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Show the active configuration and check that the model answers.
    Doctor,
}

#[derive(Debug, Subcommand)]
enum MemoryCommands {
    Stats,
    /// Print the most recent conversation turns.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List the most recent archived episodes.
    Episodes {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Find archived episodes similar to a query.
    Search {
        query: String,
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
    /// Summarize older turns, keeping the most recent ones verbatim.
    Trim {
        /// Defaults to `memory.summary_limit`.
        #[arg(long)]
        threshold: Option<usize>,
    },
    /// Delete the conversation history (episodes are kept).
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;
    let _log_guard = init_tracing(&config.telemetry);

    let paths = MemoryPaths::new(config.data_dir());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let _lock = DataDirLock::acquire(&paths.root)?;
            let mut runtime = AgentRuntime::from_config(config).await?;
            interactive::run_interactive_line_session(&mut runtime).await?;
        }
        Commands::Ask { message } => {
            let message = message.join(" ");
            if message.trim().is_empty() {
                bail!("message must not be empty");
            }
            let _lock = DataDirLock::acquire(&paths.root)?;
            let mut runtime = AgentRuntime::from_config(config).await?;
            println!("{}", runtime.get_response(&message).await);
        }
        Commands::Doctor => {
            println!("kabo doctor");
            println!("- config: {}", cli.config.display());
            println!("- memory directory: {}", paths.root.display());
            println!("- provider: {}", config.llm.provider);
            println!("- model: {}", config.active_model());
            println!("- embeddings: {:?}", config.llm.embedding_backend);
            println!("- timezone: {}", config.persona.timezone);

            let _lock = DataDirLock::acquire(&paths.root)?;
            let runtime = AgentRuntime::from_config(config).await?;
            match runtime.test_model_connection().await {
                Ok(status) => println!("- model check: ok ({status})"),
                Err(err) => bail!("model check failed: {err:#}"),
            }
        }
        Commands::Memory { command } => match command {
            MemoryCommands::Stats => memory_cmds::run_memory_stats(&paths)?,
            MemoryCommands::History { limit } => {
                memory_cmds::run_memory_history(&paths, &config.persona.name, limit.max(1))?;
            }
            MemoryCommands::Episodes { limit } => {
                memory_cmds::run_memory_episodes(&paths, limit.max(1))?;
            }
            MemoryCommands::Search { query, k } => {
                let _lock = DataDirLock::acquire(&paths.root)?;
                let runtime = AgentRuntime::from_config(config).await?;
                memory_cmds::run_memory_search(&runtime, &query, k).await?;
            }
            MemoryCommands::Trim { threshold } => {
                let threshold = threshold.unwrap_or(config.memory.summary_limit);
                let _lock = DataDirLock::acquire(&paths.root)?;
                let mut runtime = AgentRuntime::from_config(config).await?;
                memory_cmds::run_memory_trim(&mut runtime, threshold).await?;
            }
            MemoryCommands::Clear { yes } => {
                let _lock = DataDirLock::acquire(&paths.root)?;
                memory_cmds::run_memory_clear(&paths, yes).await?;
            }
        },
    }

    info!("kabo exiting");
    Ok(())
}

/// Log to stderr, or to a daily rolling file when `telemetry.log_file` is
/// set.  `RUST_LOG` wins over `telemetry.log_level`.  The returned guard
/// flushes the file writer on drop.
fn init_tracing(telemetry: &TelemetryConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.as_str()));

    let log_file = telemetry.log_file.trim();
    if log_file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return None;
    }

    let path = Path::new(log_file);
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kabo.log".to_string());

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Some(guard)
}
