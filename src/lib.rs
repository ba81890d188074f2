pub mod catalog;
pub mod engine;
pub mod models;
pub mod settings;
pub mod timer;
mod utils;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use catalog::Catalog;
use settings::SettingsStore;
use timer::commands::{self, PlayArgs};

#[derive(Parser, Debug)]
#[command(name = "stillpoint", version, about)]
struct Cli {
    /// Practice settings JSON. Defaults apply when the file does not exist.
    #[arg(long, env = "STILLPOINT_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in breathing patterns and scripts.
    List,
    /// Run a session in the terminal.
    Play {
        /// Program id, as shown by `list`.
        id: String,

        /// Stop after this many breathing cycles.
        #[arg(long, conflicts_with = "unbounded")]
        cycles: Option<u32>,

        /// Keep cycling until interrupted.
        #[arg(long, default_value_t = false)]
        unbounded: bool,

        /// Override the tick interval in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,
    },
}

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    log::info!("stillpoint starting up...");

    let catalog = Catalog::builtin()?;
    let settings = match cli.settings {
        Some(path) => SettingsStore::new(path)?,
        None => SettingsStore::in_memory(),
    };

    match cli.cmd {
        Command::List => commands::list_programs(&catalog),
        Command::Play {
            id,
            cycles,
            unbounded,
            tick_ms,
        } => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            let args = PlayArgs {
                id,
                cycles,
                unbounded,
                tick_ms,
            };
            let record = runtime.block_on(commands::play(&catalog, &settings, args))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}
