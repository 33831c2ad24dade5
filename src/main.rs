// main.rs
mod cli;
mod config;
mod error;
mod genai;
mod language;
mod logging;
mod memory;
mod mind_map;
mod nlp;
mod ui;

use anyhow::Result;
use clap::Parser;
use tokio::runtime::Runtime;

use cli::{Args, Commands};
use config::Config;

// The window loop must own the main thread; one-shot commands run on an
// explicitly built runtime instead.
fn main() -> Result<()> {
    let args = Args::parse();

    let startup = Config::new(None)?;
    logging::init(&startup)?;

    let command = match args.command {
        Some(command) => command,
        None => return ui::run_gui(startup),
    };

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        match command {
            Commands::Chat { message, data_dir } => cli::handle_chat(message, data_dir).await,
            Commands::Analyze { text, data_dir } => cli::handle_analyze(text, data_dir).await,
            Commands::Teach {
                text,
                feedback,
                data_dir,
            } => cli::handle_teach(text, feedback, data_dir).await,
            Commands::Keywords { text, data_dir } => cli::handle_keywords(text, data_dir).await,
            Commands::Summarize {
                text,
                sentences,
                data_dir,
            } => cli::handle_summarize(text, sentences, data_dir).await,
            Commands::Map { command } => cli::handle_map(command).await,
            Commands::Memory { command } => cli::handle_memory(command).await,
            Commands::Config { command } => cli::handle_config(command).await,
        }
    })
}
