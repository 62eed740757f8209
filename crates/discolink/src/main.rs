//! discolink: run a disco Controller or Renderer node from a terminal.
//!
//! The node talks to the broker over MQTT, draws its strip as a row of
//! terminal cells, and (Renderer) plays songs on the default audio output.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod broker;
mod cli;
mod console;
mod sound;

/// Shared shutdown flag: cleared by the Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "discolink",
    version,
    about = "Button-driven disco lights and music over MQTT"
)]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON (for config)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = ctrlc::set_handler(|| RUNNING.store(false, Ordering::SeqCst)) {
        log::warn!("Ctrl+C handler not installed: {e}");
    }

    if let Err(e) = cli::run(args.command, args.json, args.config.as_deref()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
