//! CLI subcommands: run a node, inspect configuration.

mod config_cmd;
mod run;

use std::path::Path;

use clap::Subcommand;
use serde::Serialize;

pub(super) use discolink_lib::config::Config;
pub(super) use discolink_lib::error::{DiscoError, Result};
pub(super) use discolink_lib::router::Role;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w - 2));
}

/// Load the config from `custom_path` (or the platform default), then apply
/// environment overrides. Problems are logged, never fatal here.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let (mut config, mut warnings) = match custom_path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    warnings.extend(config.apply_env());
    for w in &warnings {
        log::warn!("[config] {w}");
    }
    config
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub derived: DerivedJson,
    pub problems: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct DerivedJson {
    pub animation_topic: String,
    pub song_name_topic: String,
    pub song_list_topic: String,
    pub songs_path: String,
    pub controller_client_id: String,
    pub renderer_client_id: String,
}

#[derive(Serialize)]
pub(super) struct InitOutput {
    pub config_file: String,
    pub replaced: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Controller node (knob, button, small strip, display)
    Controller,

    /// Run the Renderer node (large strip, speaker, song storage)
    Renderer,

    /// Show the effective configuration and file paths
    Config {
        /// Write the effective configuration (file plus environment) to the config file
        #[arg(long)]
        init: bool,

        /// Allow --init to replace an existing file
        #[arg(long, requires = "init")]
        force: bool,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, json: bool, custom_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Controller => {
            if json {
                warn_json_unsupported("controller");
            }
            run::cmd_run(Role::Controller, custom_path)
        }
        Command::Renderer => {
            if json {
                warn_json_unsupported("renderer");
            }
            run::cmd_run(Role::Renderer, custom_path)
        }
        Command::Config { init: true, force } => {
            config_cmd::cmd_config_init(json, custom_path, force)
        }
        Command::Config { init: false, .. } => config_cmd::cmd_config(json, custom_path),
    }
}
