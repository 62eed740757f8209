//! `config` subcommand: show the effective configuration and file paths,
//! or write it out with `--init`.

use std::path::Path;

use discolink_lib::animation::{format_color, parse_color};

use super::{
    Config, ConfigOutput, DerivedJson, DiscoError, InitOutput, Result, Role, kv, kv_indent,
    kv_width,
};

const REDACTED: &str = "(set)";

/// Hide secrets before printing.
fn redacted(config: &Config) -> Config {
    let hide = |s: &str| {
        if s.is_empty() {
            String::new()
        } else {
            REDACTED.to_string()
        }
    };
    Config {
        key: hide(&config.key),
        wifi_password: hide(&config.wifi_password),
        ..config.clone()
    }
}

fn problems(config: &Config) -> Vec<String> {
    match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let topics = config.topics();
    let songs_path = config.songs_path();
    let problems = problems(&config);
    let shown = redacted(&config);

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: shown,
            derived: DerivedJson {
                animation_topic: topics.animation,
                song_name_topic: topics.song_name,
                song_list_topic: topics.song_list,
                songs_path: songs_path.display().to_string(),
                controller_client_id: config.client_id(Role::Controller),
                renderer_client_id: config.client_id(Role::Renderer),
            },
            problems,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| DiscoError::Config(format!("serialize: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "broker:",
            "username:",
            "key:",
            "wifi_ssid:",
            "songs_dir:",
            "self_test_file:",
            "pixels:",
            "solid_color:",
            "rainbow:",
            "debounce_ms:",
            "restart_cooldown_secs:",
            "reconnect:",
            "Animation:",
            "Song name:",
            "Song list:",
        ],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let scheme = if shown.broker_tls { "mqtts" } else { "mqtt" };
    kv_indent(
        "broker:",
        format_args!("{scheme}://{}:{}", shown.broker_host, shown.broker_port),
        w,
    );
    let or_unset = |s: &str| {
        if s.trim().is_empty() {
            "(not set)".to_string()
        } else {
            s.to_string()
        }
    };
    kv_indent("username:", or_unset(&shown.username), w);
    kv_indent("key:", or_unset(&shown.key), w);
    kv_indent("wifi_ssid:", or_unset(&shown.wifi_ssid), w);
    kv_indent("songs_dir:", songs_path.display(), w);
    kv_indent("self_test_file:", or_unset(&shown.self_test_file), w);
    kv_indent(
        "pixels:",
        format_args!(
            "controller {}, renderer {}",
            shown.controller_pixels, shown.renderer_pixels
        ),
        w,
    );
    let color_display = match parse_color(&shown.solid_color) {
        Ok(c) => format!("{} -> {}", shown.solid_color, format_color(c)),
        Err(_) => format!("{} (invalid)", shown.solid_color),
    };
    kv_indent("solid_color:", color_display, w);
    kv_indent(
        "rainbow:",
        format_args!(
            "frame every {} ms, cycle {} ms",
            shown.rainbow_speed_ms, shown.rainbow_period_ms
        ),
        w,
    );
    kv_indent("debounce_ms:", shown.debounce_ms, w);
    kv_indent("restart_cooldown_secs:", shown.restart_cooldown_secs, w);
    kv_indent(
        "reconnect:",
        format_args!(
            "{}-{} ms, fatal after {} hard faults",
            shown.reconnect_initial_ms, shown.reconnect_max_ms, shown.max_hard_faults
        ),
        w,
    );
    println!();

    println!("Feeds:");
    kv_indent("Animation:", &topics.animation, w);
    kv_indent("Song name:", &topics.song_name, w);
    kv_indent("Song list:", &topics.song_list, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}

pub(super) fn cmd_config_init(json: bool, custom_path: Option<&Path>, force: bool) -> Result<()> {
    let config = super::load_config(custom_path);
    let path = custom_path
        .map(|p| p.to_path_buf())
        .or_else(Config::path)
        .ok_or_else(|| DiscoError::Config("no config directory".into()))?;
    let replaced = path.exists();
    if replaced && !force {
        return Err(DiscoError::Config(format!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        )));
    }

    match custom_path {
        Some(p) => config.save_to(p)?,
        None => config.save()?,
    }
    log::info!("[config] wrote {}", path.display());

    if json {
        let output = InitOutput {
            config_file: path.display().to_string(),
            replaced,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| DiscoError::Config(format!("serialize: {e}")))?;
        println!("{text}");
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_redacted() {
        let config = Config {
            key: "aio_secret".into(),
            wifi_password: String::new(),
            ..Config::default()
        };
        let shown = redacted(&config);
        assert_eq!(shown.key, REDACTED);
        assert!(shown.wifi_password.is_empty());
        assert_eq!(shown.broker_host, config.broker_host);
    }

    #[test]
    fn default_config_reports_missing_username() {
        let p = problems(&Config::default());
        assert!(p.iter().any(|s| s.contains("username")), "{p:?}");
    }

    #[test]
    fn cmd_config_reads_custom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "username = \"stu\"\n").unwrap();
        assert!(cmd_config(false, Some(&path)).is_ok());
        assert!(cmd_config(true, Some(&path)).is_ok());
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "username = \"stu\"\nrenderer_pixels = 99\n").unwrap();

        assert!(cmd_config_init(false, Some(&path), false).is_err());
        assert!(!std::fs::read_to_string(&path).unwrap().starts_with('#'));

        cmd_config_init(false, Some(&path), true).unwrap();
        let (saved, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(saved.renderer_pixels, 99);
    }
}
