//! Node configuration: TOML-based, platform-aware paths, env overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::animation::{AnimationSettings, RainbowCycle, SweepStyle, parse_color};
use crate::catalog::SELF_TEST_FILE;
use crate::reconnect::ReconnectConfig;
use crate::router::{Role, Topics};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# discolink configuration. Environment variables override broker and Wi-Fi settings.\n\n";

/// Environment variables read by [`Config::apply_env`].
pub const ENV_USERNAME: &str = "AIO_USERNAME";
pub const ENV_KEY: &str = "AIO_KEY";
pub const ENV_BROKER: &str = "BROKER";
pub const ENV_PORT: &str = "PORT";
pub const ENV_WIFI_SSID: &str = "WIFI_SSID";
pub const ENV_WIFI_PASSWORD: &str = "WIFI_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Broker host name. Env: `BROKER`.
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    /// Broker port. Env: `PORT`.
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Wrap the broker connection in TLS.
    #[serde(default = "default_true")]
    pub broker_tls: bool,

    /// Account name; also the topic namespace. Env: `AIO_USERNAME`.
    #[serde(default)]
    pub username: String,

    /// Account key used as the broker password. Env: `AIO_KEY`.
    #[serde(default)]
    pub key: String,

    /// MQTT client id. Empty = `discolink-<role>`.
    #[serde(default)]
    pub client_id: String,

    /// Env: `WIFI_SSID`.
    #[serde(default)]
    pub wifi_ssid: String,

    /// Env: `WIFI_PASSWORD`.
    #[serde(default)]
    pub wifi_password: String,

    /// Directory holding the Renderer's songs. Empty = `<config dir>/songs`.
    #[serde(default)]
    pub songs_dir: String,

    /// Played once at Renderer boot. Empty = skip the self-test.
    #[serde(default = "default_self_test_file")]
    pub self_test_file: String,

    #[serde(default = "default_controller_pixels")]
    pub controller_pixels: usize,

    #[serde(default = "default_renderer_pixels")]
    pub renderer_pixels: usize,

    /// Color for Solid mode (hex or name). Default: black.
    #[serde(default = "default_solid_color")]
    pub solid_color: String,

    /// Time between rainbow frames.
    #[serde(default = "default_rainbow_speed_ms")]
    pub rainbow_speed_ms: u64,

    /// Time for one full trip around the color wheel.
    #[serde(default = "default_rainbow_period_ms")]
    pub rainbow_period_ms: u64,

    /// Pause between entrance sweep steps.
    #[serde(default = "default_sweep_step_ms")]
    pub sweep_step_ms: u64,

    /// Block count for the Renderer's entrance sweep.
    #[serde(default = "default_sweep_blocks")]
    pub sweep_blocks: usize,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Full-scale reading of the song selector.
    #[serde(default = "default_sensor_max")]
    pub sensor_max: u32,

    /// Wait before restarting after a storage fault.
    #[serde(default = "default_restart_cooldown_secs")]
    pub restart_cooldown_secs: u64,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Consecutive hard link faults before the node restarts.
    #[serde(default = "default_max_hard_faults")]
    pub max_hard_faults: u32,

    /// Longest a single broker poll may block.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_broker_host() -> String {
    "io.adafruit.com".into()
}
fn default_broker_port() -> u16 {
    8883
}
fn default_true() -> bool {
    true
}
fn default_self_test_file() -> String {
    SELF_TEST_FILE.into()
}
fn default_controller_pixels() -> usize {
    54
}
fn default_renderer_pixels() -> usize {
    350
}
fn default_solid_color() -> String {
    "#000000".into()
}
fn default_rainbow_speed_ms() -> u64 {
    50
}
fn default_rainbow_period_ms() -> u64 {
    2000
}
fn default_sweep_step_ms() -> u64 {
    10
}
fn default_sweep_blocks() -> usize {
    14
}
fn default_debounce_ms() -> u64 {
    10
}
fn default_sensor_max() -> u32 {
    65_536
}
fn default_restart_cooldown_secs() -> u64 {
    10
}
fn default_reconnect_initial_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_max_hard_faults() -> u32 {
    3
}
fn default_poll_timeout_ms() -> u64 {
    10
}
fn default_keep_alive_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Config {
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            broker_tls: true,
            username: String::new(),
            key: String::new(),
            client_id: String::new(),
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            songs_dir: String::new(),
            self_test_file: default_self_test_file(),
            controller_pixels: default_controller_pixels(),
            renderer_pixels: default_renderer_pixels(),
            solid_color: default_solid_color(),
            rainbow_speed_ms: default_rainbow_speed_ms(),
            rainbow_period_ms: default_rainbow_period_ms(),
            sweep_step_ms: default_sweep_step_ms(),
            sweep_blocks: default_sweep_blocks(),
            debounce_ms: default_debounce_ms(),
            sensor_max: default_sensor_max(),
            restart_cooldown_secs: default_restart_cooldown_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_hard_faults: default_max_hard_faults(),
            poll_timeout_ms: default_poll_timeout_ms(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required text field is empty.
    Missing(&'static str),
    /// `solid_color` could not be parsed.
    InvalidColor(String),
    /// A numeric field is out of range.
    OutOfRange { field: &'static str, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Missing(field) => write!(f, "{field} must be set"),
            ValidationError::InvalidColor(e) => write!(f, "Invalid solid color: {e}"),
            ValidationError::OutOfRange { field, reason } => write!(f, "Invalid {field}: {reason}"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("discolink"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Save config to an arbitrary path atomically (write to temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write + cleanup
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Unset or empty variables leave the
    /// field alone; an unparsable `PORT` is reported as a warning.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_USERNAME) {
            self.username = v;
        }
        if let Some(v) = get(ENV_KEY) {
            self.key = v;
        }
        if let Some(v) = get(ENV_BROKER) {
            self.broker_host = v;
        }
        if let Some(v) = get(ENV_PORT) {
            match v.trim().parse::<u16>() {
                Ok(port) => self.broker_port = port,
                Err(_) => warnings.push(format!("{ENV_PORT}={v:?} is not a valid port, keeping {}", self.broker_port)),
            }
        }
        if let Some(v) = get(ENV_WIFI_SSID) {
            self.wifi_ssid = v;
        }
        if let Some(v) = get(ENV_WIFI_PASSWORD) {
            self.wifi_password = v;
        }
        warnings
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.username.trim().is_empty() {
            errors.push(ValidationError::Missing("username"));
        }
        if self.broker_host.trim().is_empty() {
            errors.push(ValidationError::Missing("broker_host"));
        }
        if self.broker_port == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "broker_port",
                reason: "must be 1-65535".into(),
            });
        }
        if let Err(e) = parse_color(&self.solid_color) {
            errors.push(ValidationError::InvalidColor(e.to_string()));
        }
        for (field, value) in [
            ("controller_pixels", self.controller_pixels),
            ("renderer_pixels", self.renderer_pixels),
            ("sweep_blocks", self.sweep_blocks),
        ] {
            if value == 0 {
                errors.push(ValidationError::OutOfRange {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        if self.sensor_max == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "sensor_max",
                reason: "must be at least 1".into(),
            });
        }
        if self.rainbow_period_ms == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "rainbow_period_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.reconnect_max_ms < self.reconnect_initial_ms {
            errors.push(ValidationError::OutOfRange {
                field: "reconnect_max_ms",
                reason: format!(
                    "{} is below reconnect_initial_ms ({})",
                    self.reconnect_max_ms, self.reconnect_initial_ms
                ),
            });
        }
        if self.max_hard_faults == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "max_hard_faults",
                reason: "must be at least 1".into(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    // ── Derived settings ──

    pub fn topics(&self) -> Topics {
        Topics::new(self.username.trim())
    }

    pub fn client_id(&self, role: Role) -> String {
        if self.client_id.trim().is_empty() {
            format!("discolink-{role}")
        } else {
            self.client_id.trim().to_string()
        }
    }

    /// Resolved songs directory.
    pub fn songs_path(&self) -> PathBuf {
        if self.songs_dir.trim().is_empty() {
            Self::dir()
                .map(|d| d.join("songs"))
                .unwrap_or_else(|| PathBuf::from("songs"))
        } else {
            PathBuf::from(self.songs_dir.trim())
        }
    }

    pub fn strip_len(&self, role: Role) -> usize {
        match role {
            Role::Controller => self.controller_pixels,
            Role::Renderer => self.renderer_pixels,
        }
    }

    /// Strip animation parameters for `role`. Fails only on a bad color.
    pub fn animation_settings(&self, role: Role) -> crate::error::Result<AnimationSettings> {
        Ok(AnimationSettings {
            solid: parse_color(&self.solid_color)?,
            rainbow: RainbowCycle {
                frame_interval: Duration::from_millis(self.rainbow_speed_ms),
                period: Duration::from_millis(self.rainbow_period_ms),
            },
            sweep: match role {
                Role::Controller => SweepStyle::PerPixel,
                Role::Renderer => SweepStyle::Blocks(self.sweep_blocks),
            },
            sweep_step: Duration::from_millis(self.sweep_step_ms),
        })
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect_initial_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            multiplier: 2.0,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}
