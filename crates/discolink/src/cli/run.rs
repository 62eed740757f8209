//! `controller` / `renderer` subcommands: build a node on host backends and
//! keep it running.
//!
//! A `RestartRequired` error tears the node down; the supervisor pauses and
//! builds a fresh one from the same config, the way the boards reset.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use discolink_lib::clock::SystemClock;
use discolink_lib::hal::FsStorage;
use discolink_lib::node::{self, Controller, ControllerParts, Renderer, RendererParts};

use super::{Config, DiscoError, Result, Role};
use crate::RUNNING;
use crate::broker::MqttLink;
use crate::console::{ConsoleInput, LogDisplay, LogIndicator, TerminalStrip};
use crate::sound::RodioVoice;

/// Pause between a teardown and the next boot.
const RESTART_PAUSE: Duration = Duration::from_secs(1);

/// Extra hold on a typed button press beyond the debounce interval.
const PRESS_HOLD_MARGIN: Duration = Duration::from_millis(50);

fn checked_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = super::load_config(custom_path);
    if let Err(errors) = config.validate() {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DiscoError::Config(joined));
    }
    Ok(config)
}

pub(super) fn cmd_run(role: Role, custom_path: Option<&Path>) -> Result<()> {
    let config = checked_config(custom_path)?;
    let input = match role {
        Role::Controller => Some(ConsoleInput::spawn(config.sensor_max)?),
        Role::Renderer => None,
    };

    let mut boots = 0u32;
    while RUNNING.load(Ordering::SeqCst) {
        boots += 1;
        if boots > 1 {
            log::info!("[{role}] restart #{}", boots - 1);
        }
        let outcome = match &input {
            Some(input) => run_controller(&config, input),
            None => run_renderer(&config),
        };
        match outcome {
            Ok(()) => break,
            Err(e) if e.requires_restart() => {
                log::error!("[{role}] {e}");
                std::thread::sleep(RESTART_PAUSE);
            }
            Err(e) => return Err(e),
        }
    }
    println!();
    log::info!("[{role}] stopped");
    Ok(())
}

fn run_controller(config: &Config, input: &ConsoleInput) -> Result<()> {
    let parts = ControllerParts {
        strip: TerminalStrip::stdout(config.controller_pixels),
        display: LogDisplay,
        indicator: LogIndicator,
        knob: input.knob(),
        button: input.button(config.debounce() * 2 + PRESS_HOLD_MARGIN),
    };
    let link = MqttLink::new(config, Role::Controller);
    let mut controller = Controller::new(config, link, SystemClock, parts)?;
    node::run(&mut controller, &RUNNING)
}

fn run_renderer(config: &Config) -> Result<()> {
    let voice = match RodioVoice::open() {
        Ok(v) => v,
        Err(e) => {
            // No output device: retry after the pause.
            return Err(DiscoError::RestartRequired(e.to_string()));
        }
    };
    let parts = RendererParts {
        strip: TerminalStrip::stdout(config.renderer_pixels),
        voice,
        storage: FsStorage,
    };
    let link = MqttLink::new(config, Role::Renderer);
    let mut renderer = Renderer::new(config, link, SystemClock, parts)?;
    node::run(&mut renderer, &RUNNING)
}
