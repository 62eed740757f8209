//! Controller node: knob, button, button LED, small strip, text display.

use crate::animation::{AnimationRunner, PixelStrip};
use crate::catalog::{NOT_LOADED_MESSAGE, display_name};
use crate::clock::Clock;
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::hal::{IndicatorLed, TextDisplay};
use crate::input::{AnalogSensor, DigitalInput, InputPipeline};
use crate::link::BrokerLink;
use crate::router::{Event, MessageRouter, Role};
use crate::state::{AnimationMode, DeviceStateMachine};

use super::{Node, attach_at_boot, maintain_link};

/// Peripherals the Controller drives.
pub struct ControllerParts<S, D, I, A, B> {
    pub strip: S,
    pub display: D,
    pub indicator: I,
    pub knob: A,
    pub button: B,
}

pub struct Controller<L, C, S, D, I, A, B>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    D: TextDisplay,
    I: IndicatorLed,
    A: AnalogSensor,
    B: DigitalInput,
{
    router: MessageRouter<L, C>,
    clock: C,
    state: DeviceStateMachine,
    input: InputPipeline<A, B>,
    animation: AnimationRunner<S, C>,
    display: D,
    indicator: I,
    indicator_on: bool,
    shown_text: Option<String>,
}

impl<L, C, S, D, I, A, B> Controller<L, C, S, D, I, A, B>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    D: TextDisplay,
    I: IndicatorLed,
    A: AnalogSensor,
    B: DigitalInput,
{
    pub fn new(config: &Config, link: L, clock: C, parts: ControllerParts<S, D, I, A, B>) -> Result<Self> {
        let conn = ConnectionManager::new(
            link,
            clock.clone(),
            config.reconnect_config(),
            config.max_hard_faults,
        );
        let router = MessageRouter::new(conn, config.topics(), Role::Controller);
        let animation = AnimationRunner::new(
            parts.strip,
            clock.clone(),
            config.animation_settings(Role::Controller)?,
        );
        Ok(Controller {
            router,
            clock,
            state: DeviceStateMachine::new(),
            input: InputPipeline::new(parts.knob, parts.button, config.debounce(), config.sensor_max),
            animation,
            display: parts.display,
            indicator: parts.indicator,
            indicator_on: false,
            shown_text: None,
        })
    }

    pub fn state(&self) -> &DeviceStateMachine {
        &self.state
    }

    pub fn router(&self) -> &MessageRouter<L, C> {
        &self.router
    }

    pub fn animation(&self) -> &AnimationRunner<S, C> {
        &self.animation
    }

    /// Redraw the display if the text it should show has changed.
    fn refresh_display(&mut self) {
        let text = match self.state.selected_song() {
            Some(song) => display_name(song),
            None => NOT_LOADED_MESSAGE.to_string(),
        };
        if self.shown_text.as_deref() != Some(text.as_str()) {
            log::debug!("[controller] display: {text:?}");
            self.display.render_text(&text);
            self.shown_text = Some(text);
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::CatalogReceived(catalog) => {
                log::info!("[controller] catalog received: {} song(s)", catalog.len());
                self.state.replace_catalog(catalog);
            }
            other => log::debug!("[controller] ignoring {other:?}"),
        }
    }

    fn on_button_pressed(&mut self) -> Result<()> {
        self.indicator_on = !self.indicator_on;
        self.indicator.set(self.indicator_on);

        let toggle = self.state.on_local_button_press();
        log::info!("[controller] button pressed, mode now {}", toggle.mode);
        if toggle.mode == AnimationMode::Solid {
            self.render(|a| a.render_solid());
        }

        let topics = self.router.topics().clone();
        let mut batch = vec![(topics.animation.as_str(), toggle.mode.as_str())];
        if let Some(song) = toggle.announce_song.as_deref() {
            batch.push((topics.song_name.as_str(), song));
        }
        match self.router.publish_batch(&batch, false) {
            Ok(()) => {
                if toggle.mode == AnimationMode::Rainbow {
                    self.render(|a| a.entrance_sweep());
                }
                Ok(())
            }
            Err(e) if e.requires_restart() => Err(e),
            Err(e) => {
                log::warn!("[controller] mode change not delivered: {e}");
                Ok(())
            }
        }
    }

    fn render(
        &mut self,
        op: impl FnOnce(&mut AnimationRunner<S, C>) -> std::result::Result<(), crate::animation::StripError>,
    ) {
        if let Err(e) = op(&mut self.animation) {
            log::warn!("[animation] {e}");
        }
    }
}

impl<L, C, S, D, I, A, B> Node for Controller<L, C, S, D, I, A, B>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    D: TextDisplay,
    I: IndicatorLed,
    A: AnalogSensor,
    B: DigitalInput,
{
    fn role(&self) -> Role {
        Role::Controller
    }

    fn boot(&mut self) -> Result<()> {
        attach_at_boot(&mut self.router)?;
        self.indicator.set(false);
        self.refresh_display();

        let request = self.router.topics().song_list_get.clone();
        match self.router.publish_batch(&[(request.as_str(), "")], false) {
            Ok(()) => log::info!("[controller] requested song list"),
            Err(e) if e.requires_restart() => return Err(e),
            Err(e) => log::warn!("[controller] song list request failed: {e}"),
        }

        self.render(|a| a.entrance_sweep());
        self.render(|a| a.render_solid());
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if self.router.is_attached() {
            match self.router.poll_events() {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event);
                    }
                }
                Err(e) => log::warn!("[controller] {e}"),
            }
        }

        maintain_link(&mut self.router, &self.clock)?;

        let sample = self.input.sample(self.clock.now(), self.state.catalog().len());
        if let Some(index) = sample.selection {
            self.state.on_sensor_changed(index);
        }
        self.refresh_display();
        if sample.pressed {
            self.on_button_pressed()?;
        }

        if self.state.mode() == AnimationMode::Rainbow
            && let Err(e) = self.animation.tick(AnimationMode::Rainbow)
        {
            log::warn!("[animation] {e}");
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.indicator.set(false);
        self.render(|a| a.render_solid());
        self.router.disconnect();
    }
}
