//! Renderer node: large strip, single audio voice, song storage.

use std::path::PathBuf;

use crate::animation::{AnimationRunner, PixelStrip, StripError};
use crate::catalog::{SongCatalog, encode_catalog};
use crate::clock::Clock;
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::hal::Storage;
use crate::link::BrokerLink;
use crate::playback::{AudioVoice, PlaybackEngine};
use crate::router::{Event, MessageRouter, Role};
use crate::state::{AnimationMode, DeviceStateMachine};

use super::{Node, attach_at_boot, maintain_link};

pub struct RendererParts<S, V, St> {
    pub strip: S,
    pub voice: V,
    pub storage: St,
}

pub struct Renderer<L, C, S, V, St>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    V: AudioVoice,
    St: Storage,
{
    router: MessageRouter<L, C>,
    clock: C,
    state: DeviceStateMachine,
    playback: PlaybackEngine<V, C>,
    animation: AnimationRunner<S, C>,
    storage: St,
    songs_dir: PathBuf,
    self_test_file: String,
    catalog: SongCatalog,
    catalog_published: bool,
}

impl<L, C, S, V, St> Renderer<L, C, S, V, St>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    V: AudioVoice,
    St: Storage,
{
    pub fn new(config: &Config, link: L, clock: C, parts: RendererParts<S, V, St>) -> Result<Self> {
        let conn = ConnectionManager::new(
            link,
            clock.clone(),
            config.reconnect_config(),
            config.max_hard_faults,
        );
        let songs_dir = config.songs_path();
        Ok(Renderer {
            router: MessageRouter::new(conn, config.topics(), Role::Renderer),
            playback: PlaybackEngine::new(
                parts.voice,
                clock.clone(),
                songs_dir.clone(),
                config.restart_cooldown(),
            ),
            animation: AnimationRunner::new(
                parts.strip,
                clock.clone(),
                config.animation_settings(Role::Renderer)?,
            ),
            clock,
            state: DeviceStateMachine::new(),
            storage: parts.storage,
            songs_dir,
            self_test_file: config.self_test_file.trim().to_string(),
            catalog: SongCatalog::default(),
            catalog_published: false,
        })
    }

    pub fn state(&self) -> &DeviceStateMachine {
        &self.state
    }

    pub fn router(&self) -> &MessageRouter<L, C> {
        &self.router
    }

    pub fn playback(&self) -> &PlaybackEngine<V, C> {
        &self.playback
    }

    pub fn animation(&self) -> &AnimationRunner<S, C> {
        &self.animation
    }

    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    fn publish_catalog(&mut self) -> Result<()> {
        let payload = encode_catalog(&self.catalog);
        let topic = self.router.topics().song_list.clone();
        match self.router.publish_batch(&[(topic.as_str(), payload.as_str())], true) {
            Ok(()) => {
                log::info!("[renderer] published catalog: {payload}");
                self.catalog_published = true;
                Ok(())
            }
            Err(e) if e.requires_restart() => Err(e),
            Err(e) => {
                log::warn!("[renderer] catalog not published yet: {e}");
                Ok(())
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::ModeReceived(mode) => {
                let change = self.state.on_remote_mode_received(mode);
                log::info!("[renderer] mode {} -> {}", change.previous, change.current);
                if change.entered_rainbow() {
                    self.render(|a| a.entrance_sweep());
                    self.render(|a| a.tick(AnimationMode::Rainbow).map(|_| ()));
                } else {
                    self.playback.stop();
                    self.render(|a| a.render_solid());
                }
            }
            Event::SongRequested(song) => {
                let song = self.state.on_remote_song_received(&song);
                self.playback.request_play(&song)?;
            }
            Event::CatalogReceived(_) => log::debug!("[renderer] ignoring catalog echo"),
        }
        Ok(())
    }

    fn render(&mut self, op: impl FnOnce(&mut AnimationRunner<S, C>) -> std::result::Result<(), StripError>) {
        if let Err(e) = op(&mut self.animation) {
            log::warn!("[animation] {e}");
        }
    }
}

impl<L, C, S, V, St> Node for Renderer<L, C, S, V, St>
where
    L: BrokerLink,
    C: Clock + Clone,
    S: PixelStrip,
    V: AudioVoice,
    St: Storage,
{
    fn role(&self) -> Role {
        Role::Renderer
    }

    fn boot(&mut self) -> Result<()> {
        attach_at_boot(&mut self.router)?;

        self.catalog = match SongCatalog::scan(&self.storage, &self.songs_dir) {
            Ok(catalog) => catalog,
            Err(e) => {
                let context = format!("scan {}: {e}", self.songs_dir.display());
                return Err(self.playback.storage_fault(&context));
            }
        };
        log::info!(
            "[renderer] {} song(s) in {}",
            self.catalog.len(),
            self.songs_dir.display()
        );
        self.publish_catalog()?;

        if self.self_test_file.is_empty() {
            log::info!("[renderer] self-test disabled");
        } else {
            let file = self.self_test_file.clone();
            self.playback.startup_self_test(&file)?;
        }

        self.render(|a| a.render_solid());
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        if self.router.is_attached() {
            match self.router.poll_events() {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event)?;
                    }
                }
                Err(e) => log::warn!("[renderer] {e}"),
            }
        }

        maintain_link(&mut self.router, &self.clock)?;
        if !self.catalog_published && self.router.is_attached() {
            self.publish_catalog()?;
        }

        if self.state.mode() == AnimationMode::Rainbow
            && let Err(e) = self.animation.tick(AnimationMode::Rainbow)
        {
            log::warn!("[animation] {e}");
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.playback.stop();
        self.render(|a| a.render_solid());
        self.router.disconnect();
    }
}
