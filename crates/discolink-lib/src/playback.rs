//! Single-voice song playback for the Renderer.
//!
//! [`PlaybackEngine`] is the only owner of the [`AudioVoice`]. Every request
//! stops whatever is playing before starting the new file. Storage faults
//! are unrecoverable for the session: the engine waits out a cool-down and
//! then asks for a restart. Anything else is logged and dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{DiscoError, Result};

/// Volume used for every request.
pub const FULL_LEVEL: f32 = 1.0;

/// Poll interval while waiting on the startup self-test.
pub const SELF_TEST_POLL: Duration = Duration::from_millis(10);

// ── Error type ──

#[derive(Debug)]
pub enum AudioError {
    /// Opening or reading the file failed (unmounted or corrupt card).
    Storage(std::io::Error),
    /// The file was readable but not a playable stream.
    Decode(String),
    /// The output device rejected the stream.
    Output(String),
    /// The requested id does not name a file inside the songs directory.
    InvalidSong(String),
}

impl AudioError {
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AudioError::Storage(_))
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Storage(e) => write!(f, "Audio storage error: {e}"),
            AudioError::Decode(e) => write!(f, "Audio decode error: {e}"),
            AudioError::Output(e) => write!(f, "Audio output error: {e}"),
            AudioError::InvalidSong(e) => write!(f, "Invalid song id: {e}"),
        }
    }
}

impl std::error::Error for AudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AudioError {
    fn from(e: std::io::Error) -> Self {
        AudioError::Storage(e)
    }
}

// ── Trait ──

/// One mixer voice.
pub trait AudioVoice {
    /// Open `path` and start it at `level` (0.0–1.0). Must not block until
    /// the end of the stream.
    fn play(&mut self, path: &Path, level: f32) -> std::result::Result<(), AudioError>;
    fn stop(&mut self);
    fn is_playing(&self) -> bool;
}

/// Reject ids that could escape the songs directory.
pub fn validate_song_id(song_id: &str) -> std::result::Result<(), AudioError> {
    if song_id.is_empty() {
        return Err(AudioError::InvalidSong("empty".into()));
    }
    if song_id.contains('/') || song_id.contains('\\') || song_id.contains("..") {
        return Err(AudioError::InvalidSong(format!("{song_id}: path components not allowed")));
    }
    Ok(())
}

pub struct PlaybackEngine<V: AudioVoice, C: Clock> {
    voice: V,
    clock: C,
    songs_dir: PathBuf,
    cooldown: Duration,
}

impl<V: AudioVoice, C: Clock> PlaybackEngine<V, C> {
    pub fn new(voice: V, clock: C, songs_dir: impl Into<PathBuf>, cooldown: Duration) -> Self {
        PlaybackEngine {
            voice,
            clock,
            songs_dir: songs_dir.into(),
            cooldown,
        }
    }

    /// Stop the current voice and start `song_id`. Returns immediately.
    ///
    /// `Ok(true)` when playback started, `Ok(false)` when the request was
    /// abandoned. A storage fault sleeps the cool-down and returns
    /// [`DiscoError::RestartRequired`].
    pub fn request_play(&mut self, song_id: &str) -> Result<bool> {
        self.stop();
        if let Err(e) = validate_song_id(song_id) {
            log::warn!("[playback] ignoring request: {e}");
            return Ok(false);
        }
        let path = self.songs_dir.join(song_id);
        log::info!("[playback] playing {}", path.display());
        match self.voice.play(&path, FULL_LEVEL) {
            Ok(()) => Ok(true),
            Err(e) if e.is_storage_fault() => Err(self.storage_fault(&e.to_string())),
            Err(e) => {
                log::error!("[playback] abandoned {song_id}: {e}");
                Ok(false)
            }
        }
    }

    /// Stop the voice if it is playing.
    pub fn stop(&mut self) {
        if self.voice.is_playing() {
            log::info!("[playback] stopping voice");
            self.voice.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_playing()
    }

    /// Play `file` and block until it finishes. Boot-time sanity gate.
    pub fn startup_self_test(&mut self, file: &str) -> Result<()> {
        if !self.request_play(file)? {
            log::warn!("[playback] self-test sound did not start");
            return Ok(());
        }
        while self.voice.is_playing() {
            self.clock.sleep(SELF_TEST_POLL);
        }
        log::info!("[playback] self-test finished");
        Ok(())
    }

    /// Log a storage fault, wait out the cool-down, and produce the restart
    /// signal.
    pub fn storage_fault(&self, context: &str) -> DiscoError {
        log::error!(
            "[playback] storage fault: {context}; restarting in {}s",
            self.cooldown.as_secs()
        );
        self.clock.sleep(self.cooldown);
        DiscoError::RestartRequired(format!("storage fault: {context}"))
    }

    pub fn voice(&self) -> &V {
        &self.voice
    }
}

/// Recording [`AudioVoice`] for tests.
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum VoiceOp {
        Play { path: PathBuf, level: f32 },
        Stop,
    }

    #[derive(Debug, Default)]
    pub struct MockVoiceState {
        pub ops: RefCell<Vec<VoiceOp>>,
        pub playing: Cell<bool>,
        /// `is_playing` calls left before the current song ends by itself.
        /// `None` plays forever. Cleared when the song ends.
        pub remaining_polls: Cell<Option<u32>>,
        pub failures: RefCell<VecDeque<AudioError>>,
    }

    impl MockVoiceState {
        pub fn fail_next_play(&self, e: AudioError) {
            self.failures.borrow_mut().push_back(e);
        }

        /// The next song to play (or the current one) ends after this many
        /// `is_playing` polls.
        pub fn finish_after(&self, polls: u32) {
            self.remaining_polls.set(Some(polls));
        }

        pub fn plays(&self) -> Vec<PathBuf> {
            self.ops
                .borrow()
                .iter()
                .filter_map(|op| match op {
                    VoiceOp::Play { path, .. } => Some(path.clone()),
                    VoiceOp::Stop => None,
                })
                .collect()
        }

        pub fn stops(&self) -> usize {
            self.ops
                .borrow()
                .iter()
                .filter(|op| matches!(op, VoiceOp::Stop))
                .count()
        }
    }

    #[derive(Debug, Default)]
    pub struct MockVoice {
        pub state: Rc<MockVoiceState>,
        song_polls: Option<u32>,
    }

    impl MockVoice {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every song started on this voice ends after `polls` checks.
        pub fn with_song_length(polls: u32) -> Self {
            MockVoice {
                state: Rc::default(),
                song_polls: Some(polls),
            }
        }

        pub fn handle(&self) -> Rc<MockVoiceState> {
            Rc::clone(&self.state)
        }
    }

    impl AudioVoice for MockVoice {
        fn play(&mut self, path: &Path, level: f32) -> std::result::Result<(), AudioError> {
            if let Some(e) = self.state.failures.borrow_mut().pop_front() {
                return Err(e);
            }
            self.state.ops.borrow_mut().push(VoiceOp::Play {
                path: path.to_path_buf(),
                level,
            });
            self.state.playing.set(true);
            if self.song_polls.is_some() {
                self.state.remaining_polls.set(self.song_polls);
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.state.ops.borrow_mut().push(VoiceOp::Stop);
            self.state.playing.set(false);
        }

        fn is_playing(&self) -> bool {
            let s = &self.state;
            if let Some(n) = s.remaining_polls.get()
                && s.playing.get()
            {
                if n == 0 {
                    s.playing.set(false);
                    s.remaining_polls.set(None);
                } else {
                    s.remaining_polls.set(Some(n - 1));
                }
            }
            s.playing.get()
        }
    }
}
