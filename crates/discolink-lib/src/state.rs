//! Device state machine: animation mode and song selection.
//!
//! Both nodes hold one [`DeviceStateMachine`]. The Controller drives it from
//! local input; the Renderer from broker events. Transitions return what the
//! caller has to do next (announce, play, sweep) instead of doing I/O here.

use std::fmt;

use crate::catalog::SongCatalog;

/// Lighting mode shared between the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationMode {
    #[default]
    Solid,
    Rainbow,
}

impl AnimationMode {
    /// Wire token for the animation feed.
    pub fn as_str(self) -> &'static str {
        match self {
            AnimationMode::Solid => "Solid",
            AnimationMode::Rainbow => "Rainbow",
        }
    }

    /// Parse a wire token. Matching is exact; anything else is unrecognized.
    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "Solid" => Some(AnimationMode::Solid),
            "Rainbow" => Some(AnimationMode::Rainbow),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AnimationMode::Solid => AnimationMode::Rainbow,
            AnimationMode::Rainbow => AnimationMode::Solid,
        }
    }
}

impl fmt::Display for AnimationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw sensor reading onto a catalog index.
///
/// `floor(value * len / sensor_max)`, clamped so the result is always a
/// valid index. Returns `None` for an empty catalog.
pub fn selection_index(value: u32, len: usize, sensor_max: u32) -> Option<usize> {
    if len == 0 || sensor_max == 0 {
        return None;
    }
    let scaled = u64::from(value) * len as u64 / u64::from(sensor_max);
    Some((scaled as usize).min(len - 1))
}

/// Result of a local button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub mode: AnimationMode,
    /// Song to announce alongside the mode. Only set when entering Rainbow
    /// with a loaded catalog.
    pub announce_song: Option<String>,
}

/// Result of a remote mode message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub previous: AnimationMode,
    pub current: AnimationMode,
}

impl ModeChange {
    /// Rainbow was (re)entered. Repeated Rainbow messages count too, so
    /// every Rainbow announcement replays the entrance sweep.
    pub fn entered_rainbow(&self) -> bool {
        self.current == AnimationMode::Rainbow
    }
}

#[derive(Debug, Default)]
pub struct DeviceStateMachine {
    mode: AnimationMode,
    catalog: SongCatalog,
    selection: Option<usize>,
    last_requested: Option<String>,
}

impl DeviceStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    /// Current index into the catalog, `None` while the catalog is empty.
    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn selected_song(&self) -> Option<&str> {
        self.selection.and_then(|i| self.catalog.get(i))
    }

    /// Last song the Renderer was asked to play.
    pub fn last_requested(&self) -> Option<&str> {
        self.last_requested.as_deref()
    }

    /// Install a freshly received catalog, clamping the selection into it.
    pub fn replace_catalog(&mut self, catalog: SongCatalog) {
        self.selection = match (self.selection, catalog.len()) {
            (_, 0) => None,
            (Some(i), n) => Some(i.min(n - 1)),
            (None, _) => Some(0),
        };
        self.catalog = catalog;
    }

    /// Toggle the mode. Entering Rainbow captures the selected song.
    pub fn on_local_button_press(&mut self) -> Toggle {
        self.mode = self.mode.toggled();
        let announce_song = match self.mode {
            AnimationMode::Rainbow => self.selected_song().map(str::to_string),
            AnimationMode::Solid => None,
        };
        Toggle {
            mode: self.mode,
            announce_song,
        }
    }

    /// Update the selection if `index` differs. Returns `true` on change.
    ///
    /// Out-of-range indices are ignored so the selection always stays valid.
    pub fn on_sensor_changed(&mut self, index: usize) -> bool {
        if index >= self.catalog.len() || self.selection == Some(index) {
            return false;
        }
        self.selection = Some(index);
        true
    }

    pub fn on_remote_mode_received(&mut self, mode: AnimationMode) -> ModeChange {
        let previous = self.mode;
        self.mode = mode;
        ModeChange {
            previous,
            current: mode,
        }
    }

    /// Record the request and hand back the id to play.
    pub fn on_remote_song_received(&mut self, song_id: &str) -> String {
        self.last_requested = Some(song_id.to_string());
        song_id.to_string()
    }
}
