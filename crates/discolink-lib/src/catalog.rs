//! Song catalog: the ordered list of playable files and its wire format.
//!
//! The Renderer publishes its catalog as a list literal, e.g.
//! `['a.wav', 'b.wav', 'disco_stu.wav']`. The Controller decodes it by
//! dropping the outer brackets, removing every quote character, and
//! splitting on `", "`. The self-test sound never reaches the user-facing
//! catalog.

use std::io;
use std::path::Path;

use crate::hal::Storage;

/// Reserved file played once at Renderer boot as a sanity check.
pub const SELF_TEST_FILE: &str = "disco_stu.wav";

/// Shown on the Controller until a catalog has been received.
pub const NOT_LOADED_MESSAGE: &str = "Songs Not Loaded\nTurn Speaker-computer off/on";

/// Ordered, duplicate-free song identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongCatalog {
    songs: Vec<String>,
}

impl SongCatalog {
    /// Build a catalog, keeping first occurrences and dropping empty names.
    pub fn new<I, S>(songs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for song in songs {
            let song = song.into();
            if !song.is_empty() && !unique.contains(&song) {
                unique.push(song);
            }
        }
        SongCatalog { songs: unique }
    }

    /// Enumerate `dir`, skipping hidden entries, in storage order.
    ///
    /// Names holding both quote styles cannot be written as a list entry
    /// and are left out.
    pub fn scan(storage: &impl Storage, dir: &Path) -> io::Result<Self> {
        let names = storage.list_files(dir)?;
        Ok(Self::new(names.into_iter().filter(|n| {
            if n.starts_with('.') {
                return false;
            }
            if n.contains('\'') && n.contains('"') {
                log::warn!("[catalog] skipping {n:?}: mixed quotes");
                return false;
            }
            true
        })))
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.songs.get(index).map(String::as_str)
    }

    pub fn contains(&self, song: &str) -> bool {
        self.songs.iter().any(|s| s == song)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.songs.iter().map(String::as_str)
    }

    /// Copy without the reserved self-test file.
    pub fn without_self_test(&self) -> Self {
        SongCatalog {
            songs: self
                .songs
                .iter()
                .filter(|s| *s != SELF_TEST_FILE)
                .cloned()
                .collect(),
        }
    }
}

/// Encode a catalog as a list literal.
///
/// Entries are single-quoted; an entry containing an apostrophe is
/// double-quoted instead. An entry with both quote styles gets `\'`, which
/// the decoder does not undo; [`SongCatalog::scan`] never produces one.
pub fn encode_catalog(catalog: &SongCatalog) -> String {
    let entries: Vec<String> = catalog
        .iter()
        .map(|s| {
            if s.contains('\'') && !s.contains('"') {
                format!("\"{s}\"")
            } else {
                format!("'{}'", s.replace('\'', "\\'"))
            }
        })
        .collect();
    format!("[{}]", entries.join(", "))
}

/// Decode a list-literal payload into the user-facing catalog.
///
/// Grammar: `<open> entries <close>`, where the first and last characters
/// are dropped unconditionally, every `'` and `"` is removed, and entries
/// are separated by `", "`. Apostrophes inside names are lost, as they
/// are on the wire today. `"[]"` decodes to an empty catalog.
pub fn decode_catalog(payload: &str) -> SongCatalog {
    let mut chars = payload.chars();
    chars.next();
    chars.next_back();
    let inner: String = chars.filter(|c| *c != '"' && *c != '\'').collect();
    if inner.is_empty() {
        return SongCatalog::default();
    }
    SongCatalog::new(inner.split(", ")).without_self_test()
}

/// Human-friendly label for the Controller display.
pub fn display_name(song: &str) -> String {
    song.replace('_', " ").replace('\'', "").replace(".wav", "")
}
