//! Small peripheral traits: text display, indicator LED, song storage.
//!
//! Strip, audio, and input traits live next to the components that own
//! them (`animation`, `playback`, `input`).

use std::io;
use std::path::Path;

/// Short status text output (the Controller's small OLED).
pub trait TextDisplay {
    fn render_text(&mut self, text: &str);
}

/// Single on/off LED (the light inside the Controller's button).
pub trait IndicatorLed {
    fn set(&mut self, on: bool);
}

/// Song file enumeration.
pub trait Storage {
    /// Entry names in `dir`, in the order the filesystem yields them.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// [`Storage`] over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

/// Recording doubles for the traits above.
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default, Clone)]
    pub struct MockDisplay {
        /// Every text rendered, oldest first.
        pub history: Rc<RefCell<Vec<String>>>,
    }

    impl MockDisplay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn last(&self) -> Option<String> {
            self.history.borrow().last().cloned()
        }
    }

    impl TextDisplay for MockDisplay {
        fn render_text(&mut self, text: &str) {
            self.history.borrow_mut().push(text.to_string());
        }
    }

    #[derive(Debug, Default, Clone)]
    pub struct MockIndicator {
        pub states: Rc<RefCell<Vec<bool>>>,
    }

    impl MockIndicator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_on(&self) -> bool {
            self.states.borrow().last().copied().unwrap_or(false)
        }
    }

    impl IndicatorLed for MockIndicator {
        fn set(&mut self, on: bool) {
            self.states.borrow_mut().push(on);
        }
    }

    #[derive(Debug, Default)]
    pub struct MockStorage {
        files: Vec<String>,
        fail: bool,
    }

    impl MockStorage {
        pub fn with_files<I, S>(files: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            MockStorage {
                files: files.into_iter().map(Into::into).collect(),
                fail: false,
            }
        }

        /// Storage whose every listing fails, like an unmounted card.
        pub fn failing() -> Self {
            MockStorage {
                files: Vec::new(),
                fail: true,
            }
        }
    }

    impl Storage for MockStorage {
        fn list_files(&self, _dir: &Path) -> io::Result<Vec<String>> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "mock: no medium"));
            }
            Ok(self.files.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_storage_lists_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("b.wav"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut names = FsStorage.list_files(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, ["a.wav", "b.wav"]);
    }

    #[test]
    fn fs_storage_missing_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsStorage.list_files(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn mock_display_records_history() {
        let mut d = mock::MockDisplay::new();
        d.render_text("one");
        d.render_text("two");
        assert_eq!(d.last().as_deref(), Some("two"));
        assert_eq!(d.history.borrow().len(), 2);
    }
}
