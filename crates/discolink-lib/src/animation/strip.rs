//! Addressable pixel strip interface and its test double.

use std::fmt;

use smart_leds::RGB8;

#[derive(Debug)]
pub enum StripError {
    /// The driver refused or failed to push a frame.
    Write(String),
    Io(std::io::Error),
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripError::Write(e) => write!(f, "Strip write failed: {e}"),
            StripError::Io(e) => write!(f, "Strip I/O error: {e}"),
        }
    }
}

impl std::error::Error for StripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StripError::Io(e) => Some(e),
            StripError::Write(_) => None,
        }
    }
}

impl From<std::io::Error> for StripError {
    fn from(e: std::io::Error) -> Self {
        StripError::Io(e)
    }
}

/// Buffered strip: `fill`/`set_pixel` stage pixels, `show` latches them.
pub trait PixelStrip {
    fn len(&self) -> usize;
    fn fill(&mut self, color: RGB8);
    /// Out-of-range indices are ignored.
    fn set_pixel(&mut self, index: usize, color: RGB8);
    fn show(&mut self) -> Result<(), StripError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub struct MockStripState {
        pub pixels: RefCell<Vec<RGB8>>,
        /// Every latched frame, oldest first.
        pub frames: RefCell<Vec<Vec<RGB8>>>,
        pub fail_shows: Cell<u32>,
    }

    impl MockStripState {
        pub fn frame_count(&self) -> usize {
            self.frames.borrow().len()
        }

        pub fn last_frame(&self) -> Option<Vec<RGB8>> {
            self.frames.borrow().last().cloned()
        }

        /// Make the next `n` calls to `show` fail.
        pub fn fail_next_shows(&self, n: u32) {
            self.fail_shows.set(n);
        }
    }

    #[derive(Debug)]
    pub struct MockStrip {
        pub state: Rc<MockStripState>,
    }

    impl MockStrip {
        pub fn new(len: usize) -> Self {
            let state = MockStripState {
                pixels: RefCell::new(vec![RGB8::default(); len]),
                ..MockStripState::default()
            };
            MockStrip {
                state: Rc::new(state),
            }
        }

        pub fn handle(&self) -> Rc<MockStripState> {
            Rc::clone(&self.state)
        }
    }

    impl PixelStrip for MockStrip {
        fn len(&self) -> usize {
            self.state.pixels.borrow().len()
        }

        fn fill(&mut self, color: RGB8) {
            self.state.pixels.borrow_mut().fill(color);
        }

        fn set_pixel(&mut self, index: usize, color: RGB8) {
            if let Some(p) = self.state.pixels.borrow_mut().get_mut(index) {
                *p = color;
            }
        }

        fn show(&mut self) -> Result<(), StripError> {
            let pending = self.state.fail_shows.get();
            if pending > 0 {
                self.state.fail_shows.set(pending - 1);
                return Err(StripError::Write("mock: data line stuck".into()));
            }
            let frame = self.state.pixels.borrow().clone();
            self.state.frames.borrow_mut().push(frame);
            Ok(())
        }
    }
}
