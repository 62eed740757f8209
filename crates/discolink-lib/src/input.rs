//! Controller input: song selector knob and mode button.
//!
//! [`InputPipeline`] samples both once per loop iteration: the knob is
//! quantized to a catalog index, the button is run through
//! [`DebouncedButton`] so bounce noise produces a single press.

use std::time::{Duration, Instant};

use crate::state::selection_index;

/// Continuous sensor (the song selector potentiometer).
pub trait AnalogSensor {
    /// Raw reading in `0..sensor_max`.
    fn read(&mut self) -> u32;
}

/// Digital input with polarity already resolved: `true` while held down.
pub trait DigitalInput {
    fn is_pressed(&mut self) -> bool;
}

// ── Debounce filter ──

/// Confirmed level change reported by [`DebouncedButton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

/// Time-based debounce filter for a mechanical button.
///
/// A new raw level must hold for `interval` before it is confirmed. Any
/// sample back at the confirmed level cancels the pending change, so a
/// burst of chatter inside the bounce window yields no edge at all and a
/// genuine press yields exactly one.
#[derive(Debug)]
pub struct DebouncedButton {
    interval: Duration,
    confirmed: bool,
    pending_since: Option<Instant>,
}

impl DebouncedButton {
    pub fn new(interval: Duration) -> Self {
        DebouncedButton {
            interval,
            confirmed: false,
            pending_since: None,
        }
    }

    /// Feed one raw sample. Returns the edge once a change is confirmed.
    pub fn update(&mut self, raw: bool, now: Instant) -> Option<ButtonEdge> {
        if raw == self.confirmed {
            self.pending_since = None;
            return None;
        }
        let since = *self.pending_since.get_or_insert(now);
        if now.duration_since(since) < self.interval {
            return None;
        }
        self.confirmed = raw;
        self.pending_since = None;
        Some(if raw {
            ButtonEdge::Pressed
        } else {
            ButtonEdge::Released
        })
    }

    pub fn is_pressed(&self) -> bool {
        self.confirmed
    }
}

// ── Pipeline ──

/// One loop iteration's worth of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    /// Knob position as a catalog index; `None` while the catalog is empty.
    pub selection: Option<usize>,
    /// A debounced released→pressed edge happened this iteration.
    pub pressed: bool,
}

pub struct InputPipeline<S: AnalogSensor, B: DigitalInput> {
    sensor: S,
    button: B,
    debouncer: DebouncedButton,
    sensor_max: u32,
}

impl<S: AnalogSensor, B: DigitalInput> InputPipeline<S, B> {
    pub fn new(sensor: S, button: B, debounce: Duration, sensor_max: u32) -> Self {
        InputPipeline {
            sensor,
            button,
            debouncer: DebouncedButton::new(debounce),
            sensor_max,
        }
    }

    pub fn sample(&mut self, now: Instant, catalog_len: usize) -> InputSample {
        let raw = self.sensor.read();
        let selection = selection_index(raw, catalog_len, self.sensor_max);
        let level = self.button.is_pressed();
        let pressed = matches!(self.debouncer.update(level, now), Some(ButtonEdge::Pressed));
        if pressed {
            log::debug!("[input] button pressed (knob raw {raw})");
        }
        InputSample { selection, pressed }
    }
}

/// Scripted sensors for tests. Clones share the same script.
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Pops one scripted value per read; repeats the last one when empty.
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedSensor {
        script: Rc<RefCell<VecDeque<u32>>>,
        last: Rc<RefCell<u32>>,
    }

    impl ScriptedSensor {
        pub fn new(initial: u32) -> Self {
            ScriptedSensor {
                script: Rc::default(),
                last: Rc::new(RefCell::new(initial)),
            }
        }

        pub fn push(&self, value: u32) {
            self.script.borrow_mut().push_back(value);
        }
    }

    impl AnalogSensor for ScriptedSensor {
        fn read(&mut self) -> u32 {
            if let Some(v) = self.script.borrow_mut().pop_front() {
                *self.last.borrow_mut() = v;
            }
            *self.last.borrow()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct ScriptedButton {
        script: Rc<RefCell<VecDeque<bool>>>,
        last: Rc<RefCell<bool>>,
    }

    impl ScriptedButton {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, level: bool) {
            self.script.borrow_mut().push_back(level);
        }

        /// Script a clean press: held for `samples` reads, then released.
        pub fn push_press(&self, samples: usize) {
            for _ in 0..samples {
                self.push(true);
            }
            self.push(false);
        }
    }

    impl DigitalInput for ScriptedButton {
        fn is_pressed(&mut self) -> bool {
            if let Some(v) = self.script.borrow_mut().pop_front() {
                *self.last.borrow_mut() = v;
            }
            *self.last.borrow()
        }
    }
}
