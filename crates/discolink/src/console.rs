//! Terminal stand-ins for the node peripherals.
//!
//! The strip is drawn as one row of true-color cells, the display and the
//! button LED go to the log, and the Controller's knob and button are driven
//! by lines typed on stdin:
//!
//! - empty line or `b`: press the button
//! - `0`..`100`: turn the knob to that percentage

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use smart_leds::RGB8;

use discolink_lib::animation::{BLACK, PixelStrip, StripError};
use discolink_lib::hal::{IndicatorLed, TextDisplay};
use discolink_lib::input::{AnalogSensor, DigitalInput};

/// Widest row drawn; longer strips are sampled down to this many cells.
const MAX_COLUMNS: usize = 70;

// ── Strip ──

pub(crate) struct TerminalStrip<W: Write> {
    pixels: Vec<RGB8>,
    out: W,
}

impl TerminalStrip<io::Stdout> {
    pub(crate) fn stdout(len: usize) -> Self {
        TerminalStrip::new(len, io::stdout())
    }
}

impl<W: Write> TerminalStrip<W> {
    pub(crate) fn new(len: usize, out: W) -> Self {
        TerminalStrip {
            pixels: vec![BLACK; len],
            out,
        }
    }

    fn row(&self) -> String {
        let len = self.pixels.len();
        let columns = len.min(MAX_COLUMNS);
        let mut row = String::from("\r");
        for col in 0..columns {
            let p = self.pixels[col * len / columns];
            row.push_str(&format!("\x1b[48;2;{};{};{}m ", p.r, p.g, p.b));
        }
        row.push_str("\x1b[0m");
        row
    }
}

impl<W: Write> PixelStrip for TerminalStrip<W> {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn fill(&mut self, color: RGB8) {
        self.pixels.fill(color);
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) {
        if let Some(p) = self.pixels.get_mut(index) {
            *p = color;
        }
    }

    fn show(&mut self) -> Result<(), StripError> {
        let row = self.row();
        self.out.write_all(row.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

// ── Display and button LED ──

#[derive(Debug, Default)]
pub(crate) struct LogDisplay;

impl TextDisplay for LogDisplay {
    fn render_text(&mut self, text: &str) {
        log::info!("[display] {}", text.replace('\n', " | "));
    }
}

#[derive(Debug, Default)]
pub(crate) struct LogIndicator;

impl IndicatorLed for LogIndicator {
    fn set(&mut self, on: bool) {
        log::info!("[display] button light {}", if on { "on" } else { "off" });
    }
}

// ── Stdin input ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    Press,
    Knob(u32),
}

/// Parse one typed line. Knob percentages map onto `0..sensor_max`.
pub(crate) fn parse_command(line: &str, sensor_max: u32) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("b") {
        return Some(ConsoleCommand::Press);
    }
    let percent: u64 = line.parse().ok()?;
    if percent > 100 {
        return None;
    }
    let top = u64::from(sensor_max.saturating_sub(1));
    Some(ConsoleCommand::Knob((top * percent / 100) as u32))
}

pub(crate) struct ConsoleKnob {
    value: Arc<AtomicU32>,
}

impl AnalogSensor for ConsoleKnob {
    fn read(&mut self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Each typed press holds the button down for `hold`, long enough to clear
/// the debounce filter.
pub(crate) struct ConsoleButton {
    presses: Arc<AtomicU32>,
    seen: u32,
    held_since: Option<Instant>,
    hold: Duration,
}

impl DigitalInput for ConsoleButton {
    fn is_pressed(&mut self) -> bool {
        if let Some(since) = self.held_since {
            if since.elapsed() < self.hold {
                return true;
            }
            self.held_since = None;
            return false;
        }
        if self.presses.load(Ordering::Relaxed) != self.seen {
            self.seen = self.seen.wrapping_add(1);
            self.held_since = Some(Instant::now());
            return true;
        }
        false
    }
}

/// Stdin reader shared by every Controller built during the session.
pub(crate) struct ConsoleInput {
    value: Arc<AtomicU32>,
    presses: Arc<AtomicU32>,
}

impl ConsoleInput {
    /// Start the reader thread.
    pub(crate) fn spawn(sensor_max: u32) -> io::Result<Self> {
        let value = Arc::new(AtomicU32::new(0));
        let presses = Arc::new(AtomicU32::new(0));
        let (v, p) = (Arc::clone(&value), Arc::clone(&presses));
        std::thread::Builder::new()
            .name("console-input".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    match parse_command(&line, sensor_max) {
                        Some(ConsoleCommand::Press) => {
                            p.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(ConsoleCommand::Knob(raw)) => v.store(raw, Ordering::Relaxed),
                        None => log::warn!("[input] expected 'b' or 0-100, got {line:?}"),
                    }
                }
                log::debug!("[input] stdin closed");
            })?;
        log::info!("[input] press Enter to toggle, type 0-100 to turn the knob");
        Ok(ConsoleInput { value, presses })
    }

    pub(crate) fn knob(&self) -> ConsoleKnob {
        ConsoleKnob {
            value: Arc::clone(&self.value),
        }
    }

    /// A button that only reports presses typed after this call.
    pub(crate) fn button(&self, hold: Duration) -> ConsoleButton {
        ConsoleButton {
            presses: Arc::clone(&self.presses),
            seen: self.presses.load(Ordering::Relaxed),
            held_since: None,
            hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presses_and_knob_positions() {
        assert_eq!(parse_command("", 65536), Some(ConsoleCommand::Press));
        assert_eq!(parse_command(" B ", 65536), Some(ConsoleCommand::Press));
        assert_eq!(parse_command("0", 65536), Some(ConsoleCommand::Knob(0)));
        assert_eq!(parse_command("100", 65536), Some(ConsoleCommand::Knob(65535)));
        assert_eq!(parse_command("50", 101), Some(ConsoleCommand::Knob(50)));
        assert_eq!(parse_command("101", 65536), None);
        assert_eq!(parse_command("loud", 65536), None);
    }

    #[test]
    fn strip_draws_one_cell_per_pixel() {
        let mut strip = TerminalStrip::new(3, Vec::new());
        strip.set_pixel(1, RGB8 { r: 255, g: 0, b: 0 });
        strip.set_pixel(9, RGB8 { r: 1, g: 1, b: 1 });
        strip.show().unwrap();
        let out = String::from_utf8(strip.out.clone()).unwrap();
        assert_eq!(out.matches("\x1b[48;2;").count(), 3);
        assert!(out.contains("\x1b[48;2;255;0;0m"));
        assert!(out.ends_with("\x1b[0m"));
    }

    #[test]
    fn long_strip_is_sampled_down() {
        let mut strip = TerminalStrip::new(350, Vec::new());
        strip.fill(RGB8 { r: 0, g: 0, b: 255 });
        strip.show().unwrap();
        let out = String::from_utf8(strip.out.clone()).unwrap();
        assert_eq!(out.matches("\x1b[48;2;0;0;255m").count(), MAX_COLUMNS);
    }

    #[test]
    fn typed_press_holds_then_releases() {
        let input = ConsoleInput {
            value: Arc::new(AtomicU32::new(0)),
            presses: Arc::new(AtomicU32::new(0)),
        };
        let mut button = input.button(Duration::ZERO);
        assert!(!button.is_pressed());
        input.presses.fetch_add(1, Ordering::Relaxed);
        assert!(button.is_pressed());
        assert!(!button.is_pressed());
        assert!(!button.is_pressed());
    }

    #[test]
    fn rebuilt_button_ignores_earlier_presses() {
        let input = ConsoleInput {
            value: Arc::new(AtomicU32::new(0)),
            presses: Arc::new(AtomicU32::new(3)),
        };
        assert!(!input.button(Duration::ZERO).is_pressed());
        input.value.store(42, Ordering::Relaxed);
        assert_eq!(input.knob().read(), 42);
    }
}
