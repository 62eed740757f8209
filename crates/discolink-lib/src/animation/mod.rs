//! Strip animation: solid frames, the rainbow cycle, and the entrance sweep.
//!
//! [`AnimationRunner`] owns the strip. The main loop calls
//! [`tick`](AnimationRunner::tick) every iteration; Rainbow frames are paced
//! by the frame interval, Solid is latched once and then left alone.

pub mod color;
pub mod strip;

use std::time::{Duration, Instant};

use smart_leds::RGB8;

use crate::clock::Clock;
use crate::state::AnimationMode;

pub use color::{BLACK, colorwheel, format_color, parse_color};
pub use strip::{PixelStrip, StripError};

/// How the one-shot entrance sweep walks the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStyle {
    /// One pixel per step (short strips).
    PerPixel,
    /// The strip split into this many equal blocks, one block per step.
    Blocks(usize),
}

/// Timing for the steady-state rainbow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RainbowCycle {
    /// Minimum time between rendered frames.
    pub frame_interval: Duration,
    /// Time for the hue offset to travel once around the wheel.
    pub period: Duration,
}

impl RainbowCycle {
    /// Wheel position of pixel `index` of `len`, `elapsed` into the cycle.
    pub fn hue(&self, index: usize, len: usize, elapsed: Duration) -> u8 {
        let period_ms = self.period.as_millis().max(1);
        let phase = (elapsed.as_millis() % period_ms) * 256 / period_ms;
        let spread = (index as u128 * 256) / len.max(1) as u128;
        ((spread + phase) % 256) as u8
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnimationSettings {
    pub solid: RGB8,
    pub rainbow: RainbowCycle,
    pub sweep: SweepStyle,
    /// Pause after each sweep step.
    pub sweep_step: Duration,
}

pub struct AnimationRunner<S: PixelStrip, C: Clock> {
    strip: S,
    clock: C,
    settings: AnimationSettings,
    started: Instant,
    last_frame: Option<Instant>,
    solid_latched: bool,
}

impl<S: PixelStrip, C: Clock> AnimationRunner<S, C> {
    pub fn new(strip: S, clock: C, settings: AnimationSettings) -> Self {
        let started = clock.now();
        AnimationRunner {
            strip,
            clock,
            settings,
            started,
            last_frame: None,
            solid_latched: false,
        }
    }

    /// Render one frame for `mode` if one is due. Returns whether the strip
    /// was written.
    pub fn tick(&mut self, mode: AnimationMode) -> Result<bool, StripError> {
        match mode {
            AnimationMode::Solid if self.solid_latched => Ok(false),
            AnimationMode::Solid => self.render_solid().map(|()| true),
            AnimationMode::Rainbow => self.render_rainbow(),
        }
    }

    /// Fill the strip with the solid color and latch it.
    pub fn render_solid(&mut self) -> Result<(), StripError> {
        self.strip.fill(self.settings.solid);
        self.strip.show()?;
        self.solid_latched = true;
        self.last_frame = None;
        Ok(())
    }

    fn render_rainbow(&mut self) -> Result<bool, StripError> {
        let now = self.clock.now();
        if let Some(last) = self.last_frame
            && now.duration_since(last) < self.settings.rainbow.frame_interval
        {
            return Ok(false);
        }
        let elapsed = now.duration_since(self.started);
        let len = self.strip.len();
        for i in 0..len {
            let hue = self.settings.rainbow.hue(i, len, elapsed);
            self.strip.set_pixel(i, colorwheel(hue));
        }
        self.solid_latched = false;
        self.last_frame = Some(now);
        self.strip.show()?;
        Ok(true)
    }

    /// Blocking one-shot color sweep. Yields to the clock between steps and
    /// returns only once the whole strip has been painted.
    pub fn entrance_sweep(&mut self) -> Result<(), StripError> {
        let len = self.strip.len();
        self.solid_latched = false;
        self.last_frame = None;
        if len == 0 {
            return Ok(());
        }
        match self.settings.sweep {
            SweepStyle::PerPixel => {
                for i in 0..len {
                    self.strip.set_pixel(i, colorwheel((i * 255 / len) as u8));
                    self.strip.show()?;
                    self.clock.sleep(self.settings.sweep_step);
                }
            }
            SweepStyle::Blocks(count) => {
                let count = count.max(1);
                let block = ((len + count / 2) / count).max(1);
                let blocks = len / block;
                for b in 0..blocks {
                    let color = colorwheel((b * 256 / blocks) as u8);
                    for i in b * block..(b + 1) * block {
                        self.strip.set_pixel(i, color);
                    }
                    self.strip.show()?;
                    self.clock.sleep(self.settings.sweep_step);
                }
            }
        }
        Ok(())
    }

    pub fn strip(&self) -> &S {
        &self.strip
    }
}

#[cfg(test)]
mod tests {
    use super::strip::mock::MockStrip;
    use super::*;
    use crate::clock::mock::ManualClock;

    const STEP: Duration = Duration::from_millis(10);

    fn settings(sweep: SweepStyle) -> AnimationSettings {
        AnimationSettings {
            solid: BLACK,
            rainbow: RainbowCycle {
                frame_interval: Duration::from_millis(50),
                period: Duration::from_secs(2),
            },
            sweep,
            sweep_step: STEP,
        }
    }

    fn runner(len: usize, sweep: SweepStyle) -> (AnimationRunner<MockStrip, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (
            AnimationRunner::new(MockStrip::new(len), clock.clone(), settings(sweep)),
            clock,
        )
    }

    #[test]
    fn solid_is_latched_once() {
        let (mut r, _) = runner(8, SweepStyle::PerPixel);
        let h = r.strip().handle();
        assert!(r.tick(AnimationMode::Solid).unwrap());
        assert!(!r.tick(AnimationMode::Solid).unwrap());
        assert_eq!(h.frame_count(), 1);
        assert!(h.last_frame().unwrap().iter().all(|p| *p == BLACK));
    }

    #[test]
    fn rainbow_respects_frame_interval() {
        let (mut r, clock) = runner(8, SweepStyle::PerPixel);
        assert!(r.tick(AnimationMode::Rainbow).unwrap());
        assert!(!r.tick(AnimationMode::Rainbow).unwrap());
        clock.advance(Duration::from_millis(50));
        assert!(r.tick(AnimationMode::Rainbow).unwrap());
        assert_eq!(r.strip().handle().frame_count(), 2);
    }

    #[test]
    fn rainbow_moves_over_time() {
        let (mut r, clock) = runner(8, SweepStyle::PerPixel);
        let h = r.strip().handle();
        r.tick(AnimationMode::Rainbow).unwrap();
        let first = h.last_frame().unwrap();
        clock.advance(Duration::from_millis(500));
        r.tick(AnimationMode::Rainbow).unwrap();
        assert_ne!(h.last_frame().unwrap(), first);
    }

    #[test]
    fn solid_after_rainbow_renders_again() {
        let (mut r, _) = runner(4, SweepStyle::PerPixel);
        r.tick(AnimationMode::Solid).unwrap();
        r.tick(AnimationMode::Rainbow).unwrap();
        assert!(r.tick(AnimationMode::Solid).unwrap());
    }

    #[test]
    fn hue_wraps_over_period() {
        let cycle = settings(SweepStyle::PerPixel).rainbow;
        assert_eq!(cycle.hue(0, 10, Duration::ZERO), 0);
        assert_eq!(cycle.hue(0, 10, Duration::from_secs(1)), 128);
        assert_eq!(cycle.hue(0, 10, Duration::from_secs(2)), 0);
        assert_eq!(cycle.hue(5, 10, Duration::ZERO), 128);
    }

    #[test]
    fn per_pixel_sweep_shows_every_pixel() {
        let (mut r, clock) = runner(54, SweepStyle::PerPixel);
        r.entrance_sweep().unwrap();
        assert_eq!(r.strip().handle().frame_count(), 54);
        assert_eq!(clock.sleeps_of(STEP), 54);
    }

    #[test]
    fn block_sweep_uses_fourteen_blocks() {
        let (mut r, clock) = runner(350, SweepStyle::Blocks(14));
        r.entrance_sweep().unwrap();
        let h = r.strip().handle();
        assert_eq!(h.frame_count(), 14);
        assert_eq!(clock.sleeps_of(STEP), 14);
        let last = h.last_frame().unwrap();
        assert_eq!(last[0], colorwheel(0));
        assert_eq!(last[24], colorwheel(0));
        assert_eq!(last[25], colorwheel((256 / 14) as u8));
    }

    #[test]
    fn sweep_rerenders_rainbow_immediately_after() {
        let (mut r, _) = runner(10, SweepStyle::PerPixel);
        r.tick(AnimationMode::Rainbow).unwrap();
        r.entrance_sweep().unwrap();
        assert!(r.tick(AnimationMode::Rainbow).unwrap());
    }

    #[test]
    fn show_error_propagates() {
        let (mut r, _) = runner(4, SweepStyle::PerPixel);
        r.strip().handle().fail_next_shows(1);
        assert!(r.render_solid().is_err());
        assert!(r.render_solid().is_ok());
    }

    #[test]
    fn empty_strip_sweep_is_noop() {
        let (mut r, clock) = runner(0, SweepStyle::Blocks(14));
        r.entrance_sweep().unwrap();
        assert!(clock.sleeps.borrow().is_empty());
    }
}
