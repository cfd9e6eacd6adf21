//! Live, process-facing state that stateful functions sample while evaluating.
//!
//! Expression trees never block and never read hidden globals: everything a
//! time- or focus-aware function needs is reached through an [`InputRuntime`]
//! handed to it when the tree is bound to a [`ControlEnvironment`].
//!
//! [`ControlEnvironment`]: crate::ControlEnvironment

use crate::ControlState;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Runtime used by trees that were never bound to an environment.
pub(crate) static DETACHED_RUNTIME: Lazy<Arc<InputRuntime>> =
    Lazy::new(|| Arc::new(InputRuntime::new(Arc::new(SystemClock::new()), RuntimeOptions::default())));

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;
}

/// Wall-clock time based on [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and by the CLI frame loop so that an identical sequence of
/// elapsed times always produces identical outputs.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saturates at the largest representable time instead of wrapping.
    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self.nanos.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |now| Some(now.saturating_add(by)));
    }

    /// Negative and NaN steps are ignored; steps too large for a [`Duration`]
    /// saturate.
    pub fn advance_secs(&self, seconds: f64) {
        let step = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
        self.advance(step);
    }

    pub fn set(&self, now: Duration) {
        self.nanos.store(saturating_nanos(now), Ordering::Relaxed);
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// An `f64` that can be shared between threads without a lock.
#[derive(Debug, Default)]
pub(crate) struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self { bits: AtomicU64::new(value.to_bits()) }
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Startup configuration of an [`InputRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// How often the owner of the device loop polls input, in Hz.
    pub input_update_rate: f64,
    /// Emulated video refresh rate, in Hz.
    pub video_refresh_rate: f64,
    /// Emulation speed multiplier (1.0 = full speed).
    pub game_speed: f64,
    /// Accept input even when the render window is not focused.
    pub background_input: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { input_update_rate: 200.0, video_refresh_rate: 60.0, game_speed: 1.0, background_input: false }
    }
}

/// Shared live state: clock, focus, speed and update rates.
///
/// All setters take `&self`; the emulator core and the UI update these fields
/// from their own threads while the polling thread reads them.
pub struct InputRuntime {
    clock: Arc<dyn Clock>,
    has_focus: AtomicBool,
    has_full_focus: AtomicBool,
    background_input: AtomicBool,
    game_speed: AtomicF64,
    input_update_rate: AtomicF64,
    video_refresh_rate: AtomicF64,
}

impl fmt::Debug for InputRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRuntime")
            .field("clock", &"<clock>")
            .field("has_focus", &self.has_focus())
            .field("has_full_focus", &self.has_full_focus())
            .field("background_input", &self.background_input())
            .field("game_speed", &self.game_speed())
            .field("input_update_rate", &self.input_update_rate())
            .field("video_refresh_rate", &self.video_refresh_rate())
            .finish()
    }
}

impl InputRuntime {
    pub fn new(clock: Arc<dyn Clock>, options: RuntimeOptions) -> Self {
        Self {
            clock,
            has_focus: AtomicBool::new(true),
            has_full_focus: AtomicBool::new(true),
            background_input: AtomicBool::new(options.background_input),
            game_speed: AtomicF64::new(options.game_speed),
            input_update_rate: AtomicF64::new(options.input_update_rate),
            video_refresh_rate: AtomicF64::new(options.video_refresh_rate),
        }
    }

    /// A runtime driven by a [`ManualClock`], returned alongside the clock.
    pub fn manual(options: RuntimeOptions) -> (Arc<Self>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Arc::new(Self::new(clock.clone(), options)), clock)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus.load(Ordering::Relaxed)
    }

    pub fn set_focus(&self, focused: bool) {
        self.has_focus.store(focused, Ordering::Relaxed);
    }

    pub fn has_full_focus(&self) -> bool {
        self.has_focus() && self.has_full_focus.load(Ordering::Relaxed)
    }

    pub fn set_full_focus(&self, focused: bool) {
        self.has_full_focus.store(focused, Ordering::Relaxed);
    }

    pub fn background_input(&self) -> bool {
        self.background_input.load(Ordering::Relaxed)
    }

    pub fn set_background_input(&self, enabled: bool) {
        self.background_input.store(enabled, Ordering::Relaxed);
    }

    pub fn game_speed(&self) -> ControlState {
        self.game_speed.load()
    }

    pub fn set_game_speed(&self, speed: ControlState) {
        self.game_speed.store(speed);
    }

    pub fn input_update_rate(&self) -> ControlState {
        self.input_update_rate.load()
    }

    pub fn set_input_update_rate(&self, hz: ControlState) {
        self.input_update_rate.store(hz);
    }

    pub fn video_refresh_rate(&self) -> ControlState {
        self.video_refresh_rate.load()
    }

    pub fn set_video_refresh_rate(&self, hz: ControlState) {
        self.video_refresh_rate.store(hz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance_secs(0.25);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(500));
        clock.set(Duration::from_secs(3));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn manual_clock_saturates_on_huge_steps() {
        let clock = ManualClock::new();
        clock.advance_secs(-1.0);
        clock.advance_secs(f64::NAN);
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance_secs(1e300);
        let saturated = clock.now();
        assert_eq!(saturated, Duration::from_nanos(u64::MAX));
        clock.advance_secs(1.0);
        assert_eq!(clock.now(), saturated);
    }

    #[test]
    fn full_focus_requires_focus() {
        let (runtime, _clock) = InputRuntime::manual(RuntimeOptions::default());
        assert!(runtime.has_full_focus());
        runtime.set_focus(false);
        assert!(!runtime.has_full_focus());
        runtime.set_focus(true);
        runtime.set_full_focus(false);
        assert!(runtime.has_focus());
        assert!(!runtime.has_full_focus());
    }

    #[test]
    fn options_seed_live_values() {
        let options = RuntimeOptions { game_speed: 0.5, input_update_rate: 120.0, ..RuntimeOptions::default() };
        let (runtime, _clock) = InputRuntime::manual(options);
        assert_eq!(runtime.game_speed(), 0.5);
        assert_eq!(runtime.input_update_rate(), 120.0);
        assert_eq!(runtime.video_refresh_rate(), 60.0);
        runtime.set_game_speed(2.0);
        assert_eq!(runtime.game_speed(), 2.0);
    }
}
