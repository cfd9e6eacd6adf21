//! Edge, hold and timing detectors. All of these keep state across frames.

use super::{ArgumentValidation, Function, duration_from_secs, frame_count, optional_arg, seconds_between};
use crate::expression::{Expression, bool_state};
use crate::runtime::InputRuntime;
use crate::{ControlState, is_pressed};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Press,
    Release,
    Change,
}

/// `onPress`, `onRelease`, `onChange`: 1 for `frames` frames (default 1) after
/// the edge, 0 otherwise.
#[derive(Debug)]
pub(crate) struct EdgeLatch {
    edge: Edge,
    previous: Option<ControlState>,
    remaining: usize,
}

impl EdgeLatch {
    fn new(edge: Edge) -> Self {
        Self { edge, previous: None, remaining: 0 }
    }

    pub(crate) fn press() -> Self {
        Self::new(Edge::Press)
    }

    pub(crate) fn release() -> Self {
        Self::new(Edge::Release)
    }

    pub(crate) fn change() -> Self {
        Self::new(Edge::Change)
    }
}

impl Function for EdgeLatch {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=2, "input, [frames]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let frames = frame_count(optional_arg(args, 1, 1.0));
        let was_pressed = self.previous.is_some_and(is_pressed);

        let triggered = match self.edge {
            Edge::Press => is_pressed(value) && !was_pressed,
            Edge::Release => !is_pressed(value) && was_pressed,
            Edge::Change => self.previous.is_some_and(|previous| previous != value),
        };
        self.previous = Some(value);

        if triggered {
            self.remaining = frames;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            1.0
        } else {
            0.0
        }
    }
}

/// `toggle(input, [clear])`: flips on every press, never on release.
#[derive(Debug)]
pub(crate) struct Toggle {
    released: bool,
    state: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { released: true, state: false }
    }
}

impl Function for Toggle {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=2, "toggle_state_input, [clear_state_input]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let input = args[0].get_value();
        if !is_pressed(input) {
            self.released = true;
        } else if self.released {
            self.released = false;
            self.state = !self.state;
        }

        if args.len() == 2 && is_pressed(args[1].get_value()) {
            self.state = false;
        }
        bool_state(self.state)
    }
}

/// `onHold(input, seconds)`: latches 1 once the input has been held for
/// `seconds`, drops on release.
#[derive(Debug, Default)]
pub(crate) struct OnHold {
    start: Option<Duration>,
    state: bool,
}

impl Function for OnHold {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=2, "input, seconds")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let input = args[0].get_value();
        let seconds = args[1].get_value();

        if !is_pressed(input) {
            self.state = false;
            self.start = Some(now);
        } else if !self.state {
            let start = *self.start.get_or_insert(now);
            if seconds_between(start, now) >= seconds {
                self.state = true;
            }
        }
        bool_state(self.state)
    }
}

/// `onTap(input, seconds, [taps = 2])`: 1 while the input is held down on the
/// `taps`-th press within `seconds` of the first one.
#[derive(Debug)]
pub(crate) struct OnTap {
    start: Duration,
    taps: u32,
    released: bool,
}

impl Default for OnTap {
    fn default() -> Self {
        Self { start: Duration::ZERO, taps: 0, released: true }
    }
}

impl Function for OnTap {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, seconds, [taps]")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let input = args[0].get_value();
        let seconds = args[1].get_value();
        let desired_taps = (optional_arg(args, 2, 2.0) + 0.5).max(0.0) as u32;

        let is_time_up = seconds_between(self.start, now) > seconds;

        if !is_pressed(input) {
            self.released = true;
            if self.taps > 0 && is_time_up {
                self.taps = 0;
            }
            return 0.0;
        }

        if self.released {
            if self.taps == 0 {
                self.start = now;
            }
            self.taps += 1;
            self.released = false;
        }
        bool_state(self.taps == desired_taps)
    }
}

/// `cache(input, condition)`: passes reads and writes through while
/// `condition` is pressed and holds the last value otherwise.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    read: ControlState,
    written: ControlState,
}

impl Function for Cache {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=2, "input, condition")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        if is_pressed(args[1].get_value()) {
            self.read = value;
        }
        self.read
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        if is_pressed(args[1].get_value()) {
            self.written = value;
        }
        args[0].set_value(self.written);
    }
}

/// `pulse(input, seconds, [accumulate])`: a timed 1 started by each press.
///
/// A press during an active pulse restarts it, or extends it by `seconds` when
/// `accumulate` is pressed.
#[derive(Debug)]
pub(crate) struct Pulse {
    released: bool,
    state: bool,
    release_time: Duration,
}

impl Default for Pulse {
    fn default() -> Self {
        Self { released: true, state: false, release_time: Duration::ZERO }
    }
}

impl Function for Pulse {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, seconds, [accumulate]")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let input = args[0].get_value();
        let length = duration_from_secs(args[1].get_value());
        let accumulate = is_pressed(optional_arg(args, 2, 0.0));

        if !is_pressed(input) {
            self.released = true;
        } else if self.released {
            self.released = false;
            if self.state && accumulate {
                self.release_time += length;
            } else {
                self.state = true;
                self.release_time = now + length;
            }
        }

        if self.state && now >= self.release_time {
            self.state = false;
        }
        bool_state(self.state)
    }
}

/// Free-running period tracker shared by `timer` and `interval`.
#[derive(Debug, Default)]
struct Ramp {
    start: Option<Duration>,
}

impl Ramp {
    /// Progress through the current period in `[0, 1)` and whether at least one
    /// period completed since the previous call. A non-positive period resets.
    fn advance(&mut self, now: Duration, period: ControlState) -> (ControlState, bool) {
        let start = *self.start.get_or_insert(now);
        let progress = seconds_between(start, now) / period;

        if !progress.is_finite() || period <= 0.0 {
            self.start = Some(now);
            return (0.0, false);
        }
        if progress < 1.0 {
            return (progress, false);
        }

        let periods = progress.floor();
        self.start = Some(start + duration_from_secs(periods * period));
        (progress - periods, true)
    }
}

/// `timer(seconds)`: sawtooth from 0 to 1 every `seconds`.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    ramp: Ramp,
}

impl Function for Timer {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "seconds")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let period = args[0].get_value();
        self.ramp.advance(runtime.now(), period).0
    }
}

/// `interval(seconds)`: 1 on the frame each period completes, 0 otherwise.
#[derive(Debug, Default)]
pub(crate) struct Interval {
    ramp: Ramp,
}

impl Function for Interval {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "seconds")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let period = args[0].get_value();
        bool_state(self.ramp.advance(runtime.now(), period).1)
    }
}
