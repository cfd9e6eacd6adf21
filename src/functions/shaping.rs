//! Analog shaping: deadzones, response curves, slew limiting and relative axes.

use super::{ArgumentValidation, Function, optional_arg, seconds_between};
use crate::ControlState;
use crate::expression::Expression;
use crate::runtime::InputRuntime;
use std::time::Duration;

/// Deadzone amount for the side of zero `value` is on.
fn sided_amount(args: &mut [Expression], value: ControlState) -> ControlState {
    let positive = args[1].get_value();
    let negative = optional_arg(args, 2, positive);
    let amount = if value < 0.0 { negative } else { positive };
    if amount.is_finite() { amount.max(0.0) } else { 0.0 }
}

/// `deadzone(x, amount, [negative_amount])`: magnitudes up to `amount` read 0
/// and the rest is rescaled back to `[0, 1]`. Sign is kept.
#[derive(Debug)]
pub(crate) struct Deadzone;

impl Function for Deadzone {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, amount, [negative_amount]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let amount = sided_amount(args, value);
        if amount >= 1.0 {
            return 0.0;
        }
        ((value.abs() - amount).max(0.0) / (1.0 - amount)).copysign(value)
    }
}

/// `antiDeadzone(x, amount, [negative_amount])`: the inverse of `deadzone`,
/// any non-zero magnitude starts at `amount`.
#[derive(Debug)]
pub(crate) struct AntiDeadzone;

impl Function for AntiDeadzone {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, amount, [negative_amount]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let amount = sided_amount(args, value).min(1.0);
        if value == 0.0 {
            return 0.0;
        }
        (amount + value.abs() * (1.0 - amount)).copysign(value)
    }
}

/// `bezierCurve(x, c1, c2)`: cubic Bezier remap of the magnitude with end
/// points fixed at 0 and 1.
#[derive(Debug)]
pub(crate) struct BezierCurve;

impl Function for BezierCurve {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 3..=3, "input, x1, x2")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let c1 = args[1].get_value();
        let c2 = args[2].get_value();

        let t = value.abs().min(1.0);
        let u = 1.0 - t;
        let curve = 3.0 * u * u * t * c1 + 3.0 * u * t * t * c2 + t * t * t;
        curve.copysign(value)
    }
}

/// `antiAcceleration(x, acceleration, [max_seconds = 1])`.
///
/// Divides the input by the acceleration a host would have applied after the
/// input has been non-zero for that long, capped at `max_seconds`.
#[derive(Debug, Default)]
pub(crate) struct AntiAcceleration {
    held_since: Option<Duration>,
}

impl Function for AntiAcceleration {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, acceleration, [max_seconds]")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let value = args[0].get_value();
        let acceleration = args[1].get_value();
        let max_seconds = optional_arg(args, 2, 1.0).max(0.0);

        if value == 0.0 {
            self.held_since = None;
            return 0.0;
        }
        let held = seconds_between(*self.held_since.get_or_insert(now), now).min(max_seconds);
        let result = value / (1.0 + acceleration * held);
        if result.is_finite() { result } else { 0.0 }
    }
}

/// `smooth(x, seconds_up, [seconds_down])`: moves toward the input at most one
/// full unit per `seconds_up` (rising) or `seconds_down` (falling).
#[derive(Debug, Default)]
pub(crate) struct Smooth {
    value: ControlState,
    last_update: Option<Duration>,
}

impl Function for Smooth {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "input, seconds_up, [seconds_down]")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let elapsed = seconds_between(self.last_update.unwrap_or(now), now);
        self.last_update = Some(now);

        let desired = args[0].get_value();
        let up = args[1].get_value();
        let down = optional_arg(args, 2, up);
        let seconds = if desired < self.value { down } else { up };

        let max_move = elapsed / seconds;
        if !max_move.is_finite() || max_move < 0.0 {
            self.value = desired;
        } else {
            let diff = desired - self.value;
            self.value += max_move.min(diff.abs()).copysign(diff);
        }
        self.value
    }
}

/// `relativeToSpeed(delta, max_speed)`: converts a per-frame delta (mouse
/// motion, say) into a speed where `max_speed` units per second reads 1.
#[derive(Debug, Default)]
pub(crate) struct RelativeToSpeed {
    last_update: Option<Duration>,
}

impl Function for RelativeToSpeed {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=2, "delta, max_speed")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let now = runtime.now();
        let elapsed = seconds_between(self.last_update.unwrap_or(now), now);
        self.last_update = Some(now);

        let delta = args[0].get_value();
        let max_speed = args[1].get_value();
        let speed = delta / (elapsed * max_speed);
        if speed.is_finite() { speed } else { 0.0 }
    }
}

/// `sharedRelative(delta, max_abs, [cell])`: accumulates `delta` into a value
/// bounded to `[-max_abs, max_abs]`.
///
/// With a third argument (usually `$name`) the accumulator lives there, so
/// two mappings for opposite directions of one axis can drive the same value.
#[derive(Debug, Default)]
pub(crate) struct SharedRelative {
    value: ControlState,
}

impl Function for SharedRelative {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=3, "delta, max_abs_value, [shared_state]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let delta = args[0].get_value();
        let bound = args[1].get_value().abs();
        let current = if args.len() == 3 { args[2].get_value() } else { self.value };

        let mut next = (current + delta).max(-bound).min(bound);
        if !next.is_finite() {
            next = 0.0;
        }

        if args.len() == 3 {
            args[2].set_value(next);
        } else {
            self.value = next;
        }
        next
    }
}
