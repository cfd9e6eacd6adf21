//! The function library.
//!
//! Functions are looked up by name while parsing (`name(args)` or `name arg`).
//! An unknown name yields `None`, which the parser reinterprets as a control
//! reference, so the registry is probed before any naming convention applies.
//!
//! Every call site gets its own instance: per-frame state such as timers,
//! smoothing accumulators and recordings lives in explicit fields of the
//! function struct and is never shared.
//!
//! Families:
//!
//! - `math.rs`: stateless arithmetic, comparison and trigonometry.
//! - `edge.rs`: edge, hold, tap, toggle, pulse and timer detection.
//! - `history.rs`: trailing windows, delay lines, recording and sequences.
//! - `shaping.rs`: analog shaping (deadzones, curves, smoothing, relative axes).
//! - `meta.rs`: focus policy, game speed and frame-rate conversion.

mod edge;
mod history;
mod math;
mod meta;
mod shaping;


use crate::expression::{ControlEnvironment, Expression};
use crate::runtime::{DETACHED_RUNTIME, InputRuntime};
use crate::{ControlState, FocusFlags};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of an arity/shape check: `Err` holds the expected argument list,
/// e.g. `"input, seconds"`.
pub(crate) type ArgumentValidation = Result<(), &'static str>;

pub(crate) type Constructor = fn() -> Box<dyn Function>;

/// Behavior of one function kind.
///
/// Argument subtrees are owned by the enclosing [`FunctionExpression`] and
/// passed in on every call; the implementor only owns its private state.
pub(crate) trait Function: Send + fmt::Debug {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation;

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState;

    fn set_value(&mut self, _args: &mut [Expression], _runtime: &InputRuntime, _value: ControlState) {}

    fn focus_flags(&self, args: &[Expression]) -> FocusFlags {
        args.iter().fold(FocusFlags::empty(), |flags, arg| flags | arg.focus_flags())
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    use edge::*;
    use history::*;
    use math::*;
    use meta::*;
    use shaping::*;

    function_table! {
        // Stateless math.
        "if" => If,
        "not" => Not,
        "minus" => Minus,
        "plus" => Plus,
        "min" => Binary::min(),
        "max" => Binary::max(),
        "pow" => Binary::pow(),
        "atan2" => Binary::atan2(),
        "clamp" => Clamp,
        "sqrt" => Unary::sqrt(),
        "sin" => Unary::sin(),
        "cos" => Unary::cos(),
        "tan" => Unary::tan(),
        "asin" => Unary::asin(),
        "acos" => Unary::acos(),
        "atan" => Unary::atan(),

        // Edge and hold detection.
        "onPress" => EdgeLatch::press(),
        "onRelease" => EdgeLatch::release(),
        "onChange" => EdgeLatch::change(),
        "toggle" => Toggle::default(),
        "onHold" => OnHold::default(),
        "hold" => OnHold::default(),
        "onTap" => OnTap::default(),
        "tap" => OnTap::default(),
        "cache" => Cache::default(),
        "pulse" => Pulse::default(),
        "timer" => Timer::default(),
        "interval" => Interval::default(),

        // History and recording.
        "average" => Window::average(),
        "sum" => Window::sum(),
        "lag" => Lag::default(),
        "record" => Record::default(),
        "sequence" => Sequence::default(),

        // Analog shaping.
        "deadzone" => Deadzone,
        "antiDeadzone" => AntiDeadzone,
        "bezierCurve" => BezierCurve,
        "antiAcceleration" => AntiAcceleration::default(),
        "smooth" => Smooth::default(),
        "relativeToSpeed" => RelativeToSpeed::default(),
        "relative" => RelativeToSpeed::default(),
        "sharedRelative" => SharedRelative::default(),

        // Meta and focus.
        "gameSpeed" => GameSpeed,
        "hasFocus" => HasFocus,
        "ignoreFocus" => FocusOverride::ignore(),
        "requireFocus" => FocusOverride::require(),
        "ignoreOnFocusChange" => FocusOverride::ignore_on_change(),
        "timeToInputFrames" => TimeToInputFrames,
        "videoToInputFrames" => VideoToInputFrames,
    }
});

/// Canonical spelling for names kept for older mapping strings.
fn canonical_name(name: &str) -> &str {
    match name {
        "hold" => "onHold",
        "tap" => "onTap",
        "relative" => "relativeToSpeed",
        other => other,
    }
}

/// Instantiate the function called `name`, or `None` if no such function exists.
pub(crate) fn make_function(name: &str) -> Option<FunctionExpression> {
    let (&registered, constructor) = REGISTRY.get_key_value(name)?;
    let canonical = REGISTRY.get_key_value(canonical_name(registered)).map_or(registered, |(key, _)| *key);
    Some(FunctionExpression {
        name: canonical,
        function: constructor(),
        args: Vec::new(),
        runtime: Arc::clone(&DETACHED_RUNTIME),
    })
}

/// True if `name` is a function name (and therefore can't be written as a bare
/// control name).
pub fn is_function_name(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// All registered function names, sorted.
pub fn function_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// A function call node: name, argument subtrees and the function's private
/// state.
pub struct FunctionExpression {
    pub(crate) name: &'static str,
    function: Box<dyn Function>,
    pub(crate) args: Vec<Expression>,
    runtime: Arc<InputRuntime>,
}

impl fmt::Debug for FunctionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionExpression")
            .field("name", &self.name)
            .field("state", &self.function)
            .field("args", &self.args)
            .finish()
    }
}

impl FunctionExpression {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub(crate) fn set_arguments(&mut self, args: Vec<Expression>) -> ArgumentValidation {
        self.args = args;
        self.function.validate(&self.args)
    }

    pub(crate) fn get_value(&mut self) -> ControlState {
        self.function.get_value(&mut self.args, &self.runtime)
    }

    pub(crate) fn set_value(&mut self, value: ControlState) {
        self.function.set_value(&mut self.args, &self.runtime, value);
    }

    pub(crate) fn count_num_controls(&self) -> usize {
        self.args.iter().map(Expression::count_num_controls).sum()
    }

    pub(crate) fn update_references(&mut self, env: &mut ControlEnvironment) {
        self.runtime = Arc::clone(env.runtime());
        for arg in &mut self.args {
            arg.update_references(env);
        }
    }

    pub(crate) fn focus_flags(&self) -> FocusFlags {
        self.function.focus_flags(&self.args)
    }
}

// --- Helpers shared by the families ------------------------------------------

/// Value of an optional argument, or `default` when it was not supplied.
pub(super) fn optional_arg(args: &mut [Expression], index: usize, default: ControlState) -> ControlState {
    args.get_mut(index).map_or(default, Expression::get_value)
}

/// Seconds as `f64` from a runtime duration difference.
pub(super) fn seconds_between(earlier: std::time::Duration, later: std::time::Duration) -> f64 {
    later.saturating_sub(earlier).as_secs_f64()
}

/// Frame counts supplied as expressions are rounded and kept at least 1.
pub(super) fn frame_count(value: ControlState) -> usize {
    if value.is_finite() && value >= 1.0 { value.round() as usize } else { 1 }
}

/// Non-negative, finite seconds as a `Duration`; anything else is zero.
pub(super) fn duration_from_secs(seconds: f64) -> std::time::Duration {
    if seconds.is_finite() && seconds > 0.0 {
        std::time::Duration::from_secs_f64(seconds.min(1.0e9))
    } else {
        std::time::Duration::ZERO
    }
}
