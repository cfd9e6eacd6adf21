use super::{ArgumentValidation, Function};
use crate::expression::{Expression, bool_state};
use crate::runtime::InputRuntime;
use crate::{ControlState, FocusFlags};

/// `gameSpeed()`: current emulation speed multiplier.
#[derive(Debug)]
pub(crate) struct GameSpeed;

impl Function for GameSpeed {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 0..=0, "")
    }

    fn get_value(&mut self, _: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        runtime.game_speed()
    }
}

/// `hasFocus()`: 1 while the render window has focus.
#[derive(Debug)]
pub(crate) struct HasFocus;

impl Function for HasFocus {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 0..=0, "")
    }

    fn get_value(&mut self, _: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        bool_state(runtime.has_focus())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPolicy {
    Ignore,
    Require,
    IgnoreOnChange,
}

/// `ignoreFocus(x)`, `requireFocus(x)` and `ignoreOnFocusChange(x)`.
///
/// Values pass through in both directions; only the focus flags of the
/// subtree are replaced.
#[derive(Debug)]
pub(crate) struct FocusOverride {
    policy: FocusPolicy,
}

impl FocusOverride {
    pub(crate) fn ignore() -> Self {
        Self { policy: FocusPolicy::Ignore }
    }

    pub(crate) fn require() -> Self {
        Self { policy: FocusPolicy::Require }
    }

    pub(crate) fn ignore_on_change() -> Self {
        Self { policy: FocusPolicy::IgnoreOnChange }
    }
}

impl Function for FocusOverride {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        args[0].get_value()
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        args[0].set_value(value);
    }

    fn focus_flags(&self, _args: &[Expression]) -> FocusFlags {
        match self.policy {
            FocusPolicy::Ignore => FocusFlags::empty(),
            FocusPolicy::Require => FocusFlags::REQUIRE_FOCUS | FocusFlags::REQUIRE_FULL_FOCUS,
            FocusPolicy::IgnoreOnChange => FocusFlags::IGNORE_ON_FOCUS_CHANGED,
        }
    }
}

/// `timeToInputFrames(seconds)`: how many input polls `seconds` spans.
#[derive(Debug)]
pub(crate) struct TimeToInputFrames;

impl Function for TimeToInputFrames {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "seconds")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let frames = args[0].get_value() * runtime.input_update_rate();
        if frames.is_finite() { frames } else { 0.0 }
    }
}

/// `videoToInputFrames(frames)`: converts a count of video frames into input
/// polls at the current rates.
#[derive(Debug)]
pub(crate) struct VideoToInputFrames;

impl Function for VideoToInputFrames {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "frames")
    }

    fn get_value(&mut self, args: &mut [Expression], runtime: &InputRuntime) -> ControlState {
        let frames = args[0].get_value() * runtime.input_update_rate() / runtime.video_refresh_rate();
        if frames.is_finite() { frames } else { 0.0 }
    }
}
