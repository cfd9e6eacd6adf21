extern crate self as inputexpr;

#[macro_use]
mod macros;
mod api;
mod device;
mod error;
mod expression;
mod functions;
mod reference;
mod runtime;

pub use api::{ParseResult, ParseStatus, parse_expression, parse_tokens, tokenize};
pub use device::{
    Device, DeviceContainer, DeviceId, DeviceQualifier, Input, InputId, Output, VirtualDevice, VirtualInput,
    VirtualOutput,
};
pub use error::{ParseError, QualifierError};
pub use expression::{
    BinaryExpression, BinaryOperator, CoalesceExpression, ControlEnvironment, ControlExpression, ControlQualifier,
    Expression, HotkeyExpression, HotkeySuppressions, Suppressor, Token, TokenKind, VariableCell, VariableExpression,
};
pub use functions::{FunctionExpression, function_names, is_function_name};
pub use reference::{ControlReference, MappingProfile, ProfileState, ReferenceKind};
pub use runtime::{Clock, InputRuntime, ManualClock, RuntimeOptions, SystemClock};

// --- Core numeric conventions ------------------------------------------------

/// Numeric sample produced and consumed by every expression node.
///
/// Reads are intended for the `[0, 1]` range but nothing past the control leaf
/// clamps them; mouse axes and similar sources may exceed 1.
pub type ControlState = f64;

/// Value above which a control counts as "pressed".
pub const CONDITION_THRESHOLD: ControlState = 0.5;

bitflags::bitflags! {
    /// Window-focus policy bits aggregated bottom-up through an expression.
    ///
    /// Control leaves contribute [`FocusFlags::DEFAULT`]; constants and
    /// variables contribute nothing. Function and binary nodes OR their
    /// children unless a focus meta function replaces the set outright.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FocusFlags: u8 {
        /// Read 0 unless the render window has focus.
        const REQUIRE_FOCUS           = 1 << 0;
        /// Read 0 unless the window has focus and is not obscured by a menu.
        const REQUIRE_FULL_FOCUS      = 1 << 1;
        /// After focus is regained, read 0 until the value is first released.
        const IGNORE_ON_FOCUS_CHANGED = 1 << 2;

        const DEFAULT = Self::REQUIRE_FOCUS.bits()
            | Self::REQUIRE_FULL_FOCUS.bits()
            | Self::IGNORE_ON_FOCUS_CHANGED.bits();
    }
}

/// Returns true when `state` counts as pressed.
#[inline]
pub(crate) fn is_pressed(state: ControlState) -> bool {
    state > CONDITION_THRESHOLD
}
