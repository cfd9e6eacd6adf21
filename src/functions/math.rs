use super::{ArgumentValidation, Function};
use crate::expression::Expression;
use crate::runtime::InputRuntime;
use crate::{ControlState, is_pressed};

/// `if(condition, when_true, when_false)`. Writes go to the selected branch.
///
/// Only the selected branch is evaluated, so stateful functions in the other
/// branch do not see that frame.
#[derive(Debug)]
pub(crate) struct If;

impl If {
    fn branch(args: &mut [Expression]) -> &mut Expression {
        if is_pressed(args[0].get_value()) { &mut args[1] } else { &mut args[2] }
    }
}

impl Function for If {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 3..=3, "condition, true_expression, false_expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        Self::branch(args).get_value()
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        Self::branch(args).set_value(value);
    }
}

/// `!x` / `not(x)`: `1 - x`.
#[derive(Debug)]
pub(crate) struct Not;

impl Function for Not {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        1.0 - args[0].get_value()
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        args[0].set_value(1.0 - value);
    }
}

/// Unary `-x`.
#[derive(Debug)]
pub(crate) struct Minus;

impl Function for Minus {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        -args[0].get_value()
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        args[0].set_value(-value);
    }
}

/// Unary `+x`.
#[derive(Debug)]
pub(crate) struct Plus;

impl Function for Plus {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        args[0].get_value()
    }

    fn set_value(&mut self, args: &mut [Expression], _: &InputRuntime, value: ControlState) {
        args[0].set_value(value);
    }
}

/// Single-argument math function.
#[derive(Debug)]
pub(crate) struct Unary {
    op: fn(ControlState) -> ControlState,
}

impl Unary {
    pub(crate) fn sqrt() -> Self {
        Self { op: f64::sqrt }
    }

    pub(crate) fn sin() -> Self {
        Self { op: f64::sin }
    }

    pub(crate) fn cos() -> Self {
        Self { op: f64::cos }
    }

    pub(crate) fn tan() -> Self {
        Self { op: f64::tan }
    }

    pub(crate) fn asin() -> Self {
        Self { op: f64::asin }
    }

    pub(crate) fn acos() -> Self {
        Self { op: f64::acos }
    }

    pub(crate) fn atan() -> Self {
        Self { op: f64::atan }
    }
}

impl Function for Unary {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 1..=1, "expression")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        (self.op)(args[0].get_value())
    }
}

/// Two-argument math function.
#[derive(Debug)]
pub(crate) struct Binary {
    op: fn(ControlState, ControlState) -> ControlState,
    expected: &'static str,
}

impl Binary {
    pub(crate) fn min() -> Self {
        Self { op: f64::min, expected: "a, b" }
    }

    pub(crate) fn max() -> Self {
        Self { op: f64::max, expected: "a, b" }
    }

    pub(crate) fn pow() -> Self {
        Self { op: f64::powf, expected: "base, exponent" }
    }

    pub(crate) fn atan2() -> Self {
        Self { op: f64::atan2, expected: "y, x" }
    }
}

impl Function for Binary {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        if args.len() == 2 { Ok(()) } else { Err(self.expected) }
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let a = args[0].get_value();
        let b = args[1].get_value();
        (self.op)(a, b)
    }
}

/// `clamp(value, min, max)`.
#[derive(Debug)]
pub(crate) struct Clamp;

impl Function for Clamp {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 3..=3, "value, min, max")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let min = args[1].get_value();
        let max = args[2].get_value();
        // f64::clamp panics when min > max; clamp by hand instead.
        value.max(min).min(max)
    }
}
