//! Expression tree nodes and their evaluation semantics.
//!
//! The node set is closed: controls, literals, variables, binary operators,
//! hotkeys, the bareword/complex coalesce pair, and function calls. Every node
//! is re-evaluated once per input poll and may carry state across polls.
//!
//! Shared contract:
//!
//! - `get_value` returns a sample meant for `[0, 1]` use. Raw device reads are
//!   clamped to `>= 0` at the control leaf only; arithmetic above it is not
//!   clamped, except that `/` and `%` never produce NaN or infinity.
//! - `set_value` writes toward outputs and is a no-op on pure inputs.
//! - `count_num_controls` is `>= 1` if the subtree resolved to a real control.

use super::environment::{ControlEnvironment, VariableCell};
use super::qualifier::ControlQualifier;
use super::suppression::{HotkeySuppressions, Suppressor};
use super::token::TokenKind;
use crate::device::{Input, InputId, Output};
use crate::functions::FunctionExpression;
use crate::{ControlState, FocusFlags, is_pressed};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A parsed mapping expression.
#[derive(Debug)]
pub enum Expression {
    Control(ControlExpression),
    Literal(ControlState),
    Variable(VariableExpression),
    Binary(BinaryExpression),
    Hotkey(HotkeyExpression),
    Coalesce(CoalesceExpression),
    Function(FunctionExpression),
}

impl Expression {
    pub fn control(qualifier: ControlQualifier) -> Self {
        Expression::Control(ControlExpression::new(qualifier))
    }

    pub fn literal(value: ControlState) -> Self {
        Expression::Literal(value)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(VariableExpression { name: name.into(), cell: None })
    }

    pub fn binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(BinaryExpression { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn hotkey(modifiers: Vec<ControlExpression>, final_input: ControlExpression) -> Self {
        Expression::Hotkey(HotkeyExpression { modifiers, final_input, suppressor: None, is_blocked: false })
    }

    pub fn coalesce(lhs: Expression, rhs: Expression) -> Self {
        Expression::Coalesce(CoalesceExpression { lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    /// Evaluate for the current poll.
    pub fn get_value(&mut self) -> ControlState {
        match self {
            Expression::Control(control) => control.get_value(),
            Expression::Literal(value) => *value,
            Expression::Variable(variable) => variable.cell.as_ref().map_or(0.0, |cell| cell.get()),
            Expression::Binary(binary) => binary.get_value(),
            Expression::Hotkey(hotkey) => hotkey.get_value(),
            Expression::Coalesce(coalesce) => coalesce.active_child().get_value(),
            Expression::Function(function) => function.get_value(),
        }
    }

    /// Write `value` toward whatever outputs the tree references.
    pub fn set_value(&mut self, value: ControlState) {
        match self {
            Expression::Control(control) => control.set_value(value),
            Expression::Literal(_) | Expression::Hotkey(_) => {}
            Expression::Variable(variable) => {
                if let Some(cell) = &variable.cell {
                    cell.set(value);
                }
            }
            Expression::Binary(binary) => {
                // "A & B" and "A | B" both drive A and B.
                binary.lhs.set_value(value);
                binary.rhs.set_value(value);
            }
            Expression::Coalesce(coalesce) => coalesce.active_child().set_value(value),
            Expression::Function(function) => function.set_value(value),
        }
    }

    /// Number of resolved controls in the subtree.
    pub fn count_num_controls(&self) -> usize {
        match self {
            Expression::Control(control) => control.count_num_controls(),
            Expression::Literal(_) | Expression::Variable(_) => 0,
            Expression::Binary(binary) => binary.lhs.count_num_controls() + binary.rhs.count_num_controls(),
            Expression::Hotkey(hotkey) => {
                hotkey.modifiers.iter().map(ControlExpression::count_num_controls).sum::<usize>()
                    + hotkey.final_input.count_num_controls()
            }
            Expression::Coalesce(coalesce) => coalesce.active_child_ref().count_num_controls(),
            Expression::Function(function) => function.count_num_controls(),
        }
    }

    /// Rebind every control and variable against `env`.
    ///
    /// Called after parsing and again whenever the device set changes.
    pub fn update_references(&mut self, env: &mut ControlEnvironment) {
        match self {
            Expression::Control(control) => control.update_references(env),
            Expression::Literal(_) => {}
            Expression::Variable(variable) => variable.cell = Some(env.variable(&variable.name)),
            Expression::Binary(binary) => {
                binary.lhs.update_references(env);
                binary.rhs.update_references(env);
            }
            Expression::Hotkey(hotkey) => hotkey.update_references(env),
            Expression::Coalesce(coalesce) => {
                coalesce.lhs.update_references(env);
                coalesce.rhs.update_references(env);
            }
            Expression::Function(function) => function.update_references(env),
        }
    }

    /// Focus policy of the subtree.
    pub fn focus_flags(&self) -> FocusFlags {
        match self {
            Expression::Control(_) | Expression::Hotkey(_) => FocusFlags::DEFAULT,
            Expression::Literal(_) | Expression::Variable(_) => FocusFlags::empty(),
            Expression::Binary(binary) => binary.lhs.focus_flags() | binary.rhs.focus_flags(),
            Expression::Coalesce(coalesce) => coalesce.active_child_ref().focus_flags(),
            Expression::Function(function) => function.focus_flags(),
        }
    }
}

// --- Control leaf --------------------------------------------------------------

/// Leaf bound to one device input and/or output.
pub struct ControlExpression {
    pub(crate) qualifier: ControlQualifier,
    input: Option<(InputId, Arc<dyn Input>)>,
    output: Option<Arc<dyn Output>>,
    suppressions: Option<Arc<HotkeySuppressions>>,
}

impl fmt::Debug for ControlExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlExpression")
            .field("qualifier", &self.qualifier)
            .field("input", &self.input.as_ref().map(|(id, _)| id))
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl ControlExpression {
    pub fn new(qualifier: ControlQualifier) -> Self {
        Self { qualifier, input: None, output: None, suppressions: None }
    }

    pub fn qualifier(&self) -> &ControlQualifier {
        &self.qualifier
    }

    pub fn input_id(&self) -> Option<InputId> {
        self.input.as_ref().map(|(id, _)| *id)
    }

    /// Raw state clamped to `>= 0`; hotkey suppression is not consulted.
    ///
    /// Values above 1 are kept so unbounded sources such as mouse axes survive.
    pub fn value_ignoring_suppression(&self) -> ControlState {
        self.input.as_ref().map_or(0.0, |(_, input)| input.state().max(0.0))
    }

    pub fn get_value(&self) -> ControlState {
        if let (Some((id, _)), Some(table)) = (&self.input, &self.suppressions) {
            if table.is_suppressed(*id) {
                return 0.0;
            }
        }
        self.value_ignoring_suppression()
    }

    pub fn set_value(&self, value: ControlState) {
        if let Some(output) = &self.output {
            output.set_state(value);
        }
    }

    pub fn count_num_controls(&self) -> usize {
        usize::from(self.input.is_some() || self.output.is_some())
    }

    pub fn update_references(&mut self, env: &ControlEnvironment) {
        self.input = env.find_input(&self.qualifier);
        self.output = env.find_output(&self.qualifier);
        self.suppressions = Some(env.suppressions().clone());
        if self.input.is_none() && self.output.is_none() {
            trace!("Control '{}' is unresolved; it reads 0", self.qualifier);
        }
    }

    fn suppressions(&self) -> Option<&Arc<HotkeySuppressions>> {
        self.suppressions.as_ref()
    }
}

// --- Variables -----------------------------------------------------------------

/// `$name`: reads 0 and ignores writes until bound.
#[derive(Debug)]
pub struct VariableExpression {
    pub(crate) name: String,
    cell: Option<Arc<VariableCell>>,
}

// --- Binary operators ----------------------------------------------------------

/// Infix operators, tightest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    GreaterThan,
    LessThan,
    And,
    Xor,
    Or,
    Assign,
    Comma,
}

impl BinaryOperator {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Mul => BinaryOperator::Mul,
            TokenKind::Div => BinaryOperator::Div,
            TokenKind::Mod => BinaryOperator::Mod,
            TokenKind::Add => BinaryOperator::Add,
            TokenKind::Sub => BinaryOperator::Sub,
            TokenKind::GreaterThan => BinaryOperator::GreaterThan,
            TokenKind::LessThan => BinaryOperator::LessThan,
            TokenKind::And => BinaryOperator::And,
            TokenKind::Xor => BinaryOperator::Xor,
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::Assign => BinaryOperator::Assign,
            TokenKind::Comma => BinaryOperator::Comma,
            _ => return None,
        })
    }

    /// Lower binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 1,
            BinaryOperator::Add | BinaryOperator::Sub => 2,
            BinaryOperator::GreaterThan | BinaryOperator::LessThan => 3,
            BinaryOperator::And => 4,
            BinaryOperator::Xor => 5,
            BinaryOperator::Or => 6,
            BinaryOperator::Assign => 7,
            BinaryOperator::Comma => 8,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThan => "<",
            BinaryOperator::And => "&",
            BinaryOperator::Xor => "^",
            BinaryOperator::Or => "|",
            BinaryOperator::Assign => "=",
            BinaryOperator::Comma => ",",
        }
    }
}

#[derive(Debug)]
pub struct BinaryExpression {
    pub(crate) op: BinaryOperator,
    pub(crate) lhs: Box<Expression>,
    pub(crate) rhs: Box<Expression>,
}

impl BinaryExpression {
    fn get_value(&mut self) -> ControlState {
        let lhs = &mut self.lhs;
        let rhs = &mut self.rhs;
        match self.op {
            BinaryOperator::And => lhs.get_value().min(rhs.get_value()),
            BinaryOperator::Or => lhs.get_value().max(rhs.get_value()),
            BinaryOperator::Add => lhs.get_value() + rhs.get_value(),
            BinaryOperator::Sub => lhs.get_value() - rhs.get_value(),
            BinaryOperator::Mul => lhs.get_value() * rhs.get_value(),
            BinaryOperator::Div => {
                let result = lhs.get_value() / rhs.get_value();
                if result.is_finite() { result } else { 0.0 }
            }
            BinaryOperator::Mod => {
                let result = lhs.get_value() % rhs.get_value();
                if result.is_nan() { 0.0 } else { result }
            }
            BinaryOperator::Assign => {
                let value = rhs.get_value();
                lhs.set_value(value);
                lhs.get_value()
            }
            BinaryOperator::LessThan => bool_state(lhs.get_value() < rhs.get_value()),
            BinaryOperator::GreaterThan => bool_state(lhs.get_value() > rhs.get_value()),
            BinaryOperator::Comma => {
                lhs.get_value();
                rhs.get_value()
            }
            BinaryOperator::Xor => {
                let l = lhs.get_value();
                let r = rhs.get_value();
                (1.0 - l).min(r).max(l.min(1.0 - r))
            }
        }
    }
}

pub(crate) fn bool_state(value: bool) -> ControlState {
    if value { 1.0 } else { 0.0 }
}

// --- Hotkeys -------------------------------------------------------------------

/// `@(mod1+mod2+final)`.
///
/// Passes the final input through only while every modifier is pressed and no
/// more specific hotkey owns the final input. While armed it suppresses plain
/// reads of the final input. Once blocked (final input already held when the
/// modifiers went down, or claimed by another hotkey) it stays blocked until
/// the final input is released.
#[derive(Debug)]
pub struct HotkeyExpression {
    pub(crate) modifiers: Vec<ControlExpression>,
    pub(crate) final_input: ControlExpression,
    suppressor: Option<Suppressor>,
    is_blocked: bool,
}

impl HotkeyExpression {
    fn modifier_ids(&self) -> Vec<InputId> {
        self.modifiers.iter().filter_map(ControlExpression::input_id).collect()
    }

    fn get_value(&mut self) -> ControlState {
        let modifiers_pressed = self.modifiers.iter().all(|m| is_pressed(m.get_value()));
        let final_state = self.final_input.value_ignoring_suppression();

        if !modifiers_pressed {
            self.suppressor = None;
            self.is_blocked = is_pressed(final_state);
            return 0.0;
        }

        let is_suppressed = match (self.final_input.input_id(), self.final_input.suppressions()) {
            (Some(id), Some(table)) => table.is_suppressed_ignoring_modifiers(id, &self.modifier_ids()),
            _ => false,
        };

        if !is_pressed(final_state) {
            self.is_blocked = false;
        }
        if is_suppressed {
            self.is_blocked = true;
        }
        if self.is_blocked {
            return 0.0;
        }

        self.enable_suppression(false);
        final_state
    }

    /// Register with the suppression table. `force` re-registers an active
    /// registration, which is how rebinding picks up new input ids.
    fn enable_suppression(&mut self, force: bool) {
        if self.suppressor.is_some() && !force {
            return;
        }
        // Release before re-registering so a rebind never double counts.
        self.suppressor = None;

        let (Some(final_id), Some(table)) = (self.final_input.input_id(), self.final_input.suppressions()) else {
            return;
        };
        let modifiers = self.modifier_ids();
        self.suppressor = Some(table.make_suppressor(final_id, &modifiers));
    }

    fn update_references(&mut self, env: &mut ControlEnvironment) {
        for modifier in &mut self.modifiers {
            modifier.update_references(env);
        }
        self.final_input.update_references(env);
        if self.suppressor.is_some() {
            self.enable_suppression(true);
        }
    }
}

// --- Coalesce ------------------------------------------------------------------

/// Bareword fallback (`lhs`) paired with the fully parsed tree (`rhs`).
///
/// Whichever side resolved to real controls wins, preferring the bareword
/// side, so legacy mappings naming a control with spaces or operators in it
/// keep working.
#[derive(Debug)]
pub struct CoalesceExpression {
    pub(crate) lhs: Box<Expression>,
    pub(crate) rhs: Box<Expression>,
}

impl CoalesceExpression {
    fn active_child(&mut self) -> &mut Expression {
        if self.lhs.count_num_controls() > 0 { &mut self.lhs } else { &mut self.rhs }
    }

    pub(crate) fn active_child_ref(&self) -> &Expression {
        if self.lhs.count_num_controls() > 0 { &self.lhs } else { &self.rhs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: ControlState) -> Expression {
        Expression::literal(value)
    }

    fn eval(op: BinaryOperator, l: ControlState, r: ControlState) -> ControlState {
        Expression::binary(op, lit(l), lit(r)).get_value()
    }

    #[test]
    fn binary_operator_semantics() {
        // (op, lhs, rhs, expected)
        let cases = vec![
            (BinaryOperator::And, 0.7, 0.8, 0.7),
            (BinaryOperator::Or, 0.7, 0.8, 0.8),
            (BinaryOperator::Add, 0.5, 0.75, 1.25),
            (BinaryOperator::Sub, 0.5, 0.75, -0.25),
            (BinaryOperator::Mul, 0.5, 0.5, 0.25),
            (BinaryOperator::Div, 1.0, 4.0, 0.25),
            (BinaryOperator::Div, 1.0, 0.0, 0.0),
            (BinaryOperator::Div, 0.0, 0.0, 0.0),
            (BinaryOperator::Mod, 5.0, 3.0, 2.0),
            (BinaryOperator::Mod, 5.0, 0.0, 0.0),
            (BinaryOperator::LessThan, 0.2, 0.3, 1.0),
            (BinaryOperator::LessThan, 0.3, 0.3, 0.0),
            (BinaryOperator::GreaterThan, 0.4, 0.3, 1.0),
            (BinaryOperator::Comma, 0.4, 0.9, 0.9),
            (BinaryOperator::Xor, 1.0, 0.0, 1.0),
            (BinaryOperator::Xor, 1.0, 1.0, 0.0),
            (BinaryOperator::Xor, 0.0, 0.0, 0.0),
            (BinaryOperator::Xor, 0.25, 0.5, 0.5),
        ];
        for (op, l, r, expected) in cases {
            let got = eval(op, l, r);
            assert!((got - expected).abs() < 1e-12, "{:?}({}, {}) = {}, expected {}", op, l, r, got, expected);
        }
    }

    #[test]
    fn precedence_order_is_total() {
        use BinaryOperator::*;
        let ordered = [Mul, Add, GreaterThan, And, Xor, Or, Assign, Comma];
        for pair in ordered.windows(2) {
            assert!(pair[0].precedence() < pair[1].precedence());
        }
        assert_eq!(Div.precedence(), Mul.precedence());
        assert_eq!(Sub.precedence(), Add.precedence());
    }

    #[test]
    fn unbound_leaves_read_zero_and_ignore_writes() {
        let mut control = Expression::control(ControlQualifier::bare("A"));
        control.set_value(1.0);
        assert_eq!(control.get_value(), 0.0);
        assert_eq!(control.count_num_controls(), 0);

        let mut variable = Expression::variable("x");
        variable.set_value(1.0);
        assert_eq!(variable.get_value(), 0.0);
    }

    #[test]
    fn coalesce_falls_back_to_rhs_without_controls() {
        let mut coalesce = Expression::coalesce(Expression::control(ControlQualifier::bare("1")), lit(1.0));
        assert_eq!(coalesce.get_value(), 1.0);
        assert_eq!(coalesce.focus_flags(), FocusFlags::empty());
    }

    #[test]
    fn focus_flags_aggregate_by_or() {
        let expr = Expression::binary(BinaryOperator::Add, Expression::control(ControlQualifier::bare("A")), lit(1.0));
        assert_eq!(expr.focus_flags(), FocusFlags::DEFAULT);
    }
}
