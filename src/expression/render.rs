//! Canonical text form of a tree.
//!
//! Binary operators are always parenthesized and controls are quoted unless
//! they lex back as a plain bareword, so parsing the output yields a tree that
//! evaluates identically.

use super::tree::{ControlExpression, Expression};
use crate::functions::is_function_name;
use std::fmt;

/// True if `name` would lex as a single bareword and not be taken as a
/// function call.
fn is_plain_control_name(name: &str) -> bool {
    regex!(r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(name) && !is_function_name(name)
}

impl fmt::Display for ControlExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifier.device.is_none() && is_plain_control_name(&self.qualifier.control_name) {
            f.write_str(&self.qualifier.control_name)
        } else {
            write!(f, "`{}`", self.qualifier)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Control(control) => fmt::Display::fmt(control, f),
            Expression::Literal(value) if *value < 0.0 => write!(f, "-{}", -value),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Variable(variable) => write!(f, "${}", variable.name),
            Expression::Binary(binary) => {
                let symbol = binary.op.symbol();
                if symbol == "," {
                    write!(f, "({}, {})", binary.lhs, binary.rhs)
                } else {
                    write!(f, "({} {} {})", binary.lhs, symbol, binary.rhs)
                }
            }
            Expression::Hotkey(hotkey) => {
                f.write_str("@(")?;
                for modifier in &hotkey.modifiers {
                    write!(f, "{}+", modifier)?;
                }
                write!(f, "{})", hotkey.final_input)
            }
            Expression::Coalesce(coalesce) => fmt::Display::fmt(coalesce.active_child_ref(), f),
            Expression::Function(function) => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in function.args().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(arg, f)?;
                }
                f.write_str(")")
            }
        }
    }
}
