//! The input-mapping expression language.
//!
//! This module is the *core* of the crate. A mapping string such as
//! ``toggle(`Pad:Button A`) & !$paused`` travels through a short pipeline:
//!
//! ```text
//! text ── Lexer::tokenize ──▶ Vec<Token>          (lexer.rs, token.rs)
//!                               │ strip whitespace/comments
//!                               v
//!                    Parser::parse (parser.rs)
//!                      - precedence climbing over binary ops
//!                      - barewords probe the function registry first,
//!                        then fall back to a control reference
//!                               │
//!                               v
//!                       Expression tree (tree.rs)
//!                               │ update_references(env)  (environment.rs)
//!                               v
//!                  get_value / set_value once per poll
//! ```
//!
//! ## Responsibilities by module
//!
//! - `token.rs`: token kinds and the span bookkeeping shared by lexer/parser.
//! - `lexer.rs`: text to tokens; never fails silently, invalid characters
//!   produce an `Invalid` token carrying its position.
//! - `qualifier.rs`: `device:control` references.
//! - `parser.rs`: tokens to an [`Expression`] or a [`ParseError`].
//! - `tree.rs`: the closed set of node kinds and their evaluation semantics.
//! - `render.rs`: canonical text rendering of a parsed tree.
//! - `environment.rs`: binds control qualifiers to live devices and variables
//!   to shared cells.
//! - `suppression.rs`: the hotkey suppression table.
//!
//! The stateful function library lives in `crate::functions`; the parser only
//! knows it through [`crate::functions::make_function`].
//!
//! ## Invariants
//!
//! - A tree only exists once parsing succeeded, so evaluation never meets a
//!   malformed node.
//! - Unresolved controls are not errors: they read 0 and ignore writes.
//! - No node blocks inside `get_value`/`set_value`.
//!
//! [`ParseError`]: crate::ParseError

#[path = "expression/environment.rs"]
mod environment;
#[path = "expression/lexer.rs"]
mod lexer;
#[path = "expression/parser.rs"]
mod parser;
#[path = "expression/qualifier.rs"]
mod qualifier;
#[path = "expression/render.rs"]
mod render;
#[path = "expression/suppression.rs"]
mod suppression;
#[path = "expression/token.rs"]
mod token;
#[path = "expression/tree.rs"]
mod tree;

#[cfg(test)]
#[path = "expression/tests.rs"]
mod tests;

pub use environment::{ControlEnvironment, VariableCell};
pub(crate) use lexer::Lexer;
pub(crate) use parser::Parser;
pub use qualifier::ControlQualifier;
pub use suppression::{HotkeySuppressions, Suppressor};
pub use token::{Token, TokenKind};
pub(crate) use tree::bool_state;
pub use tree::{
    BinaryExpression, BinaryOperator, CoalesceExpression, ControlExpression, Expression, HotkeyExpression,
    VariableExpression,
};
