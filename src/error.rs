//! Error types surfaced by the lexer, parser and qualifier parsing.

use crate::expression::Token;
use thiserror::Error;

/// A syntax error tied to the token that caused it.
///
/// The token carries a byte position and length into the original expression
/// text so editors can underline the exact span.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{description} (at byte {})", .token.position)]
pub struct ParseError {
    /// Offending token.
    pub token: Token,
    /// Human-readable description, e.g. `"Expected closing paren."`.
    pub description: String,
}

impl ParseError {
    pub(crate) fn new(token: Token, description: impl Into<String>) -> Self {
        Self { token, description: description.into() }
    }

    /// Byte range of the offending token.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.token.position..self.token.position + self.token.length
    }
}

/// Failure to read a `source/id/name` device qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualifierError {
    #[error("device qualifier '{0}' is missing a source/id/name part")]
    MissingPart(String),

    #[error("device qualifier '{qualifier}' has a non-numeric id '{id}'")]
    InvalidId { qualifier: String, id: String },
}
