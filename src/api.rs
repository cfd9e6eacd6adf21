use crate::error::ParseError;
use crate::expression::{ControlQualifier, Expression, Lexer, Parser, Token, TokenKind};
use tracing::debug;

/// Outcome of lexing or parsing an expression string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    Successful,
    SyntaxError,
    /// Blank input (only whitespace and comments). Not an error; evaluates to 0.
    EmptyExpression,
}

/// Result of [`parse_expression`] and [`parse_tokens`].
///
/// On a syntax error `expr` may still hold the bareword fallback tree, which
/// keeps legacy single-control mappings usable while the error is shown.
#[derive(Debug)]
pub struct ParseResult {
    pub status: ParseStatus,
    pub expr: Option<Expression>,
    pub error: Option<ParseError>,
}

impl ParseResult {
    fn successful(expr: Expression) -> Self {
        Self { status: ParseStatus::Successful, expr: Some(expr), error: None }
    }

    fn empty() -> Self {
        Self { status: ParseStatus::EmptyExpression, expr: None, error: None }
    }

    fn syntax_error(error: ParseError) -> Self {
        Self { status: ParseStatus::SyntaxError, expr: None, error: Some(error) }
    }

    /// Evaluate once: the tree's value, or 0 when there is no tree.
    pub fn value(&mut self) -> crate::ControlState {
        self.expr.as_mut().map_or(0.0, Expression::get_value)
    }
}

/// Split `text` into tokens, whitespace and comments included.
///
/// On an invalid character the last token is the `Invalid` one and the status
/// is [`ParseStatus::SyntaxError`].
///
/// # Example
/// ```
/// use inputexpr::{ParseStatus, TokenKind, tokenize};
///
/// let (tokens, status) = tokenize("A & B");
/// assert_eq!(status, ParseStatus::Successful);
/// assert_eq!(tokens[2].kind, TokenKind::And);
/// ```
pub fn tokenize(text: &str) -> (Vec<Token>, ParseStatus) {
    Lexer::new(text).tokenize()
}

/// Parse an already lexed token stream with the full grammar.
pub fn parse_tokens(tokens: &[Token]) -> ParseResult {
    if tokens.iter().all(|t| t.kind.is_inert()) {
        return ParseResult::empty();
    }
    match Parser::new(tokens).parse() {
        Ok(expr) => ParseResult::successful(expr),
        Err(error) => ParseResult::syntax_error(error),
    }
}

/// Parse a mapping string.
///
/// The complex parse is paired with a bareword reading of the whole string as
/// one control name; whichever side resolves to real controls once bound is
/// used. So `Button A` keeps working as a single control even though it lexes
/// as two barewords.
///
/// # Example
/// ```
/// use inputexpr::{ParseStatus, parse_expression};
///
/// let mut result = parse_expression("1 / 0");
/// assert_eq!(result.status, ParseStatus::Successful);
/// assert_eq!(result.value(), 0.0);
///
/// assert_eq!(parse_expression("   ").status, ParseStatus::EmptyExpression);
/// ```
pub fn parse_expression(text: &str) -> ParseResult {
    if text.trim().is_empty() {
        return ParseResult::empty();
    }

    let bareword = Expression::control(ControlQualifier::bare(text));
    let (tokens, status) = tokenize(text);

    let complex = if status == ParseStatus::SyntaxError {
        let token = tokens.last().cloned().unwrap_or_else(|| Token::new(TokenKind::Invalid));
        ParseResult::syntax_error(ParseError::new(token, "Invalid token."))
    } else {
        parse_tokens(&tokens)
    };

    match complex {
        ParseResult { status: ParseStatus::Successful, expr: Some(expr), .. } => {
            ParseResult::successful(Expression::coalesce(bareword, expr))
        }
        ParseResult { status: ParseStatus::EmptyExpression, .. } => ParseResult::empty(),
        ParseResult { status, error, .. } => {
            if let Some(error) = &error {
                debug!(expression = text, "{}", error);
            }
            ParseResult { status, expr: Some(bareword), error }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_input_is_empty() {
        for text in ["", "   ", "\t\n", "/* nothing */"] {
            let mut result = parse_expression(text);
            assert_eq!(result.status, ParseStatus::EmptyExpression, "input: {:?}", text);
            assert!(result.error.is_none());
            assert_eq!(result.value(), 0.0);
        }
    }

    #[test]
    fn invalid_characters_report_the_token() {
        let result = parse_expression("A # B");
        assert_eq!(result.status, ParseStatus::SyntaxError);
        let error = result.error.unwrap();
        assert_eq!(error.description, "Invalid token.");
        assert_eq!(error.span(), 2..3);
        assert!(matches!(result.expr, Some(Expression::Control(_))));
    }

    #[test]
    fn syntax_errors_keep_the_bareword_fallback() {
        let result = parse_expression("Button A");
        assert_eq!(result.status, ParseStatus::SyntaxError);
        assert_eq!(result.error.unwrap().description, "Expected end of input.");
        let Some(Expression::Control(control)) = result.expr else { panic!("expected a control") };
        assert_eq!(control.qualifier().control_name, "Button A");
    }

    #[test]
    fn successful_parses_are_coalesced() {
        let result = parse_expression("A & B");
        assert_eq!(result.status, ParseStatus::Successful);
        assert!(matches!(result.expr, Some(Expression::Coalesce(_))));
    }

    #[test]
    fn parse_tokens_skips_the_fallback() {
        let (tokens, _) = tokenize("1 + 1");
        let mut result = parse_tokens(&tokens);
        assert!(matches!(result.expr, Some(Expression::Binary(_))));
        assert_eq!(result.value(), 2.0);
    }
}
