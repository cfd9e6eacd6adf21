//! Tokens to an expression tree.
//!
//! Recursive descent for atoms, precedence climbing for infix operators:
//!
//! ```text
//! Toplevel := Binary EOF
//! Binary   := Atom (BinOp Binary)*          (climbs while op binds tighter)
//! Atom     := Bareword [Args] | Control | Literal | Variable
//!           | '(' Binary ')' | '@' Hotkey | ('!' | '-' | '+') Atom
//! Args     := '(' [Binary (',' Binary)*] ')' | Atom
//! Hotkey   := '(' Name ('+' Name)* ')'
//! ```
//!
//! A bareword is looked up in the function registry first and becomes a
//! control reference only when no function has that name.

use super::qualifier::ControlQualifier;
use super::token::{Token, TokenKind};
use super::tree::{BinaryOperator, ControlExpression, Expression};
use crate::error::ParseError;
use crate::functions::{FunctionExpression, make_function};

/// Deepest nesting of parentheses, calls and unary operators accepted, and
/// the tallest tree any operator chain may fold into.
const MAX_DEPTH: usize = 256;

/// A subtree together with its height.
type Parsed = (Expression, usize);

fn too_deep(token: Token) -> ParseError {
    ParseError::new(token, "Expression is nested too deeply.")
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    position: usize,
    eof: Token,
    depth: usize,
}

impl Parser {
    /// Whitespace and comments are dropped here.
    pub(crate) fn new(tokens: &[Token]) -> Self {
        let eof_position = tokens.last().map_or(0, |t| t.position + t.length);
        let tokens: Vec<Token> = tokens.iter().filter(|t| !t.kind.is_inert()).cloned().collect();
        Self { tokens, position: 0, eof: Token::new(TokenKind::Eof).at(eof_position, 0), depth: 0 }
    }

    pub(crate) fn parse(mut self) -> Result<Expression, ParseError> {
        let (expr, _) = self.parse_binary(u8::MAX)?;
        if self.peek().kind != TokenKind::Eof {
            return Err(ParseError::new(self.peek().clone(), "Expected end of input."));
        }
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn chew(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    /// Parse operators whose precedence is strictly below `precedence`.
    ///
    /// A left-deep chain such as `1+1+...+1` grows the tree by one level per
    /// operator, so each fold is checked against the height limit.
    fn parse_binary(&mut self, precedence: u8) -> Result<Parsed, ParseError> {
        let token = self.chew();
        let (mut lhs, mut height) = self.parse_atom(token)?;

        while let Some(op) = BinaryOperator::from_token(self.peek().kind) {
            if op.precedence() >= precedence {
                break;
            }
            let op_token = self.chew();
            let (rhs, rhs_height) = self.parse_binary(op.precedence())?;
            height = height.max(rhs_height) + 1;
            if height > MAX_DEPTH {
                return Err(too_deep(op_token));
            }
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok((lhs, height))
    }

    fn parse_atom(&mut self, token: Token) -> Result<Parsed, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep(token));
        }
        self.depth += 1;
        let result = self.parse_atom_inner(token);
        self.depth -= 1;
        result
    }

    fn parse_atom_inner(&mut self, token: Token) -> Result<Parsed, ParseError> {
        match token.kind {
            TokenKind::Bareword => match make_function(&token.data) {
                Some(function) => self.parse_function_arguments(function, token),
                None => Ok((Expression::control(ControlQualifier::bare(token.data)), 1)),
            },
            TokenKind::Control => Ok((Expression::control(ControlQualifier::parse(&token.data)), 1)),
            TokenKind::Not => self.parse_unary("not", token),
            TokenKind::Sub => self.parse_unary("minus", token),
            TokenKind::Add => self.parse_unary("plus", token),
            TokenKind::Literal => match token.data.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok((Expression::literal(value), 1)),
                _ => Err(ParseError::new(token, "Invalid literal.")),
            },
            TokenKind::Variable => Ok((Expression::variable(token.data), 1)),
            TokenKind::LParen => self.parse_paren(),
            TokenKind::Hotkey => self.parse_hotkeys(),
            _ => Err(ParseError::new(token, "Expected start of expression.")),
        }
    }

    fn parse_unary(&mut self, name: &str, token: Token) -> Result<Parsed, ParseError> {
        match make_function(name) {
            Some(function) => self.parse_function_arguments(function, token),
            None => Err(ParseError::new(token, format!("Unknown function '{}'.", name))),
        }
    }

    fn parse_function_arguments(
        &mut self,
        mut function: FunctionExpression,
        function_token: Token,
    ) -> Result<Parsed, ParseError> {
        let mut args = Vec::new();
        let mut height = 0;

        if self.peek().kind != TokenKind::LParen {
            // `!A`, `-A`: exactly one atom, no parens.
            let token = self.chew();
            let (arg, arg_height) = self.parse_atom(token)?;
            args.push(arg);
            height = arg_height;
        } else {
            self.chew();
            if self.peek().kind == TokenKind::RParen {
                self.chew();
            } else {
                loop {
                    let (arg, arg_height) = self.parse_binary(BinaryOperator::Comma.precedence())?;
                    args.push(arg);
                    height = height.max(arg_height);
                    let token = self.chew();
                    match token.kind {
                        TokenKind::RParen => break,
                        TokenKind::Comma => {}
                        _ => return Err(ParseError::new(token, "Expected , or ).")),
                    }
                }
            }
        }

        if height >= MAX_DEPTH {
            return Err(too_deep(function_token));
        }
        if let Err(expected) = function.set_arguments(args) {
            return Err(ParseError::new(function_token, format!("Expected arguments: {}", expected)));
        }
        Ok((Expression::Function(function), height + 1))
    }

    fn parse_paren(&mut self) -> Result<Parsed, ParseError> {
        let inner = self.parse_binary(u8::MAX)?;
        let token = self.chew();
        if token.kind != TokenKind::RParen {
            return Err(ParseError::new(token, "Expected closing paren."));
        }
        Ok(inner)
    }

    fn parse_hotkeys(&mut self) -> Result<Parsed, ParseError> {
        let token = self.chew();
        if token.kind != TokenKind::LParen {
            return Err(ParseError::new(token, "Expected opening paren."));
        }

        let mut modifiers = Vec::new();
        loop {
            let token = self.chew();
            if !matches!(token.kind, TokenKind::Control | TokenKind::Bareword) {
                return Err(ParseError::new(token, "Expected name of input."));
            }
            let control = ControlExpression::new(ControlQualifier::parse(&token.data));

            let token = self.chew();
            match token.kind {
                TokenKind::Add => modifiers.push(control),
                TokenKind::RParen => return Ok((Expression::hotkey(modifiers, control), 2)),
                _ => return Err(ParseError::new(token, "Expected + or ).")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Lexer;

    fn parse(text: &str) -> Result<Expression, ParseError> {
        let (tokens, _) = Lexer::new(text).tokenize();
        Parser::new(&tokens).parse()
    }

    fn error(text: &str) -> (String, usize) {
        let err = parse(text).expect_err("expected a syntax error");
        (err.description, err.token.position)
    }

    #[test]
    fn operators_climb_by_precedence() {
        let Expression::Binary(top) = parse("1 + 2 * 3").unwrap() else { panic!("expected binary") };
        assert_eq!(top.op, BinaryOperator::Add);
        assert!(matches!(*top.rhs, Expression::Binary(ref b) if b.op == BinaryOperator::Mul));
    }

    #[test]
    fn same_precedence_is_left_associative() {
        assert_eq!(parse("8 - 2 - 1").unwrap().get_value(), 5.0);
        assert_eq!(parse("8 / 2 / 2").unwrap().get_value(), 2.0);
    }

    #[test]
    fn unary_operators_take_one_atom() {
        assert_eq!(parse("-2 * 3").unwrap().get_value(), -6.0);
        assert_eq!(parse("!1 | 0.25").unwrap().get_value(), 0.25);
        assert_eq!(parse("+(2 + 1)").unwrap().get_value(), 3.0);
    }

    #[test]
    fn barewords_fall_back_to_controls() {
        assert!(matches!(parse("Button_A").unwrap(), Expression::Control(_)));
        assert!(matches!(parse("toggle(A)").unwrap(), Expression::Function(_)));
    }

    #[test]
    fn function_arguments_stop_at_commas() {
        assert_eq!(parse("max(1, (2, 3))").unwrap().get_value(), 3.0);
        assert_eq!(parse("clamp(5, 0, 1 + 1)").unwrap().get_value(), 2.0);
        assert!(matches!(parse("gameSpeed()").unwrap(), Expression::Function(_)));
    }

    #[test]
    fn syntax_errors_point_at_the_culprit() {
        let cases = vec![
            ("(1 + 2", ("Expected closing paren.", 6)),
            ("1 +", ("Expected start of expression.", 3)),
            ("max(1 2)", ("Expected , or ).", 6)),
            ("1 2", ("Expected end of input.", 2)),
            ("@A", ("Expected opening paren.", 1)),
            ("@(1)", ("Expected name of input.", 2)),
            ("@(A B)", ("Expected + or ).", 4)),
            ("'abc'", ("Invalid literal.", 0)),
            ("if(1, 2)", ("Expected arguments: condition, true_expression, false_expression", 0)),
        ];
        for (text, (description, position)) in cases {
            assert_eq!(error(text), (description.to_string(), position), "input: {:?}", text);
        }
    }

    #[test]
    fn runaway_nesting_is_rejected() {
        let text = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(error(&text).0, "Expression is nested too deeply.");
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let fits = vec!["1"; MAX_DEPTH].join("+");
        assert_eq!(parse(&fits).unwrap().get_value(), MAX_DEPTH as f64);

        let (description, position) = error(&vec!["1"; MAX_DEPTH + 2].join("+"));
        assert_eq!(description, "Expression is nested too deeply.");
        // The operator that would have pushed the tree past the limit.
        assert_eq!(position, 2 * MAX_DEPTH - 1);

        let huge = vec!["1"; 5000].join(" * ");
        assert_eq!(error(&huge).0, "Expression is nested too deeply.");

        let nested_chains = format!("{}1{}", "(1 + ".repeat(200), " + 1)".repeat(200));
        assert_eq!(error(&nested_chains).0, "Expression is nested too deeply.");
    }

    #[test]
    fn hotkeys_collect_modifiers_in_order() {
        let Expression::Hotkey(hotkey) = parse("@(Ctrl + `Shift` + A)").unwrap() else { panic!("expected hotkey") };
        let names: Vec<&str> = hotkey.modifiers.iter().map(|m| m.qualifier.control_name.as_str()).collect();
        assert_eq!(names, vec!["Ctrl", "Shift"]);
        assert_eq!(hotkey.final_input.qualifier.control_name, "A");
    }
}
