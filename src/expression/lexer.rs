//! Expression text to tokens.
//!
//! The lexer is re-run on every keystroke by editors, so it is a plain
//! single-pass scanner with one character of lookahead. It stops at the first
//! invalid character and reports it as an `Invalid` token whose span points at
//! the culprit.
//!
//! ```text
//! "toggle(`Pad:A`) /* x */ & 1.5"
//!  Bareword LParen Control RParen Whitespace Comment Whitespace And Whitespace Literal
//! ```

use super::token::{Token, TokenKind};
use crate::api::ParseStatus;
use std::iter::Peekable;
use std::str::CharIndices;

pub(crate) struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, chars: input.char_indices().peekable() }
    }

    /// Lex the whole input.
    ///
    /// On an invalid character the returned vector ends with the `Invalid`
    /// token and the status is `SyntaxError`. The end-of-input token is never
    /// included.
    pub(crate) fn tokenize(mut self) -> (Vec<Token>, ParseStatus) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            match token.kind {
                TokenKind::Eof => return (tokens, ParseStatus::Successful),
                TokenKind::Invalid => {
                    tokens.push(token);
                    return (tokens, ParseStatus::SyntaxError);
                }
                _ => tokens.push(token),
            }
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.input.len())
    }

    /// Consume characters while `pred` holds and return the consumed slice.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset();
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            self.chars.next();
        }
        let end = self.offset();
        &self.input[start..end]
    }

    /// Consume up to and including `delimiter`. `None` if the input ends first.
    fn take_delimited(&mut self, delimiter: char) -> Option<&'a str> {
        let start = self.offset();
        for (i, c) in self.chars.by_ref() {
            if c == delimiter {
                return Some(&self.input[start..i]);
            }
        }
        None
    }

    fn next_token(&mut self) -> Token {
        let Some((start, c)) = self.chars.next() else {
            return Token::new(TokenKind::Eof).at(self.input.len(), 0);
        };

        let token = match c {
            ' ' | '\t' | '\n' | '\r' => {
                self.take_while(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
                Token::new(TokenKind::Whitespace)
            }
            '(' => Token::new(TokenKind::LParen),
            ')' => Token::new(TokenKind::RParen),
            ',' => Token::new(TokenKind::Comma),
            '@' => Token::new(TokenKind::Hotkey),
            '&' => Token::new(TokenKind::And),
            '|' => Token::new(TokenKind::Or),
            '!' => Token::new(TokenKind::Not),
            '+' => Token::new(TokenKind::Add),
            '-' => Token::new(TokenKind::Sub),
            '*' => Token::new(TokenKind::Mul),
            '%' => Token::new(TokenKind::Mod),
            '=' => Token::new(TokenKind::Assign),
            '<' => Token::new(TokenKind::LessThan),
            '>' => Token::new(TokenKind::GreaterThan),
            '^' => Token::new(TokenKind::Xor),
            '/' => {
                if matches!(self.chars.peek(), Some((_, '*'))) {
                    self.chars.next();
                    self.comment()
                } else {
                    Token::new(TokenKind::Div)
                }
            }
            '\'' => match self.take_delimited('\'') {
                Some(text) => Token::with_data(TokenKind::Literal, text),
                None => Token::new(TokenKind::Invalid),
            },
            '`' => match self.take_delimited('`') {
                Some(text) => Token::with_data(TokenKind::Control, text),
                None => Token::new(TokenKind::Invalid),
            },
            '$' => {
                let name = self.take_while(is_word_char);
                if name.is_empty() {
                    Token::new(TokenKind::Invalid)
                } else {
                    Token::with_data(TokenKind::Variable, name)
                }
            }
            c if c.is_ascii_digit() => {
                let rest = self.take_while(|c| c.is_ascii_digit() || c == '.');
                let text = &self.input[start..start + c.len_utf8() + rest.len()];
                if regex!(r"^\d+(\.\d+)?$").is_match(text) {
                    Token::with_data(TokenKind::Literal, text)
                } else {
                    Token::new(TokenKind::Invalid)
                }
            }
            c if is_word_char(c) => {
                let rest = self.take_while(is_word_char);
                let text = &self.input[start..start + c.len_utf8() + rest.len()];
                Token::with_data(TokenKind::Bareword, text)
            }
            _ => Token::new(TokenKind::Invalid),
        };

        let end = self.offset();
        token.at(start, end - start)
    }

    /// Body of a `/* ... */` comment; the opening `/*` is already consumed.
    fn comment(&mut self) -> Token {
        let start = self.offset();
        let mut previous = '\0';
        for (i, c) in self.chars.by_ref() {
            if previous == '*' && c == '/' {
                return Token::with_data(TokenKind::Comment, &self.input[start..i - 1]);
            }
            previous = c;
        }
        Token::new(TokenKind::Invalid)
    }
}
