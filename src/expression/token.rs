//! Tokens produced by the lexer.

/// Token classification.
///
/// Whitespace and comments are real tokens so an editor can highlight them;
/// they are stripped before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Whitespace,
    Comment,
    Invalid,

    LParen,
    RParen,
    Comma,
    /// `@`, introduces a hotkey.
    Hotkey,

    Not,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Assign,
    LessThan,
    GreaterThan,
    Xor,

    /// Numeric literal, bare (`1.5`) or legacy quoted (`'1.5'`).
    Literal,
    /// `$name`.
    Variable,
    /// `` `Device:Control` ``.
    Control,
    /// Word characters: a function name or a short-form control name.
    Bareword,
}

impl TokenKind {
    pub fn is_binary_operator(self) -> bool {
        matches!(
            self,
            TokenKind::And
                | TokenKind::Or
                | TokenKind::Add
                | TokenKind::Sub
                | TokenKind::Mul
                | TokenKind::Div
                | TokenKind::Mod
                | TokenKind::Assign
                | TokenKind::LessThan
                | TokenKind::GreaterThan
                | TokenKind::Comma
                | TokenKind::Xor
        )
    }

    /// Tokens that carry no meaning for the parser.
    pub fn is_inert(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// One lexed token.
///
/// `position` and `length` are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Payload: literal text, variable or control name. Empty for punctuation.
    pub data: String,
    pub position: usize,
    pub length: usize,
}

impl Token {
    pub fn new(kind: TokenKind) -> Self {
        Self { kind, data: String::new(), position: 0, length: 0 }
    }

    pub fn with_data(kind: TokenKind, data: impl Into<String>) -> Self {
        Self { kind, data: data.into(), position: 0, length: 0 }
    }

    pub(crate) fn at(mut self, position: usize, length: usize) -> Self {
        self.position = position;
        self.length = length;
        self
    }
}
