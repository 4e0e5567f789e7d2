use crate::language::span::{Span, Spanned};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl Spanned for Token {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Eof,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    At,
    Underscore,
    Eq,

    Number(NumberLiteral),
    Bool(bool),

    As,
    Break,
    Const,
    Else,
    Fn,
    If,
    Let,
    Loop,
    Mut,
    Return,
    Static,
    While,

    Identifier(String),
    Operator(String),
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "as" => TokenKind::As,
            "break" => TokenKind::Break,
            "const" => TokenKind::Const,
            "else" => TokenKind::Else,
            "fn" => TokenKind::Fn,
            "if" => TokenKind::If,
            "let" => TokenKind::Let,
            "loop" => TokenKind::Loop,
            "mut" => TokenKind::Mut,
            "return" => TokenKind::Return,
            "static" => TokenKind::Static,
            "while" => TokenKind::While,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => return None,
        };
        Some(kind)
    }

    /// Name used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of file",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::At => "@",
            TokenKind::Underscore => "_",
            TokenKind::Eq => "=",
            TokenKind::Number(_) => "numeric literal",
            TokenKind::Bool(_) => "boolean literal",
            TokenKind::As => "as",
            TokenKind::Break => "break",
            TokenKind::Const => "const",
            TokenKind::Else => "else",
            TokenKind::Fn => "fn",
            TokenKind::If => "if",
            TokenKind::Let => "let",
            TokenKind::Loop => "loop",
            TokenKind::Mut => "mut",
            TokenKind::Return => "return",
            TokenKind::Static => "static",
            TokenKind::While => "while",
            TokenKind::Identifier(_) => "name-id",
            TokenKind::Operator(_) => "operator",
        }
    }

    /// Tokens that may begin an expression in statement position.
    pub fn starts_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::Number(_)
                | TokenKind::Bool(_)
                | TokenKind::Identifier(_)
                | TokenKind::Operator(_)
                | TokenKind::Break
                | TokenKind::Return
                | TokenKind::Loop
                | TokenKind::While
        )
    }

    /// Wider set used while skipping through an already-invalid expression: anything that could
    /// continue or begin an operand after an operator.
    pub fn may_follow_operator(&self) -> bool {
        self.starts_expression() || matches!(self, TokenKind::If | TokenKind::Eq | TokenKind::As)
    }

    pub fn is_item_start(&self) -> bool {
        matches!(self, TokenKind::Fn | TokenKind::Const | TokenKind::Static)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) | TokenKind::Operator(name) => write!(f, "{name}"),
            other => write!(f, "{}", other.describe()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumberLiteral {
    pub value: NumberValue,
    pub suffix: Option<String>,
}

impl NumberLiteral {
    pub fn is_float(&self) -> bool {
        matches!(self.value, NumberValue::Float(_))
    }

    pub fn as_int(&self) -> u64 {
        match self.value {
            NumberValue::Int(value) => value,
            NumberValue::Float(value) => value as u64,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self.value {
            NumberValue::Int(value) => value as f64,
            NumberValue::Float(value) => value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberValue {
    Int(u64),
    Float(f64),
}
