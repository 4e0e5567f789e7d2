use crate::language::{
    errors::{Diagnostic, MessageKind},
    span::Span,
    token::{NumberLiteral, NumberValue, Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{multispace1, not_line_ending, satisfy},
    combinator::recognize,
    sequence::{pair, preceded},
    IResult, Parser as NomParser,
};
use std::collections::VecDeque;

/// Token stream consumed by the parser. At most two tokens are ever buffered.
pub trait TokenSource {
    fn next_token(&mut self) -> Token;
    fn peek_token(&mut self) -> &Token;
    fn peek2(&mut self) -> &TokenKind;
    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;

    fn peek(&mut self) -> &TokenKind {
        &self.peek_token().kind
    }
}

const OPERATOR_CHARS: &str = "!%^&*-+=:@~#|\\<>?/";

fn is_operator_char(ch: char) -> bool {
    OPERATOR_CHARS.contains(ch)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|ch| ch == '_' || ch.is_ascii_alphabetic()),
        take_while(|ch: char| ch == '_' || ch.is_ascii_alphanumeric()),
    ))
    .parse(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(preceded(tag("//"), not_line_ending)).parse(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    let (rest, _) = tag("/*").parse(input)?;
    match take_until::<_, _, nom::error::Error<&str>>("*/").parse(rest) {
        Ok((rest, _)) => {
            let (rest, _) = tag("*/").parse(rest)?;
            Ok((rest, &input[..input.len() - rest.len()]))
        }
        // unterminated: swallow the rest of the input
        Err(_) => Ok(("", input)),
    }
}

fn trivia(input: &str) -> IResult<&str, &str> {
    alt((multispace1, line_comment, block_comment)).parse(input)
}

/// Maximal run of operator characters, stopping in front of a comment opener.
fn operator_run(input: &str) -> IResult<&str, &str> {
    let mut end = 0;
    let mut chars = input.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if !is_operator_char(ch) {
            break;
        }
        if ch == '/' && matches!(chars.peek(), Some((_, '/')) | Some((_, '*'))) {
            break;
        }
        end = idx + ch.len_utf8();
    }
    if end == 0 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeWhile1,
        )));
    }
    Ok((&input[end..], &input[..end]))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Radix {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

impl Radix {
    fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Radix::Binary => "binary",
            Radix::Octal => "octal",
            Radix::Decimal => "decimal",
            Radix::Hexadecimal => "hexadecimal",
        }
    }

    fn digit(self, ch: char) -> Option<u32> {
        ch.to_digit(self.base())
    }

    /// Decimal digits that cannot belong to this base. Letters are left for the suffix.
    fn rejects(self, ch: char) -> bool {
        match self {
            Radix::Binary => ('2'..='9').contains(&ch),
            Radix::Octal => ch == '8' || ch == '9',
            Radix::Decimal | Radix::Hexadecimal => false,
        }
    }
}

pub struct Lexer<'src> {
    src: &'src str,
    offset: usize,
    lookahead: VecDeque<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            offset: 0,
            lookahead: VecDeque::with_capacity(2),
            diagnostics: Vec::new(),
        }
    }

    fn rest(&self) -> &'src str {
        &self.src[self.offset..]
    }

    fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.offset += ch.len_utf8();
        Some(ch)
    }

    fn advance_to(&mut self, rest: &'src str) -> Span {
        let start = self.offset;
        self.offset = self.src.len() - rest.len();
        Span::new(start, self.offset)
    }

    fn error(&mut self, kind: MessageKind, span: Span) {
        self.diagnostics.push(Diagnostic::new(kind, span));
    }

    fn fill(&mut self, count: usize) {
        while self.lookahead.len() < count {
            let token = self.scan();
            self.lookahead.push_back(token);
        }
    }

    fn skip_trivia(&mut self) {
        while let Ok((rest, _)) = trivia(self.rest()) {
            self.advance_to(rest);
        }
    }

    fn scan(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let start = self.offset;
            let Some(ch) = self.current() else {
                return Token::new(TokenKind::Eof, Span::point(self.src.len()));
            };

            let single = match ch {
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                '[' => Some(TokenKind::LBracket),
                ']' => Some(TokenKind::RBracket),
                '{' => Some(TokenKind::LBrace),
                '}' => Some(TokenKind::RBrace),
                ',' => Some(TokenKind::Comma),
                ';' => Some(TokenKind::Semi),
                _ => None,
            };
            if let Some(kind) = single {
                self.bump();
                return Token::new(kind, Span::new(start, self.offset));
            }

            if ch.is_ascii_digit() {
                return self.lex_number();
            }

            if let Ok((rest, word)) = identifier(self.rest()) {
                let span = self.advance_to(rest);
                let kind = if word == "_" {
                    TokenKind::Underscore
                } else {
                    TokenKind::keyword(word)
                        .unwrap_or_else(|| TokenKind::Identifier(word.to_string()))
                };
                return Token::new(kind, span);
            }

            if let Ok((rest, run)) = operator_run(self.rest()) {
                let span = self.advance_to(rest);
                let kind = match run {
                    "=" => TokenKind::Eq,
                    ":" => TokenKind::Colon,
                    "@" => TokenKind::At,
                    other => TokenKind::Operator(other.to_string()),
                };
                return Token::new(kind, span);
            }

            self.bump();
            self.error(MessageKind::UnknownToken, Span::new(start, self.offset));
        }
    }

    fn digits(&mut self, radix: Radix, mut visit: impl FnMut(u32)) {
        while let Some(ch) = self.current() {
            if let Some(value) = radix.digit(ch) {
                visit(value);
            } else if ch == '\'' {
                // separator
            } else if radix.rejects(ch) {
                let at = self.offset;
                self.error(
                    MessageKind::InvalidDigit {
                        digit: ch,
                        base: radix.name(),
                    },
                    Span::new(at, at + 1),
                );
            } else {
                break;
            }
            self.bump();
        }
    }

    fn lex_number(&mut self) -> Token {
        let start = self.offset;
        let mut radix = Radix::Decimal;
        let rest = self.rest();
        if rest.starts_with('0') {
            radix = match rest.as_bytes().get(1) {
                Some(b'b') => Radix::Binary,
                Some(b'o') => Radix::Octal,
                Some(b'x') => Radix::Hexadecimal,
                _ => Radix::Decimal,
            };
            if radix != Radix::Decimal {
                self.offset += 2;
            }
        }

        let base = radix.base();
        let mut int_value: u64 = 0;
        self.digits(radix, |digit| {
            int_value = int_value
                .wrapping_mul(u64::from(base))
                .wrapping_add(u64::from(digit));
        });

        let value = if matches!(self.current(), Some('.' | 'e' | 'E')) {
            let mut float_value = int_value as f64;
            let mut exponent: i64 = 0;
            if self.current() == Some('.') {
                self.bump();
                self.digits(radix, |digit| {
                    float_value = float_value * f64::from(base) + f64::from(digit);
                    exponent -= 1;
                });
            }
            if matches!(self.current(), Some('e' | 'E')) {
                self.bump();
                let sign = match self.current() {
                    Some('+') => {
                        self.bump();
                        1
                    }
                    Some('-') => {
                        self.bump();
                        -1
                    }
                    _ => 1,
                };
                let mut magnitude: i64 = 0;
                self.digits(radix, |digit| {
                    magnitude = magnitude
                        .saturating_mul(i64::from(base))
                        .saturating_add(i64::from(digit));
                });
                exponent = exponent.saturating_add(magnitude.saturating_mul(sign));
            }
            NumberValue::Float(scale_by_power(float_value, f64::from(base), exponent))
        } else {
            NumberValue::Int(int_value)
        };

        while self.current() == Some('_') {
            self.bump();
        }
        let suffix_start = self.offset;
        while matches!(self.current(), Some(ch) if ch.is_ascii_alphanumeric()) {
            self.bump();
        }
        let suffix = (self.offset > suffix_start)
            .then(|| self.src[suffix_start..self.offset].to_string());

        Token::new(
            TokenKind::Number(NumberLiteral { value, suffix }),
            Span::new(start, self.offset),
        )
    }
}

impl TokenSource for Lexer<'_> {
    fn next_token(&mut self) -> Token {
        self.fill(1);
        let token = self
            .lookahead
            .pop_front()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, Span::point(self.src.len())));
        tracing::trace!(kind = %token.kind, start = token.span.start, "token");
        token
    }

    fn peek_token(&mut self) -> &Token {
        self.fill(1);
        &self.lookahead[0]
    }

    fn peek2(&mut self) -> &TokenKind {
        self.fill(2);
        &self.lookahead[1].kind
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Computes `value * base^exponent`, stopping early once the result is zero or infinite.
fn scale_by_power(mut value: f64, base: f64, mut exponent: i64) -> f64 {
    const CHUNK: i64 = 16;
    while exponent != 0 && value != 0.0 && value.is_finite() {
        let step = exponent.clamp(-CHUNK, CHUNK);
        let factor = base.powi(step.unsigned_abs() as i32);
        if step > 0 {
            value *= factor;
        } else {
            value /= factor;
        }
        exponent -= step;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    fn number(src: &str) -> NumberLiteral {
        match kinds(src).into_iter().next() {
            Some(TokenKind::Number(lit)) => lit,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn lexes_keywords_and_operators() {
        let tokens = kinds("fn main() { let mut x: i32 = -1 << 2; }");
        assert_eq!(tokens[0], TokenKind::Fn);
        assert_eq!(tokens[1], TokenKind::Identifier("main".into()));
        assert!(tokens.contains(&TokenKind::Let));
        assert!(tokens.contains(&TokenKind::Mut));
        assert!(tokens.contains(&TokenKind::Colon));
        assert!(tokens.contains(&TokenKind::Eq));
        assert!(tokens.contains(&TokenKind::Operator("-".into())));
        assert!(tokens.contains(&TokenKind::Operator("<<".into())));
    }

    #[test]
    fn operator_runs_are_maximal() {
        assert_eq!(
            kinds("a==b @x: c:=d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("==".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::At,
                TokenKind::Identifier("x".into()),
                TokenKind::Colon,
                TokenKind::Identifier("c".into()),
                TokenKind::Operator(":=".into()),
                TokenKind::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n+/* two */2 /* open"),
            vec![
                TokenKind::Number(NumberLiteral {
                    value: NumberValue::Int(1),
                    suffix: None
                }),
                TokenKind::Operator("+".into()),
                TokenKind::Number(NumberLiteral {
                    value: NumberValue::Int(2),
                    suffix: None
                }),
            ]
        );
    }

    #[test]
    fn numbers_carry_base_and_suffix() {
        assert_eq!(number("0x1F").as_int(), 31);
        assert_eq!(number("0b1010").as_int(), 10);
        assert_eq!(number("1'000'000").as_int(), 1_000_000);
        let suffixed = number("42u8");
        assert_eq!(suffixed.as_int(), 42);
        assert_eq!(suffixed.suffix.as_deref(), Some("u8"));
        let float = number("1.5__f32");
        assert!(float.is_float());
        assert_eq!(float.as_float(), 1.5);
        assert_eq!(float.suffix.as_deref(), Some("f32"));
        assert_eq!(number("25e-1").as_float(), 2.5);
    }

    #[test]
    fn huge_exponents_saturate() {
        assert_eq!(number("1e999999999999").as_float(), f64::INFINITY);
        assert_eq!(number("1e-999999999999").as_float(), 0.0);
        assert_eq!(number("1e99999999999999999999999").as_float(), f64::INFINITY);
        assert_eq!(number("0e999999999999").as_float(), 0.0);
        assert_eq!(number("0.3").as_float(), 0.3);
        assert_eq!(number("12.5e2").as_float(), 1250.0);
    }

    #[test]
    fn invalid_digits_are_reported() {
        let mut lexer = Lexer::new("0b102");
        let token = lexer.next_token();
        assert!(matches!(token.kind, TokenKind::Number(ref lit) if lit.as_int() == 2));
        let diagnostics = lexer.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0].kind,
            MessageKind::InvalidDigit { digit: '2', base: "binary" }
        ));
    }

    #[test]
    fn unknown_characters_are_skipped() {
        let mut lexer = Lexer::new("$ x");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("x".into()));
        assert!(matches!(
            lexer.take_diagnostics().as_slice(),
            [Diagnostic { kind: MessageKind::UnknownToken, .. }]
        ));
    }

    #[test]
    fn lookahead_does_not_consume() {
        let mut lexer = Lexer::new("f(1)");
        assert_eq!(lexer.peek(), &TokenKind::Identifier("f".into()));
        assert_eq!(lexer.peek2(), &TokenKind::LParen);
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("f".into()));
        assert_eq!(lexer.next_token().kind, TokenKind::LParen);
        assert_eq!(lexer.peek_token().span, Span::new(2, 3));
    }
}
