mod block;
mod call;
mod expr;
mod item;

#[cfg(test)]
mod tests;

use crate::language::{
    ast::{File, Label, Pattern, TypeAnnotation, TypeAnnotationKind},
    errors::{Diagnostics, MessageKind},
    lexer::{Lexer, TokenSource},
    span::Span,
    symbols::SymbolTable,
    token::{Token, TokenKind},
    types::{TypeId, TypeRegistry},
};

/// Everything the front end produces for one source file.
#[derive(Debug)]
pub struct Unit {
    pub file: File,
    pub globals: SymbolTable,
    pub diagnostics: Diagnostics,
}

impl Unit {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn parse_source(source: &str, types: &TypeRegistry) -> Unit {
    Parser::new(Lexer::new(source), types).parse_file()
}

pub struct Parser<'r, S: TokenSource> {
    tokens: S,
    types: &'r TypeRegistry,
    symbols: SymbolTable,
    diagnostics: Diagnostics,
    has_main: bool,
    last_span: Span,
}

impl<'r, S: TokenSource> Parser<'r, S> {
    pub fn new(tokens: S, types: &'r TypeRegistry) -> Self {
        Self {
            tokens,
            types,
            symbols: SymbolTable::new(types),
            diagnostics: Diagnostics::new(),
            has_main: false,
            last_span: Span::default(),
        }
    }

    pub fn parse_file(mut self) -> Unit {
        let mut file = File::default();
        while !self.is_eof() {
            if let Some(item) = self.parse_item() {
                file.items.push(item);
            }
        }
        self.sync_lexer();

        if !self.has_main {
            self.report(MessageKind::MissingMain, Span::point(0));
        }
        tracing::debug!(
            items = file.items.len(),
            diagnostics = self.diagnostics.len(),
            "parsed file"
        );

        Unit {
            file,
            globals: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    fn sync_lexer(&mut self) {
        let lexed = self.tokens.take_diagnostics();
        self.diagnostics.extend(lexed);
    }

    fn peek(&mut self) -> &TokenKind {
        self.tokens.peek()
    }

    fn peek_span(&mut self) -> Span {
        self.tokens.peek_token().span
    }

    fn peek_describe(&mut self) -> &'static str {
        self.tokens.peek().describe()
    }

    fn check(&mut self, kind: TokenKind) -> bool {
        *self.tokens.peek() == kind
    }

    fn is_eof(&mut self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.next_token();
        self.sync_lexer();
        self.last_span = token.span;
        token
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `kind` or reports what was found instead. The offending token stays in place.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.check(kind.clone()) {
            self.advance();
            return true;
        }
        let span = self.peek_span();
        let found = self.peek_describe();
        self.report(
            MessageKind::UnexpectedToken {
                expected: kind.describe(),
                found,
            },
            span,
        );
        false
    }

    /// Skips tokens until `stop` holds for the next one or the input ends.
    fn skip_until(&mut self, stop: impl Fn(&TokenKind) -> bool) {
        while !self.is_eof() && !stop(self.peek()) {
            self.advance();
        }
    }

    fn report(&mut self, kind: MessageKind, span: Span) {
        self.diagnostics.report(kind, span);
    }

    fn type_name(&self, ty: Option<TypeId>) -> String {
        self.types.describe(ty)
    }

    fn span_from(&self, start: Span) -> Span {
        start.union(self.last_span)
    }

    pub(crate) fn parse_pattern(&mut self) -> Pattern {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Underscore => {
                self.advance();
                return Pattern::Wildcard(span);
            }
            TokenKind::Identifier(name) => {
                self.advance();
                return Pattern::Identifier {
                    name,
                    mutable: false,
                    span,
                };
            }
            TokenKind::Mut => {
                self.advance();
                if let TokenKind::Identifier(name) = self.peek().clone() {
                    self.advance();
                    return Pattern::Identifier {
                        name,
                        mutable: true,
                        span: self.span_from(span),
                    };
                }
            }
            _ => {}
        }

        let here = self.peek_span();
        self.report(MessageKind::InvalidPattern, here);
        self.skip_until(|kind| {
            matches!(
                kind,
                TokenKind::Semi
                    | TokenKind::Eq
                    | TokenKind::Colon
                    | TokenKind::Comma
                    | TokenKind::RParen
            )
        });
        Pattern::Wildcard(here)
    }

    /// Parses a type annotation. `None` means the type could not be resolved and has been reported.
    pub(crate) fn parse_type(&mut self) -> Option<TypeAnnotation> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) | TokenKind::Operator(name) => {
                self.advance();
                match self.symbols.lookup_type(&name) {
                    Some(ty) => Some(TypeAnnotation {
                        kind: TypeAnnotationKind::Named(name),
                        ty: Some(ty),
                        span,
                    }),
                    None => {
                        self.report(MessageKind::UnknownType { name }, span);
                        None
                    }
                }
            }
            TokenKind::Underscore => {
                self.advance();
                Some(TypeAnnotation {
                    kind: TypeAnnotationKind::Inferred,
                    ty: None,
                    span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.matches(TokenKind::RParen) {
                    return Some(TypeAnnotation {
                        kind: TypeAnnotationKind::Empty,
                        ty: Some(TypeId::EMPTY),
                        span: self.span_from(span),
                    });
                }
                let inner = self.parse_type();
                // a missing `)` does not invalidate the type
                self.expect(TokenKind::RParen);
                inner.map(|inner| TypeAnnotation {
                    ty: inner.ty,
                    kind: TypeAnnotationKind::Paren(Box::new(inner)),
                    span: self.span_from(span),
                })
            }
            other => {
                self.report(
                    MessageKind::ExpectedType {
                        found: other.describe(),
                    },
                    span,
                );
                None
            }
        }
    }

    /// `@name:` in front of a block.
    pub(crate) fn parse_label_declaration(&mut self) -> Option<Label> {
        self.expect(TokenKind::At);
        let mut label = None;
        if let TokenKind::Identifier(name) = self.peek().clone() {
            let span = self.peek_span();
            self.advance();
            label = Some(Label { name, span });
            if self.matches(TokenKind::Colon) {
                return label;
            }
        } else {
            let span = self.peek_span();
            self.report(MessageKind::LabelDeclName, span);
            if self.matches(TokenKind::Colon) {
                return None;
            }
        }

        let span = self.peek_span();
        self.report(MessageKind::LabelDeclColon, span);
        self.skip_until(|kind| matches!(kind, TokenKind::Colon | TokenKind::LBrace));
        self.matches(TokenKind::Colon);
        label
    }

    /// `@name` after `break` or `return`. Keywords naming implicit blocks are accepted.
    pub(crate) fn parse_label_ref(&mut self) -> Option<Label> {
        self.expect(TokenKind::At);
        let span = self.peek_span();
        let name = match self.peek() {
            TokenKind::Identifier(name) => name.clone(),
            kind @ (TokenKind::Loop | TokenKind::While | TokenKind::If | TokenKind::Else) => {
                kind.describe().to_string()
            }
            _ => {
                self.report(MessageKind::LabelRefName, span);
                if !self.is_eof() {
                    self.advance();
                }
                return None;
            }
        };
        self.advance();
        Some(Label { name, span })
    }
}
