use super::Parser;
use crate::language::{
    ast::{
        BlockExpr, ElseBranch, Expr, ExprKind, IfExpr, Jump, JumpTarget, Label, Resolved, Stmt,
        Unresolved,
    },
    errors::MessageKind,
    lexer::TokenSource,
    span::Span,
    symbols::Block,
    token::TokenKind,
    types::TypeId,
};

/// Result of parsing one statement slot inside a block.
enum Statement {
    Stmt(Stmt),
    /// Expression without a trailing `;`, a candidate for the block's value.
    Tail(Expr),
    Skipped,
}

/// Where the statements of a block stop falling through.
#[derive(Default)]
struct Flow {
    /// First statement that unconditionally jumps.
    return_pos: Option<usize>,
    /// Some jump leaves through an enclosing block.
    not_return: bool,
    /// Some jump leaves this block with a value.
    return_value: bool,
}

impl Flow {
    fn record(&mut self, target: Option<JumpTarget>, index: usize, level: usize) {
        let Some(target) = target else {
            return;
        };
        if !self.not_return && !self.return_value {
            self.return_pos = Some(index);
        }
        if target.level < level && !self.return_value {
            self.not_return = true;
        } else if !self.not_return {
            self.return_value = true;
        }
    }
}

fn with_type(types: &[TypeId], extra: Option<TypeId>) -> Vec<TypeId> {
    let mut types = types.to_vec();
    if let Some(extra) = extra {
        if !types.contains(&extra) {
            types.push(extra);
        }
    }
    types
}

impl<S: TokenSource> Parser<'_, S> {
    /// Parses `[@label:] { stmts [tail] }` in a fresh scope and settles the block's type.
    ///
    /// `must` is the type the block has to produce, if already known. `possible` narrows the
    /// candidates when it is still open. Only `is_final` blocks may produce a value through a
    /// trailing expression; loop bodies produce values through `break` alone.
    pub(crate) fn parse_block(
        &mut self,
        must: Option<TypeId>,
        possible: Option<&[TypeId]>,
        alt_name: Option<String>,
        is_final: bool,
    ) -> BlockExpr {
        let start = self.peek_span();
        let label = if self.check(TokenKind::At) {
            self.parse_label_declaration()
        } else {
            None
        };

        self.symbols.enter_scope();
        let level = self.symbols.level();
        let hints = match possible {
            Some(types) => Some(with_type(types, must)),
            None => must.map(|ty| vec![ty]),
        };
        let block_possible = possible.map(|types| with_type(types, must));
        let label_name = label.as_ref().map(|label| label.name.clone());
        let id = self
            .symbols
            .associate_block(label_name, alt_name, block_possible, must);
        tracing::trace!(block = %id, level, "parse block");

        self.expect(TokenKind::LBrace);

        let mut stmts = Vec::new();
        let mut tail = None;
        let mut flow = Flow::default();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            match self.parse_statement(hints.as_deref()) {
                Statement::Skipped => {}
                Statement::Stmt(stmt) => {
                    flow.record(stmt.return_target(), stmts.len(), level);
                    stmts.push(stmt);
                }
                Statement::Tail(expr) => {
                    flow.record(expr.return_target(), stmts.len(), level);
                    if self.check(TokenKind::RBrace) || self.is_eof() {
                        tail = Some(expr);
                        break;
                    }
                    let span = self.peek_span();
                    let found = self.peek_describe();
                    self.report(
                        MessageKind::UnexpectedToken {
                            expected: TokenKind::Semi.describe(),
                            found,
                        },
                        span,
                    );
                    stmts.push(Stmt::Expr(expr));
                }
            }
        }
        self.expect(TokenKind::RBrace);
        let span = self.span_from(start);

        self.check_block(&mut stmts, &mut tail, flow, is_final, span);

        let info = self
            .symbols
            .leave_scope()
            .ok()
            .and_then(|scope| scope.block)
            .unwrap_or_else(|| unreachable!("block scope entered above"));
        BlockExpr {
            label,
            info,
            stmts,
            tail: tail.map(Box::new),
            span,
        }
    }

    fn check_block(
        &mut self,
        stmts: &mut Vec<Stmt>,
        tail: &mut Option<Expr>,
        flow: Flow,
        is_final: bool,
        span: Span,
    ) {
        let mut must = self
            .symbols
            .current_block_mut()
            .and_then(|block| block.must_return);

        match tail.as_ref() {
            Some(expr) if expr.return_target().is_none() => {
                if !is_final {
                    self.report(MessageKind::ExpressionNotAllowed, expr.span);
                }
                match (must, expr.ty()) {
                    (Some(expected), Some(found)) if expected != found => {
                        self.report(
                            MessageKind::ReturnTypeMismatch {
                                found: self.type_name(Some(found)),
                                expected: self.type_name(Some(expected)),
                            },
                            expr.span,
                        );
                    }
                    (None, found) => must = found,
                    _ => {}
                }
            }
            Some(_) => {}
            None if flow.return_value || flow.not_return => {}
            None => match must {
                Some(expected) if is_final && expected != TypeId::EMPTY => {
                    self.report(
                        MessageKind::BlockReturnEmpty {
                            found: self.type_name(Some(TypeId::EMPTY)),
                            expected: self.type_name(Some(expected)),
                        },
                        span,
                    );
                }
                Some(_) => {}
                None if is_final => must = Some(TypeId::EMPTY),
                None => must = Some(TypeId::NEVER),
            },
        }

        // statements after an unconditional jump never run
        let mut last_is_jump = false;
        if let Some(pos) = flow.return_pos {
            if pos < stmts.len() && (flow.return_value || flow.not_return) {
                stmts.truncate(pos + 1);
                *tail = None;
                last_is_jump = true;
            }
        }

        if let Some(block) = self.symbols.current_block_mut() {
            block.must_return = must;
            block.not_return = flow.not_return;
            block.last_is_jump = last_is_jump;
        }
    }

    fn parse_statement(&mut self, hints: Option<&[TypeId]>) -> Statement {
        loop {
            match self.peek() {
                TokenKind::Let => return Statement::Stmt(Stmt::Local(self.parse_local())),
                TokenKind::Semi => {
                    self.advance();
                    if self.check(TokenKind::RBrace) || self.is_eof() {
                        return Statement::Skipped;
                    }
                }
                TokenKind::Fn | TokenKind::Const | TokenKind::Static => {
                    return match self.parse_item() {
                        Some(item) => Statement::Stmt(Stmt::Item(item)),
                        None => Statement::Skipped,
                    };
                }
                _ => return self.parse_expression_statement(hints),
            }
        }
    }

    fn parse_expression_statement(&mut self, hints: Option<&[TypeId]>) -> Statement {
        let expr = match self.parse_expression(hints) {
            Ok(expr) => expr,
            Err(_) => {
                self.matches(TokenKind::Semi);
                return Statement::Skipped;
            }
        };

        if expr.is_block_like() {
            return match expr.ty() {
                Some(TypeId::EMPTY) | Some(TypeId::NEVER) => Statement::Stmt(Stmt::Expr(expr)),
                _ => Statement::Tail(expr),
            };
        }
        if self.matches(TokenKind::Semi) {
            Statement::Stmt(Stmt::Expr(expr))
        } else {
            Statement::Tail(expr)
        }
    }

    fn parse_condition(&mut self) -> Resolved<Expr> {
        let condition = self.parse_expression(Some(&[TypeId::BOOL]))?;
        match condition.ty() {
            Some(TypeId::BOOL) => Ok(condition),
            found => {
                self.report(
                    MessageKind::TypeMismatch {
                        expected: self.type_name(Some(TypeId::BOOL)),
                        found: self.type_name(found),
                    },
                    condition.span,
                );
                Err(Unresolved::default())
            }
        }
    }

    pub(crate) fn parse_if(
        &mut self,
        must: Option<TypeId>,
        hints: Option<&[TypeId]>,
    ) -> Resolved<Expr> {
        let if_expr = self.parse_if_chain(must, hints)?;
        let span = if_expr.if_span.union(self.last_span);
        Ok(Expr::new(ExprKind::If(if_expr), span))
    }

    fn parse_if_chain(
        &mut self,
        must: Option<TypeId>,
        hints: Option<&[TypeId]>,
    ) -> Resolved<IfExpr> {
        let if_span = self.advance().span;
        let condition = self.parse_condition();
        let then_block = self.parse_block(must, hints, Some("if".to_string()), true);
        let if_ret = then_block.ty(true);

        let mut valid = true;
        let else_branch = if self.matches(TokenKind::Else) {
            if self.check(TokenKind::If) {
                match self.parse_if_chain(if_ret, None) {
                    Ok(nested) => Some(ElseBranch::If(nested)),
                    Err(_) => {
                        valid = false;
                        None
                    }
                }
            } else {
                let block = self.parse_block(if_ret, None, Some("else".to_string()), true);
                Some(ElseBranch::Block(block))
            }
        } else {
            if let Some(ty) = if_ret.filter(|ty| *ty != TypeId::EMPTY) {
                let ty = self.type_name(Some(ty));
                self.report(MessageKind::IncompleteIf { ty }, if_span);
                valid = false;
            }
            None
        };

        let condition = condition?;
        if !valid {
            return Err(Unresolved::default());
        }
        Ok(IfExpr {
            condition: Box::new(condition),
            then_block,
            else_branch: else_branch.map(Box::new),
            if_span,
        })
    }

    pub(crate) fn parse_while(&mut self) -> Resolved<Expr> {
        let start = self.advance().span;
        let condition = self.parse_condition();
        let body = self.parse_block(
            Some(TypeId::EMPTY),
            None,
            Some("while".to_string()),
            false,
        );
        let condition = condition?;
        Ok(Expr::new(
            ExprKind::While {
                condition: Box::new(condition),
                body,
            },
            self.span_from(start),
        ))
    }

    pub(crate) fn parse_loop(&mut self, hints: Option<&[TypeId]>) -> Expr {
        let start = self.advance().span;
        let body = self.parse_block(None, hints, Some("loop".to_string()), false);
        Expr::new(ExprKind::Loop { body }, self.span_from(start))
    }

    /// Block a jump leaves: `break` picks the innermost match, `return` the outermost.
    fn jump_block_mut(&mut self, is_break: bool, label: Option<&str>) -> Option<&mut Block> {
        if is_break {
            self.symbols.innermost_block_mut(label)
        } else {
            self.symbols.outermost_block_mut(label)
        }
    }

    /// Parses `break` or `return` with an optional label and value. Jumps always type as `!`,
    /// even when their target cannot be found.
    pub(crate) fn parse_jump(&mut self) -> Expr {
        let keyword = self.advance();
        let is_break = keyword.kind == TokenKind::Break;
        let label = if self.check(TokenKind::At) {
            self.parse_label_ref()
        } else {
            None
        };
        let label_name = label.as_ref().map(|label| label.name.clone());

        let found = self
            .jump_block_mut(is_break, label_name.as_deref())
            .map(|block| (JumpTarget { block: block.id, level: block.level }, block.hints()));

        let Some((target, hints)) = found else {
            match &label {
                Some(label) => {
                    let name = label.name.clone();
                    self.report(MessageKind::LabelNotFound { name }, label.span);
                }
                None if is_break => self.report(MessageKind::BreakOutsideBlock, keyword.span),
                None => self.report(MessageKind::ReturnOutsideBlock, keyword.span),
            }
            if self.peek().starts_expression() {
                let _ = self.parse_expression(None);
            }
            return self.jump_expr(is_break, label, None, None, keyword.span);
        };

        let value = if self.peek().starts_expression() {
            Some(self.parse_expression(hints.as_deref()))
        } else {
            None
        };
        let ret = match &value {
            None => Some(TypeId::EMPTY),
            Some(Ok(expr)) => expr.ty(),
            Some(Err(_)) => None,
        };

        if let Some(ret) = ret {
            let span = self.span_from(keyword.span);
            let previous = self
                .jump_block_mut(is_break, label_name.as_deref())
                .and_then(|block| {
                    let previous = block.must_return;
                    if previous.is_none() {
                        block.must_return = Some(ret);
                    }
                    previous
                });
            if let Some(expected) = previous.filter(|expected| *expected != ret) {
                self.report(
                    MessageKind::ReturnTypeMismatch {
                        found: self.type_name(Some(ret)),
                        expected: self.type_name(Some(expected)),
                    },
                    span,
                );
            }
        }

        let value = value.and_then(Result::ok);
        self.jump_expr(is_break, label, Some(target), value, keyword.span)
    }

    fn jump_expr(
        &mut self,
        is_break: bool,
        label: Option<Label>,
        target: Option<JumpTarget>,
        value: Option<Expr>,
        start: Span,
    ) -> Expr {
        let jump = Jump {
            label,
            target,
            value: value.map(Box::new),
        };
        let kind = if is_break {
            ExprKind::Break(jump)
        } else {
            ExprKind::Return(jump)
        };
        Expr::new(kind, self.span_from(start))
    }
}
