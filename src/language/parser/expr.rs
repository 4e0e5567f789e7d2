use super::Parser;
use crate::language::{
    ast::{Expr, ExprKind, Literal, LiteralValue, Resolved, Unresolved},
    errors::MessageKind,
    lexer::TokenSource,
    span::{Span, Spanned},
    token::{NumberLiteral, TokenKind},
    types::{Operator, TypeId},
};

/// Left and right binding power of binary operators.
const INFIX_BP: (u8, u8) = (3, 4);
/// Assignment is right associative.
const ASSIGN_BP: (u8, u8) = (2, 1);
const CAST_BP: u8 = 5;
const POSTFIX_BP: u8 = 6;
/// Operand of a prefix operator binds tighter than any infix operator.
const PREFIX_OPERAND_BP: u8 = 4;

fn unresolved() -> Unresolved {
    Unresolved { assignable: false }
}

impl<S: TokenSource> Parser<'_, S> {
    pub(crate) fn parse_expression(&mut self, hints: Option<&[TypeId]>) -> Resolved<Expr> {
        self.parse_expr_bp(hints, 0)
    }

    fn parse_expr_bp(&mut self, hints: Option<&[TypeId]>, min_bp: u8) -> Resolved<Expr> {
        let mut left = self.parse_left(hints);
        loop {
            left = match left {
                Err(invalid) => match self.skip_operation(invalid, min_bp) {
                    Some(next) => Err(next),
                    None => break,
                },
                Ok(expr) => match expr.ty() {
                    Some(ty) => match self.parse_operation(expr, ty, min_bp) {
                        Step::Continue(next) => next,
                        Step::Done(expr) => return Ok(expr),
                    },
                    None => {
                        let continues = matches!(
                            self.peek(),
                            TokenKind::Operator(_) | TokenKind::Eq | TokenKind::As
                        );
                        if !continues {
                            return Ok(expr);
                        }
                        Err(Unresolved {
                            assignable: expr.as_variable().is_some(),
                        })
                    }
                },
            };
        }
        left
    }

    /// Consumes the operator following a resolved operand. Returns the operand untouched when
    /// the next token does not bind tightly enough.
    fn parse_operation(&mut self, left: Expr, ty: TypeId, min_bp: u8) -> Step {
        match self.peek().clone() {
            TokenKind::As => {
                if CAST_BP < min_bp {
                    return Step::Done(left);
                }
                self.advance();
                Step::Continue(self.parse_cast(left, ty))
            }
            TokenKind::Eq => {
                if ASSIGN_BP.0 < min_bp {
                    return Step::Done(left);
                }
                let eq_span = self.advance().span;
                Step::Continue(self.parse_assign(left, ty, eq_span))
            }
            TokenKind::Operator(name) => {
                let op_span = self.peek_span();
                if let Some(op) = self.types.lookup_postfix(ty, &name).copied() {
                    if POSTFIX_BP < min_bp {
                        return Step::Done(left);
                    }
                    self.advance();
                    let span = left.span.union(op_span);
                    let operand = Box::new(left);
                    return Step::Continue(Ok(Expr::new(ExprKind::Unary { op, operand }, span)));
                }

                let candidates: Vec<Operator> = self
                    .types
                    .lookup_infix_candidates(ty, &name)
                    .into_iter()
                    .copied()
                    .collect();
                if candidates.is_empty() {
                    self.report(
                        MessageKind::NoOperator {
                            ty: self.type_name(Some(ty)),
                            op: name,
                        },
                        op_span,
                    );
                    return Step::Continue(Err(unresolved()));
                }
                if INFIX_BP.0 < min_bp {
                    return Step::Done(left);
                }
                self.advance();
                Step::Continue(self.parse_binary(left, ty, &name, op_span, &candidates))
            }
            _ => Step::Done(left),
        }
    }

    fn parse_binary(
        &mut self,
        left: Expr,
        ty: TypeId,
        name: &str,
        op_span: Span,
        candidates: &[Operator],
    ) -> Resolved<Expr> {
        let seconds: Vec<TypeId> = candidates.iter().map(|op| op.second).collect();
        let right = self
            .parse_expr_bp(Some(&seconds), INFIX_BP.1)
            .map_err(|_| unresolved())?;
        let right_ty = right.ty().ok_or_else(unresolved)?;

        let Some(op) = candidates.iter().find(|op| op.second == right_ty).copied() else {
            self.report(
                MessageKind::InfixOperatorNotFound {
                    op: name.to_string(),
                    left: self.type_name(Some(ty)),
                    right: self.type_name(Some(right_ty)),
                },
                op_span,
            );
            return Err(unresolved());
        };
        let span = left.span.union(right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_cast(&mut self, expr: Expr, from: TypeId) -> Resolved<Expr> {
        let target = self.parse_type().ok_or_else(unresolved)?;
        let Some(to) = target.ty else {
            self.report(MessageKind::TypeAnnotation, target.span);
            return Err(unresolved());
        };
        let span = expr.span.union(target.span);
        let Some(op) = self.types.lookup_conversion(from, to).copied() else {
            self.report(
                MessageKind::NoConversion {
                    from: self.type_name(Some(from)),
                    to: self.type_name(Some(to)),
                },
                span,
            );
            return Err(unresolved());
        };
        Ok(Expr::new(
            ExprKind::Cast {
                expr: Box::new(expr),
                target,
                op,
            },
            span,
        ))
    }

    fn parse_assign(&mut self, target: Expr, ty: TypeId, eq_span: Span) -> Resolved<Expr> {
        let value = match self.parse_expr_bp(Some(&[ty]), ASSIGN_BP.1) {
            Ok(value) => value,
            Err(_) => {
                if target.as_variable().is_none() {
                    self.report(MessageKind::InvalidLeftAssign, eq_span);
                }
                return Err(unresolved());
            }
        };

        let mut valid = true;
        match value.ty() {
            Some(found) if found != ty => {
                self.report(
                    MessageKind::TypeMismatch {
                        expected: self.type_name(Some(ty)),
                        found: self.type_name(Some(found)),
                    },
                    value.span,
                );
                valid = false;
            }
            Some(_) => {}
            None => valid = false,
        }
        match target.as_variable() {
            None => {
                self.report(MessageKind::InvalidLeftAssign, eq_span);
                valid = false;
            }
            Some(var) if !var.mutable => {
                let name = var.name.clone();
                self.report(MessageKind::AssignImmutable { name }, eq_span);
                valid = false;
            }
            Some(_) => {}
        }
        if !valid {
            return Err(unresolved());
        }

        let span = target.span.union(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    /// Skips the operator following an operand that already failed, parsing the rest of the
    /// operation only for its diagnostics. `None` stops the expression.
    fn skip_operation(&mut self, left: Unresolved, min_bp: u8) -> Option<Unresolved> {
        match self.peek() {
            TokenKind::Operator(_) => {
                if !self.tokens.peek2().may_follow_operator() {
                    self.advance();
                    return Some(unresolved());
                }
                if INFIX_BP.0 < min_bp {
                    return None;
                }
                self.advance();
                let _ = self.parse_expr_bp(None, INFIX_BP.1);
            }
            TokenKind::Eq => {
                if ASSIGN_BP.0 < min_bp {
                    return None;
                }
                let eq_span = self.advance().span;
                let _ = self.parse_expr_bp(None, ASSIGN_BP.1);
                if !left.assignable {
                    self.report(MessageKind::InvalidLeftAssign, eq_span);
                }
            }
            TokenKind::As => {
                if CAST_BP < min_bp {
                    return None;
                }
                self.advance();
                let _ = self.parse_type();
            }
            _ => return None,
        }
        Some(unresolved())
    }

    fn parse_left(&mut self, hints: Option<&[TypeId]>) -> Resolved<Expr> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                if *self.tokens.peek2() == TokenKind::LParen {
                    return self.parse_call(hints);
                }
                self.advance();
                self.parse_variable(name, span)
            }
            TokenKind::Number(literal) => {
                self.advance();
                Ok(self.parse_literal(&literal, span, hints))
            }
            TokenKind::Bool(value) => {
                self.advance();
                let literal = Literal {
                    value: LiteralValue::Bool(value),
                    ty: TypeId::BOOL,
                };
                Ok(Expr::new(ExprKind::Literal(literal), span))
            }
            TokenKind::Operator(name) => {
                self.advance();
                self.parse_prefix(&name, span)
            }
            TokenKind::Return | TokenKind::Break => Ok(self.parse_jump()),
            TokenKind::LParen => self.parse_grouped(hints),
            TokenKind::At | TokenKind::LBrace => {
                let block = self.parse_block(None, hints, None, true);
                let span = block.span;
                Ok(Expr::new(ExprKind::Block(block), span))
            }
            TokenKind::While => self.parse_while(),
            TokenKind::Loop => Ok(self.parse_loop(hints)),
            TokenKind::If => self.parse_if(None, hints),
            other => {
                self.report(
                    MessageKind::ExpectedExpression {
                        found: other.describe(),
                    },
                    span,
                );
                if !matches!(other, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof) {
                    self.advance();
                }
                Err(unresolved())
            }
        }
    }

    fn parse_variable(&mut self, name: String, span: Span) -> Resolved<Expr> {
        let assignable = Unresolved { assignable: true };
        let Some(var) = self.symbols.lookup_variable(&name) else {
            self.report(MessageKind::VariableNotFound { name }, span);
            return Err(assignable);
        };
        // declared, but its type never resolved
        if var.ty.is_none() {
            return Err(assignable);
        }
        Ok(Expr::new(ExprKind::Variable(var), span))
    }

    fn parse_prefix(&mut self, name: &str, op_span: Span) -> Resolved<Expr> {
        let operand = self
            .parse_expr_bp(None, PREFIX_OPERAND_BP)
            .map_err(|_| unresolved())?;
        let ty = operand.ty().ok_or_else(unresolved)?;
        let Some(op) = self.types.lookup_prefix(ty, name).copied() else {
            self.report(
                MessageKind::NoOperator {
                    ty: self.type_name(Some(ty)),
                    op: name.to_string(),
                },
                op_span,
            );
            return Err(unresolved());
        };
        let span = op_span.union(operand.span());
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_grouped(&mut self, hints: Option<&[TypeId]>) -> Resolved<Expr> {
        let start = self.advance().span;
        if self.matches(TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Grouped(None), self.span_from(start)));
        }
        let inner = self.parse_expression(hints);
        self.expect(TokenKind::RParen);
        let inner = inner?;
        Ok(Expr::new(
            ExprKind::Grouped(Some(Box::new(inner))),
            self.span_from(start),
        ))
    }

    /// Types a numeric literal from its suffix, then from the hints, then by default.
    fn parse_literal(
        &mut self,
        literal: &NumberLiteral,
        span: Span,
        hints: Option<&[TypeId]>,
    ) -> Expr {
        let suffixed = match &literal.suffix {
            Some(suffix) => self.suffix_type(literal, suffix, span),
            None => None,
        };
        let ty = suffixed
            .or_else(|| {
                hints.unwrap_or(&[]).iter().copied().find(|ty| {
                    let kind = self.types.kind(*ty);
                    kind.is_float() || (kind.is_integer() && !literal.is_float())
                })
            })
            .unwrap_or(if literal.is_float() {
                TypeId::F64
            } else {
                TypeId::I32
            });

        let value = if self.types.kind(ty).is_float() {
            LiteralValue::Float(literal.as_float())
        } else {
            LiteralValue::Int(literal.as_int())
        };
        Expr::new(ExprKind::Literal(Literal { value, ty }), span)
    }

    fn suffix_type(&mut self, literal: &NumberLiteral, suffix: &str, span: Span) -> Option<TypeId> {
        let accepted = self.symbols.lookup_type(suffix).filter(|ty| {
            let kind = self.types.kind(*ty);
            kind.is_float() || (kind.is_integer() && !literal.is_float())
        });
        if accepted.is_none() {
            let suffix = suffix.to_string();
            let kind = if literal.is_float() {
                MessageKind::FloatSuffix { suffix }
            } else {
                MessageKind::IntSuffix { suffix }
            };
            self.report(kind, span);
        }
        accepted
    }
}

enum Step {
    Continue(Resolved<Expr>),
    Done(Expr),
}
