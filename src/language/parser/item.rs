use super::Parser;
use crate::language::{
    ast::{Binding, Expr, ExprKind, FunctionItem, Item, Resolved, TypeAnnotation},
    errors::MessageKind,
    lexer::TokenSource,
    span::Spanned,
    symbols::{Function, Param, Variable, VariableKind},
    token::TokenKind,
    types::TypeId,
};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BindingKind {
    Let,
    Const,
    Static,
}

/// Type and value a declaration ends up with.
struct Initialized {
    ty: Option<TypeId>,
    value: Option<Expr>,
    no_return: bool,
}

impl<S: TokenSource> Parser<'_, S> {
    /// Parses one item, skipping anything that cannot start one. `None` only at end of input.
    pub(crate) fn parse_item(&mut self) -> Option<Item> {
        let mut reported = false;
        loop {
            match self.peek() {
                TokenKind::Fn => return Some(Item::Function(self.parse_function())),
                TokenKind::Const => return Some(Item::Const(self.parse_binding(BindingKind::Const))),
                TokenKind::Static => {
                    return Some(Item::Static(self.parse_binding(BindingKind::Static)))
                }
                TokenKind::Eof => return None,
                _ => {
                    if !reported {
                        let span = self.peek_span();
                        self.report(MessageKind::InvalidItem, span);
                        reported = true;
                    }
                    self.advance();
                }
            }
        }
    }

    pub(crate) fn parse_local(&mut self) -> Binding {
        self.parse_binding(BindingKind::Let)
    }

    fn parse_binding(&mut self, kind: BindingKind) -> Binding {
        let start = self.advance().span;
        let pattern = self.parse_pattern();
        if kind == BindingKind::Const && pattern.is_mutable() {
            self.report(MessageKind::ConstMut, pattern.span());
        }

        let mut annotation = None;
        let init = if self.matches(TokenKind::Colon) {
            let declared = self.parse_type();
            let init = self.parse_annotated_initializer(declared.as_ref());
            annotation = declared;
            init
        } else {
            self.expect(TokenKind::Eq);
            self.parse_inferred_initializer()
        };

        if kind == BindingKind::Const && !init.no_return {
            if let Some(value) = &init.value {
                if !matches!(value.kind, ExprKind::Literal(_)) {
                    self.report(MessageKind::ConstInitializer, value.span);
                }
            }
        }
        self.expect(TokenKind::Semi);

        let var = pattern.name().map(|name| {
            let (mutable, var_kind) = match kind {
                BindingKind::Const => (false, VariableKind::Const),
                BindingKind::Static => (pattern.is_mutable(), VariableKind::Static),
                BindingKind::Let => (pattern.is_mutable(), VariableKind::Local),
            };
            Variable::new(name, init.ty, mutable, var_kind)
        });
        if let Some(var) = &var {
            // redefinition in the same scope shadows
            let declared = self.symbols.declare_variable(Rc::clone(var), true);
            debug_assert!(declared.is_ok(), "shadowing declaration rejected: {declared:?}");
        }

        Binding {
            pattern,
            ty: annotation,
            value: init.value,
            var,
            span: self.span_from(start),
        }
    }

    /// Initializer after `: type`. An unresolved annotation falls back to the value's type.
    fn parse_annotated_initializer(&mut self, declared: Option<&TypeAnnotation>) -> Initialized {
        let Some(declared) = declared else {
            self.skip_until(|kind| *kind == TokenKind::Eq);
            self.expect(TokenKind::Eq);
            let ty = self.parse_expression(None).ok().and_then(|expr| expr.ty());
            return Initialized {
                ty,
                value: None,
                no_return: false,
            };
        };

        match declared.ty {
            Some(TypeId::NEVER) => {
                self.report(MessageKind::NoReturnAssignment, declared.span);
                self.expect(TokenKind::Eq);
                let _ = self.parse_expression(None);
                Initialized {
                    ty: None,
                    value: None,
                    no_return: true,
                }
            }
            None => {
                self.expect(TokenKind::Eq);
                let value = self.parse_expression(None).ok();
                Initialized {
                    ty: value.as_ref().and_then(Expr::ty),
                    value,
                    no_return: false,
                }
            }
            Some(ty) => {
                self.expect(TokenKind::Eq);
                let value = self.parse_expression(Some(&[ty])).ok();
                self.check_value_type(ty, value.as_ref());
                Initialized {
                    ty: Some(ty),
                    value,
                    no_return: false,
                }
            }
        }
    }

    fn parse_inferred_initializer(&mut self) -> Initialized {
        let value = self.parse_expression(None).ok();
        let ty = value.as_ref().and_then(Expr::ty);
        if ty == Some(TypeId::NEVER) {
            let span = value.as_ref().map(|value| value.span).unwrap_or(self.last_span);
            self.report(MessageKind::NoReturnAssignment, span);
            return Initialized {
                ty: None,
                value,
                no_return: true,
            };
        }
        Initialized {
            ty,
            value,
            no_return: false,
        }
    }

    fn check_value_type(&mut self, expected: TypeId, value: Option<&Expr>) {
        let Some(value) = value else {
            return;
        };
        if let Some(found) = value.ty().filter(|found| *found != expected) {
            self.report(
                MessageKind::TypeMismatch {
                    expected: self.type_name(Some(expected)),
                    found: self.type_name(Some(found)),
                },
                value.span,
            );
        }
    }

    /// Optional `= default` after a parameter type.
    fn parse_default(&mut self, hints: Option<&[TypeId]>) -> Option<Resolved<Expr>> {
        if self.matches(TokenKind::Eq) {
            Some(self.parse_expression(hints))
        } else {
            None
        }
    }

    /// Default of a parameter whose type comes from the default itself.
    fn parse_inferred_default(&mut self) -> (Option<TypeId>, Option<Expr>) {
        let default = self.parse_default(None).and_then(Result::ok);
        match default.as_ref().and_then(Expr::ty) {
            Some(TypeId::NEVER) => {
                let span = default.as_ref().map_or(self.last_span, |expr| expr.span);
                self.report(MessageKind::NoReturnAssignment, span);
                (None, default)
            }
            ty => (ty, default),
        }
    }

    fn parse_param(&mut self, position: usize) -> Param {
        let pattern = self.parse_pattern();
        self.expect(TokenKind::Colon);

        let (ty, default) = match self.parse_type() {
            None => {
                self.skip_until(|kind| {
                    matches!(kind, TokenKind::Eq | TokenKind::Comma | TokenKind::RParen)
                });
                self.parse_inferred_default()
            }
            Some(declared) => match declared.ty {
                Some(TypeId::NEVER) => {
                    self.report(MessageKind::NoReturnAssignment, declared.span);
                    let default = self.parse_default(None).and_then(Result::ok);
                    (None, default)
                }
                None => {
                    self.report(MessageKind::FunctionParamType, declared.span);
                    self.parse_inferred_default()
                }
                Some(ty) => {
                    let default = self.parse_default(Some(&[ty])).and_then(Result::ok);
                    self.check_value_type(ty, default.as_ref());
                    (Some(ty), default)
                }
            },
        };

        let mutable = pattern.is_mutable();
        let var = match pattern.name() {
            Some(name) => {
                let var = Variable::new(name, ty, mutable, VariableKind::Param { position });
                match self.symbols.declare_variable(Rc::clone(&var), false) {
                    Ok(()) => Some(var),
                    Err(_) => {
                        let name = name.to_string();
                        self.report(MessageKind::ParamRedefinition { name }, pattern.span());
                        None
                    }
                }
            }
            None => None,
        };

        Param {
            name: pattern.name().map(str::to_string),
            ty,
            mutable,
            default,
            var,
        }
    }

    /// Declares the function before its body is parsed, so the body may call it.
    fn parse_function(&mut self) -> FunctionItem {
        if self.symbols.level() > 0 {
            let span = self.peek_span();
            self.report(MessageKind::FunctionInsideBlock, span);
        }
        let start = self.peek_span();
        self.expect(TokenKind::Fn);

        let name_span = self.peek_span();
        let name = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            other => {
                self.report(
                    MessageKind::UnexpectedToken {
                        expected: "name-id",
                        found: other.describe(),
                    },
                    name_span,
                );
                String::new()
            }
        };

        self.expect(TokenKind::LParen);
        self.symbols.enter_scope();
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) && !self.is_eof() {
            params.push(self.parse_param(params.len()));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen);

        let (ret_type, ret) = if self.matches(TokenKind::Colon) {
            let ret_type = self.parse_type();
            let ret = ret_type.as_ref().and_then(|annotation| annotation.ty);
            (ret_type, ret)
        } else if self.check(TokenKind::LBrace) || self.check(TokenKind::At) {
            (None, Some(TypeId::EMPTY))
        } else {
            (None, None)
        };

        let function = Rc::new(Function { name, params, ret });
        match self.symbols.declare_function(Rc::clone(&function)) {
            Ok(()) => {
                if function.name == "main" {
                    self.has_main = true;
                }
            }
            Err(_) => self.report(MessageKind::DuplicateFunction, name_span),
        }
        tracing::debug!(name = %function.name, params = function.params.len(), "declared function");

        let body = self.parse_block(ret, None, Some(function.name.clone()), true);
        let left = self.symbols.leave_scope().map(|scope| scope.level);
        debug_assert!(left.is_ok(), "unbalanced parameter scope: {left:?}");

        FunctionItem {
            function,
            ret_type,
            span: start.union(body.span),
            body,
        }
    }
}
