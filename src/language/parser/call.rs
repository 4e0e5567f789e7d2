use super::Parser;
use crate::language::{
    ast::{CallArg, Expr, ExprKind, Resolved, Unresolved},
    errors::MessageKind,
    lexer::TokenSource,
    span::Span,
    symbols::Function,
    token::TokenKind,
    types::TypeId,
};
use std::rc::Rc;

/// Argument as written at the call site.
struct Argument {
    name: Option<(String, Span)>,
    value: Resolved<Expr>,
}

impl Argument {
    fn ty(&self) -> Option<TypeId> {
        self.value.as_ref().ok().and_then(Expr::ty)
    }
}

/// Parameter slot for every parameter of a candidate, holding the index of the argument bound
/// to it.
type Slots = Vec<Option<usize>>;

impl<S: TokenSource> Parser<'_, S> {
    /// Parses `name(args)` and resolves it against the overloads of `name`. When several
    /// overloads accept the arguments, those returning one of the `hints` are preferred.
    pub(crate) fn parse_call(&mut self, hints: Option<&[TypeId]>) -> Resolved<Expr> {
        let name_token = self.advance();
        let name = name_token.kind.to_string();
        let name_span = name_token.span;

        self.expect(TokenKind::LParen);
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) && !self.is_eof() {
            args.push(self.parse_argument());
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        let span = self.span_from(name_span);

        let candidates: Vec<Rc<Function>> = self.symbols.lookup_functions(&name).to_vec();
        if candidates.is_empty() {
            self.report(MessageKind::FunctionNotFound { name }, name_span);
            return Err(Unresolved::default());
        }

        let mut preferred = Vec::new();
        let mut others = Vec::new();
        for function in candidates {
            let Some(binding) = self.bind_arguments(&function, &args) else {
                continue;
            };
            let returns_hint = match (function.ret, hints) {
                (Some(ret), Some(hints)) => hints.contains(&ret),
                _ => false,
            };
            if returns_hint {
                preferred.push((function, binding));
            } else {
                others.push((function, binding));
            }
        }
        tracing::trace!(
            %name,
            preferred = preferred.len(),
            others = others.len(),
            "overload resolution"
        );

        let chosen = if preferred.len() > 1 {
            Err(MessageKind::FunctionAmbiguity {
                count: preferred.len(),
            })
        } else if let Some(chosen) = preferred.pop() {
            Ok(chosen)
        } else if others.len() > 1 {
            Err(MessageKind::FunctionAmbiguity {
                count: others.len(),
            })
        } else {
            others.pop().ok_or(MessageKind::NoFunctionMatch)
        };
        let (function, binding) = match chosen {
            Ok(chosen) => chosen,
            Err(kind) => {
                self.report(kind, name_span);
                return Err(Unresolved::default());
            }
        };
        if args.iter().any(|arg| arg.value.is_err()) {
            return Err(Unresolved::default());
        }

        let mut values: Vec<Option<Argument>> = args.into_iter().map(Some).collect();
        let mut call_args = Vec::with_capacity(binding.len());
        for (position, slot) in binding.into_iter().enumerate() {
            let argument = slot.and_then(|index| values.get_mut(index).and_then(Option::take));
            call_args.push(match argument {
                Some(Argument { name, value }) => CallArg::Given {
                    name: name.map(|(name, _)| name),
                    value: value?,
                },
                None => CallArg::Omitted { position },
            });
        }

        Ok(Expr::new(
            ExprKind::Call {
                function,
                args: call_args,
            },
            span,
        ))
    }

    fn parse_argument(&mut self) -> Argument {
        let mut name = None;
        if let TokenKind::Identifier(ident) = self.peek().clone() {
            if *self.tokens.peek2() == TokenKind::Eq {
                let span = self.advance().span;
                self.advance();
                name = Some((ident, span));
            }
        }
        let value = self.parse_expression(None);
        Argument { name, value }
    }

    /// Maps `args` onto the parameters of `function`. Positional arguments fill the parameter
    /// after the last one bound; named ones may bind anywhere and move that cursor. Parameters
    /// left unbound need a default or the unit type.
    fn bind_arguments(&mut self, function: &Function, args: &[Argument]) -> Option<Slots> {
        let params = &function.params;
        let mut binding: Slots = vec![None; params.len()];
        let mut next = 0;

        for (index, arg) in args.iter().enumerate() {
            let ty = arg.ty();
            match &arg.name {
                None => {
                    let param = params.get(next)?;
                    if param.ty != ty || binding[next].is_some() {
                        return None;
                    }
                    binding[next] = Some(index);
                    next += 1;
                }
                Some((name, span)) => {
                    let mut bound = false;
                    for (position, param) in params.iter().enumerate() {
                        if param.name.as_deref() != Some(name.as_str()) || param.ty != ty {
                            continue;
                        }
                        if binding[position].is_some() {
                            let name = name.clone();
                            self.report(MessageKind::ParamAlreadyMatched { name }, *span);
                            continue;
                        }
                        binding[position] = Some(index);
                        next = position + 1;
                        bound = true;
                        break;
                    }
                    if !bound {
                        return None;
                    }
                }
            }
        }

        let complete = binding
            .iter()
            .zip(params)
            .all(|(slot, param)| slot.is_some() || param.is_optional());
        complete.then_some(binding)
    }
}
