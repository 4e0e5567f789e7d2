use super::{parse_source, Unit};
use crate::language::{
    ast::{Binding, BlockExpr, CallArg, ExprKind, Item, LiteralValue, Stmt},
    errors::MessageKind,
    types::{OpAction, TypeId, TypeRegistry},
};

fn parse(src: &str) -> Unit {
    parse_source(src, &TypeRegistry::builtin())
}

fn kinds(src: &str) -> Vec<MessageKind> {
    parse(src)
        .diagnostics
        .into_vec()
        .into_iter()
        .map(|diag| diag.kind)
        .collect()
}

fn assert_clean(src: &str) -> Unit {
    let unit = parse(src);
    assert!(
        unit.is_clean(),
        "unexpected diagnostics: {:?}",
        unit.diagnostics.kinds()
    );
    unit
}

fn body<'a>(unit: &'a Unit, name: &str) -> &'a BlockExpr {
    unit.file
        .items
        .iter()
        .find_map(|item| match item {
            Item::Function(function) if function.function.name == name => Some(&function.body),
            _ => None,
        })
        .unwrap_or_else(|| panic!("function {name} not found"))
}

fn local(block: &BlockExpr, index: usize) -> &Binding {
    match &block.stmts[index] {
        Stmt::Local(binding) => binding,
        other => panic!("expected a let statement, found {other:?}"),
    }
}

fn mismatch(expected: &str, found: &str) -> MessageKind {
    MessageKind::TypeMismatch {
        expected: expected.into(),
        found: found.into(),
    }
}

#[test]
fn resolves_a_clean_program() {
    let unit = assert_clean(
        "fn add(a: i32, b: i32): i32 { a + b }
         fn main() {
             let x = add(1, 2);
             let mut y: i64 = 0;
             y = x as i64;
         }",
    );
    assert_eq!(unit.file.items.len(), 2);
    assert_eq!(unit.globals.lookup_functions("add").len(), 1);

    let add = body(&unit, "add");
    assert_eq!(add.info.must_return, Some(TypeId::I32));
    let tail = add.tail.as_ref().expect("a + b is the tail");
    assert!(matches!(
        &tail.kind,
        ExprKind::Binary { op, .. } if op.action == OpAction::Add
    ));

    let main = body(&unit, "main");
    assert_eq!(main.ty(false), Some(TypeId::EMPTY));
    assert_eq!(local(main, 0).var.as_ref().and_then(|var| var.ty), Some(TypeId::I32));
    let Stmt::Expr(assign) = &main.stmts[2] else {
        panic!("expected an assignment statement");
    };
    let ExprKind::Assign { value, .. } = &assign.kind else {
        panic!("expected an assignment");
    };
    assert!(matches!(
        &value.kind,
        ExprKind::Cast { op, .. } if op.action == OpAction::SIntToSInt
    ));
}

#[test]
fn reports_missing_main() {
    assert_eq!(kinds("fn helper() {}"), vec![MessageKind::MissingMain]);
}

#[test]
fn literals_follow_suffix_then_hint_then_default() {
    let unit = parse(
        "fn main() {
             let a = 42;
             let b: f64 = 42;
             let c = 42u8;
             let d = 2.5;
             let e = 2.5u8;
             let f = 7zz;
         }",
    );
    assert_eq!(
        unit.diagnostics.kinds(),
        vec![
            &MessageKind::FloatSuffix { suffix: "u8".into() },
            &MessageKind::IntSuffix { suffix: "zz".into() },
        ]
    );

    let main = body(&unit, "main");
    let literal = |index: usize| match local(main, index).value.as_ref().map(|expr| &expr.kind) {
        Some(ExprKind::Literal(literal)) => *literal,
        other => panic!("expected a literal, found {other:?}"),
    };
    assert_eq!(literal(0).ty, TypeId::I32);
    assert_eq!(literal(1).ty, TypeId::F64);
    assert_eq!(literal(1).value, LiteralValue::Float(42.0));
    assert_eq!(literal(2).ty, TypeId::U8);
    assert_eq!(literal(3).ty, TypeId::F64);
    assert_eq!(literal(4).ty, TypeId::F64);
    assert_eq!(literal(5).ty, TypeId::I32);
}

#[test]
fn declared_type_must_match_initializer() {
    assert_eq!(
        kinds("fn main() { let x: bool = 1; }"),
        vec![mismatch("bool", "i32")]
    );
}

#[test]
fn operator_lookup_failures() {
    assert_eq!(
        kinds("fn main() { let x = 1 + true; }"),
        vec![MessageKind::InfixOperatorNotFound {
            op: "+".into(),
            left: "i32".into(),
            right: "bool".into(),
        }]
    );
    assert_eq!(
        kinds("fn main() { let b = true; let c = b + b; }"),
        vec![MessageKind::NoOperator {
            ty: "bool".into(),
            op: "+".into(),
        }]
    );
    assert_eq!(
        kinds("fn main() { let a = -5; let b = !true; let c = -true; }"),
        vec![MessageKind::NoOperator {
            ty: "bool".into(),
            op: "-".into(),
        }]
    );
}

#[test]
fn precedence_is_flat_and_left_associative() {
    let unit = assert_clean("fn main() { let x = 1 + 2 * 3; let y = -1 as i64; }");
    let main = body(&unit, "main");

    // (1 + 2) * 3
    let value = local(main, 0).value.as_ref().expect("value");
    let ExprKind::Binary { op, left, .. } = &value.kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(op.action, OpAction::Mul);
    assert!(matches!(&left.kind, ExprKind::Binary { op, .. } if op.action == OpAction::Add));

    // -(1 as i64)
    let value = local(main, 1).value.as_ref().expect("value");
    let ExprKind::Unary { op, operand } = &value.kind else {
        panic!("expected a unary expression");
    };
    assert_eq!(op.ret, TypeId::I64);
    assert!(matches!(&operand.kind, ExprKind::Cast { .. }));
}

#[test]
fn assignment_checks() {
    assert_eq!(
        kinds("fn main() { let x = 1; x = 2; }"),
        vec![MessageKind::AssignImmutable { name: "x".into() }]
    );
    assert_eq!(
        kinds("fn main() { 1 = 2; }"),
        vec![MessageKind::InvalidLeftAssign]
    );
    // the unknown variable is reported once; the assignment itself is not
    assert_eq!(
        kinds("fn main() { y = 2; }"),
        vec![MessageKind::VariableNotFound { name: "y".into() }]
    );
    assert_eq!(
        kinds("fn main() { let mut x = 1; x = true; }"),
        vec![mismatch("i32", "bool")]
    );
}

#[test]
fn conversions() {
    assert_clean("fn main() { let b = true as f32; let c = 3.7 as u8; }");
    assert_eq!(
        kinds("fn main() { let u = 1 as (); }"),
        vec![MessageKind::NoConversion {
            from: "i32".into(),
            to: "()".into(),
        }]
    );
    assert_eq!(
        kinds("fn main() { let u = 1 as _; }"),
        vec![MessageKind::TypeAnnotation]
    );
    assert_eq!(
        kinds("fn main() { let u: foo = 1; }"),
        vec![MessageKind::UnknownType { name: "foo".into() }]
    );
}

#[test]
fn overloads_prefer_hinted_return_type() {
    let src = "fn pick(): i32 { 1 }
               fn pick(): f64 { 1.0 }
               fn main() { let a: f64 = pick(); let b = pick(); }";
    assert_eq!(kinds(src), vec![MessageKind::FunctionAmbiguity { count: 2 }]);

    let unit = parse(src);
    let main = body(&unit, "main");
    let value = local(main, 0).value.as_ref().expect("value");
    assert!(matches!(
        &value.kind,
        ExprKind::Call { function, .. } if function.ret == Some(TypeId::F64)
    ));
}

#[test]
fn several_hinted_overloads_are_ambiguous() {
    let src = "fn f(x: i32): i32 { x }
               fn f(x: i32, y: i32 = 0): i32 { x + y }
               fn f(x: i32): i64 { 0 }";
    assert_clean(&format!("{src} fn main() {{ let a: i64 = f(1); }}"));
    assert_eq!(
        kinds(&format!("{src} fn main() {{ let a: i32 = f(1); }}")),
        vec![MessageKind::FunctionAmbiguity { count: 2 }]
    );
    assert_eq!(
        kinds(&format!("{src} fn main() {{ let a = f(1); }}")),
        vec![MessageKind::FunctionAmbiguity { count: 3 }]
    );
}

#[test]
fn overloads_match_on_argument_types() {
    let unit = assert_clean(
        "fn f(x: i32): i32 { x }
         fn f(x: f64): f64 { x }
         fn main() { let a = f(1); let b = f(1.0); }",
    );
    let main = body(&unit, "main");
    assert_eq!(local(main, 0).var.as_ref().and_then(|var| var.ty), Some(TypeId::I32));
    assert_eq!(local(main, 1).var.as_ref().and_then(|var| var.ty), Some(TypeId::F64));

    assert_eq!(
        kinds("fn f(x: i32) {} fn main() { f(true); }"),
        vec![MessageKind::NoFunctionMatch]
    );
    assert_eq!(
        kinds("fn main() { g(); }"),
        vec![MessageKind::FunctionNotFound { name: "g".into() }]
    );
}

#[test]
fn named_arguments_and_defaults() {
    let unit = assert_clean(
        "fn area(w: i32, h: i32 = 2): i32 { w * h }
         fn main() { let a = area(3); let b = area(h = 4, w = 5); }",
    );
    let main = body(&unit, "main");

    let value = local(main, 0).value.as_ref().expect("value");
    let ExprKind::Call { args, .. } = &value.kind else {
        panic!("expected a call");
    };
    assert!(matches!(args[1], CallArg::Omitted { position: 1 }));

    let value = local(main, 1).value.as_ref().expect("value");
    let ExprKind::Call { args, .. } = &value.kind else {
        panic!("expected a call");
    };
    let names: Vec<_> = args
        .iter()
        .map(|arg| match arg {
            CallArg::Given { name, .. } => name.clone(),
            CallArg::Omitted { .. } => None,
        })
        .collect();
    assert_eq!(names, vec![Some("w".to_string()), Some("h".to_string())]);

    assert_eq!(
        kinds(
            "fn area(w: i32, h: i32 = 2): i32 { w * h }
             fn main() { let a = area(w = 1, w = 2); }"
        ),
        vec![
            MessageKind::ParamAlreadyMatched { name: "w".into() },
            MessageKind::NoFunctionMatch,
        ]
    );
}

#[test]
fn loop_takes_type_of_break() {
    let unit = assert_clean("fn main() { let x = loop { break 5; }; let y: i32 = x; }");
    let main = body(&unit, "main");
    let Some(ExprKind::Loop { body }) = local(main, 0).value.as_ref().map(|expr| &expr.kind) else {
        panic!("expected a loop");
    };
    assert_eq!(body.info.must_return, Some(TypeId::I32));
    assert!(body.info.last_is_jump);
}

#[test]
fn labelled_break_leaves_outer_loop() {
    let unit = assert_clean(
        "fn main() {
             let v = loop @outer: {
                 loop { break @outer 1; }
             };
         }",
    );
    let main = body(&unit, "main");
    let Some(ExprKind::Loop { body: outer }) = local(main, 0).value.as_ref().map(|e| &e.kind) else {
        panic!("expected a loop");
    };
    assert_eq!(outer.label.as_ref().map(|label| label.name.as_str()), Some("outer"));
    assert_eq!(outer.ty(false), Some(TypeId::I32));

    let Stmt::Expr(inner) = &outer.stmts[0] else {
        panic!("expected the inner loop");
    };
    let ExprKind::Loop { body: inner } = &inner.kind else {
        panic!("expected the inner loop");
    };
    assert!(inner.info.not_return);
    assert_eq!(inner.ty(false), Some(TypeId::NEVER));
    assert_eq!(inner.return_target().map(|target| target.block), Some(outer.info.id));
}

#[test]
fn unlabelled_break_targets_the_enclosing_if_block() {
    let unit = assert_clean("fn main() { loop { if true { break; } } }");
    let main = body(&unit, "main");
    let Stmt::Expr(looped) = &main.stmts[0] else {
        panic!("expected the loop statement");
    };
    let ExprKind::Loop { body: loop_body } = &looped.kind else {
        panic!("expected a loop");
    };
    assert_eq!(loop_body.ty(false), Some(TypeId::NEVER));

    let Stmt::Expr(branch) = &loop_body.stmts[0] else {
        panic!("expected the if statement");
    };
    let ExprKind::If(if_expr) = &branch.kind else {
        panic!("expected an if");
    };
    let then_block = &if_expr.then_block;
    let Stmt::Expr(jump) = &then_block.stmts[0] else {
        panic!("expected the break");
    };
    let ExprKind::Break(jump) = &jump.kind else {
        panic!("expected a break");
    };
    assert_eq!(jump.target.map(|target| target.block), Some(then_block.info.id));
    assert_eq!(then_block.info.must_return, Some(TypeId::EMPTY));

    assert_eq!(
        kinds("fn main() { let x = loop @l: { if true { break 1; } break @l 2; }; }"),
        vec![MessageKind::IncompleteIf { ty: "i32".into() }]
    );
}

#[test]
fn label_errors() {
    assert_eq!(
        kinds("fn main() { loop { break @nope; } }"),
        vec![MessageKind::LabelNotFound { name: "nope".into() }]
    );
    assert_eq!(
        kinds("fn main() { loop { break @5; } }"),
        vec![MessageKind::LabelRefName]
    );
    assert_eq!(
        kinds("fn main() { @ : {} }"),
        vec![MessageKind::LabelDeclName]
    );
}

#[test]
fn return_reaches_function_body_through_nested_blocks() {
    let unit = assert_clean("fn f(): i32 { { { return 3; } } } fn main() {}");
    let f = body(&unit, "f");
    assert!(f.info.last_is_jump);
    assert!(!f.info.not_return);
    assert_eq!(f.return_target(), None);
}

#[test]
fn dead_statements_after_return_are_trimmed() {
    let unit = assert_clean("fn f(): i32 { return 1; 2 } fn main() {}");
    let f = body(&unit, "f");
    assert_eq!(f.stmts.len(), 1);
    assert!(f.tail.is_none());
    assert!(f.info.last_is_jump);
}

#[test]
fn if_chains_unify_or_report_incomplete() {
    let unit = assert_clean("fn f(c: bool): i32 { if c { 1 } else { 2 } } fn main() {}");
    let f = body(&unit, "f");
    assert_eq!(f.tail.as_ref().and_then(|tail| tail.ty()), Some(TypeId::I32));

    assert_eq!(
        kinds("fn main() { let x = if true { 1 }; }"),
        vec![MessageKind::IncompleteIf { ty: "i32".into() }]
    );
    assert_eq!(
        kinds("fn main() { if 1 {} }"),
        vec![mismatch("bool", "i32")]
    );
}

#[test]
fn block_value_checks() {
    assert_eq!(
        kinds("fn f(): i32 { } fn main() {}"),
        vec![MessageKind::BlockReturnEmpty {
            found: "()".into(),
            expected: "i32".into(),
        }]
    );
    assert_eq!(
        kinds("fn f(): i32 { true } fn main() {}"),
        vec![MessageKind::ReturnTypeMismatch {
            found: "bool".into(),
            expected: "i32".into(),
        }]
    );
    assert_eq!(
        kinds("fn main() { while true { 1 } }"),
        vec![
            MessageKind::ExpressionNotAllowed,
            MessageKind::ReturnTypeMismatch {
                found: "i32".into(),
                expected: "()".into(),
            },
        ]
    );
    assert_eq!(
        kinds("fn main() { let a = 1; a a; }"),
        vec![MessageKind::UnexpectedToken {
            expected: ";",
            found: "name-id",
        }]
    );
}

#[test]
fn shadowing_rebinds_in_the_same_block() {
    let unit = assert_clean("fn main() { let x = 1; let x = true; let y: bool = x; }");
    let main = body(&unit, "main");
    assert_eq!(local(main, 2).var.as_ref().and_then(|var| var.ty), Some(TypeId::BOOL));
}

#[test]
fn declaration_errors() {
    assert_eq!(
        kinds("fn f(a: i32, a: i32) {} fn main() {}"),
        vec![MessageKind::ParamRedefinition { name: "a".into() }]
    );
    assert_eq!(
        kinds("fn f(a: _) {} fn main() {}"),
        vec![MessageKind::FunctionParamType]
    );
    assert_eq!(
        kinds("fn f() {} fn f() {} fn main() {}"),
        vec![MessageKind::DuplicateFunction]
    );
    assert_eq!(
        kinds("const A: i32 = 1 + 2; fn main() {}"),
        vec![MessageKind::ConstInitializer]
    );
    assert_eq!(
        kinds("const mut B: i32 = 1; fn main() {}"),
        vec![MessageKind::ConstMut]
    );
    assert_eq!(
        kinds("let x = 1; fn main() {}"),
        vec![MessageKind::InvalidItem]
    );
    assert_eq!(
        kinds("fn main() { fn g() {} }"),
        vec![MessageKind::FunctionInsideBlock]
    );
    assert_eq!(
        kinds("fn main() { let x: ! = 1; }"),
        vec![MessageKind::NoReturnAssignment]
    );
    assert_eq!(
        kinds("fn main() { let 5 = 1; }"),
        vec![MessageKind::InvalidPattern]
    );
}

#[test]
fn globals_are_visible_in_functions() {
    let unit = assert_clean(
        "const LIMIT: u8 = 10;
         static mut COUNT: u8 = 0;
         fn main() { COUNT = COUNT + LIMIT; }",
    );
    assert!(unit
        .globals
        .global()
        .variables()
        .any(|var| var.name == "COUNT" && var.mutable));
}

#[test]
fn scopes_stay_balanced_after_recovery() {
    let unit = parse(
        "const LIMIT: i32 = 4;
         fn broken(): i32 { { { let x = ; } } 1 }
         fn main(): i32 { LIMIT }",
    );
    let kinds = unit.diagnostics.kinds();
    assert!(
        kinds
            .iter()
            .all(|kind| matches!(kind, MessageKind::ExpectedExpression { .. })),
        "{kinds:?}"
    );
    assert!(!kinds.is_empty());
    assert_eq!(unit.globals.level(), 0);

    let broken = body(&unit, "broken");
    assert_eq!(broken.ty(false), Some(TypeId::I32));
    let main = body(&unit, "main");
    let tail = main.tail.as_ref().expect("LIMIT is the tail");
    assert!(matches!(
        &tail.kind,
        ExprKind::Variable(var) if var.name == "LIMIT" && var.ty == Some(TypeId::I32)
    ));
}

#[test]
fn lexer_diagnostics_are_forwarded() {
    assert_eq!(
        kinds("fn main() { let a = 0b102; }"),
        vec![MessageKind::InvalidDigit {
            digit: '2',
            base: "binary",
        }]
    );
    assert_eq!(
        kinds("fn main() { let a = 1; $ }"),
        vec![MessageKind::UnknownToken]
    );
}

#[test]
fn recovers_at_end_of_input() {
    let kinds = kinds("fn main() { let x = (1 + ");
    assert!(kinds.contains(&MessageKind::ExpectedExpression {
        found: "end of file"
    }));
    assert!(kinds.contains(&MessageKind::UnexpectedToken {
        expected: "}",
        found: "end of file",
    }));
}
