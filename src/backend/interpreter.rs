use super::{
    environment::Environment,
    error::{RuntimeError, RuntimeResult},
    value::Value,
    Backend,
};
use crate::language::{
    ast::{
        Binding, BlockExpr, CallArg, ElseBranch, Expr, ExprKind, FunctionItem, IfExpr, Item, Jump,
        Stmt,
    },
    parser::Unit,
    symbols::{BlockId, Function, Param},
    types::{OpAction, Operator, TypeId, TypeRegistry},
};
use std::collections::HashMap;
use std::rc::Rc;

/// Nested calls allowed before a run is aborted.
pub const DEFAULT_CALL_DEPTH: usize = 256;

/// Pending jump travelling outwards to the block it names.
#[derive(Debug)]
enum FlowSignal {
    Break { target: BlockId, value: Value },
    Return { target: BlockId, value: Value },
}

impl FlowSignal {
    fn target(&self) -> BlockId {
        match self {
            FlowSignal::Break { target, .. } | FlowSignal::Return { target, .. } => *target,
        }
    }

    fn into_value(self) -> Value {
        match self {
            FlowSignal::Break { value, .. } | FlowSignal::Return { value, .. } => value,
        }
    }
}

#[derive(Debug)]
enum Interrupt {
    Flow(FlowSignal),
    Error(RuntimeError),
}

impl From<RuntimeError> for Interrupt {
    fn from(error: RuntimeError) -> Self {
        Interrupt::Error(error)
    }
}

type Eval<T = Value> = Result<T, Interrupt>;

/// Tree-walking evaluator for a resolved unit.
pub struct Interpreter<'t> {
    types: &'t TypeRegistry,
    call_depth: usize,
    result: Option<Value>,
    error: Option<RuntimeError>,
}

impl<'t> Interpreter<'t> {
    pub fn new(types: &'t TypeRegistry) -> Self {
        Self {
            types,
            call_depth: DEFAULT_CALL_DEPTH,
            result: None,
            error: None,
        }
    }

    pub fn with_call_depth(mut self, limit: usize) -> Self {
        self.call_depth = limit;
        self
    }

    /// Evaluates globals in declaration order, then calls `main`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&self, unit: &Unit) -> RuntimeResult<Value> {
        let mut machine = Machine::new(self.types, self.call_depth, unit);
        let result = machine.run(unit);
        match result {
            Ok(value) => Ok(value),
            Err(Interrupt::Error(error)) => Err(error),
            Err(Interrupt::Flow(_)) => Err(RuntimeError::Unresolved {
                what: "jump target",
            }),
        }
    }

    pub fn result(&self) -> Option<Value> {
        self.result
    }

    pub fn take_error(&mut self) -> Option<RuntimeError> {
        self.error.take()
    }
}

impl Backend for Interpreter<'_> {
    fn lower(&mut self, unit: &Unit) -> bool {
        match self.run(unit) {
            Ok(value) => {
                tracing::debug!(%value, "program finished");
                self.result = Some(value);
                true
            }
            Err(error) => {
                tracing::debug!(%error, "program failed");
                self.error = Some(error);
                false
            }
        }
    }
}

struct Machine<'a> {
    types: &'a TypeRegistry,
    functions: HashMap<*const Function, &'a FunctionItem>,
    env: Environment,
    limit: usize,
}

impl<'a> Machine<'a> {
    fn new(types: &'a TypeRegistry, limit: usize, unit: &'a Unit) -> Self {
        let functions = unit
            .file
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Function(function) => Some((Rc::as_ptr(&function.function), function)),
                Item::Const(_) | Item::Static(_) => None,
            })
            .collect();
        Self {
            types,
            functions,
            env: Environment::new(),
            limit,
        }
    }

    fn run(&mut self, unit: &Unit) -> Eval {
        for item in &unit.file.items {
            match item {
                Item::Const(binding) | Item::Static(binding) => {
                    let value = self.binding_value(binding)?;
                    if let Some(var) = &binding.var {
                        self.env.define_global(var, value);
                    }
                }
                Item::Function(_) => {}
            }
        }

        let main = unit
            .globals
            .lookup_functions("main")
            .iter()
            .find(|function| function.params.iter().all(Param::is_optional))
            .cloned()
            .ok_or(RuntimeError::MissingEntry)?;
        self.call(&main, Vec::new())
    }

    fn binding_value(&mut self, binding: &Binding) -> Eval {
        match &binding.value {
            Some(value) => self.eval(value),
            None => Err(RuntimeError::Unresolved {
                what: "initializer",
            }
            .into()),
        }
    }

    fn exec(&mut self, stmt: &Stmt) -> Eval<()> {
        match stmt {
            Stmt::Local(binding) | Stmt::Item(Item::Const(binding) | Item::Static(binding)) => {
                let value = self.binding_value(binding)?;
                if let Some(var) = &binding.var {
                    self.env.declare(var, value);
                }
            }
            Stmt::Item(Item::Function(_)) => {}
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Eval {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                Ok(Value::from_literal(literal, self.types.kind(literal.ty)))
            }
            ExprKind::Variable(var) => Ok(self.env.get(var)?),
            ExprKind::Unary { op, operand } => Ok(self.eval(operand)?.unary(op.action)?),
            ExprKind::Binary { op, left, right } => self.eval_binary(op, left, right),
            ExprKind::Cast { expr, op, .. } => {
                let value = self.eval(expr)?;
                Ok(value.convert(op.action, self.types.kind(op.ret))?)
            }
            ExprKind::Assign { target, value } => {
                let value = self.eval(value)?;
                let var = target.as_variable().ok_or(RuntimeError::Unresolved {
                    what: "assignment target",
                })?;
                self.env.assign(var, value)?;
                Ok(Value::Unit)
            }
            ExprKind::Call { function, args } => {
                let mut given = Vec::with_capacity(args.len());
                for arg in args {
                    given.push(match arg {
                        CallArg::Given { value, .. } => Some(self.eval(value)?),
                        CallArg::Omitted { .. } => None,
                    });
                }
                self.call(function, given)
            }
            ExprKind::Block(block) => self.eval_block(block),
            ExprKind::If(if_expr) => {
                let value = self.eval_if(if_expr)?;
                Ok(if if_expr.is_complete() {
                    value
                } else {
                    Value::Unit
                })
            }
            ExprKind::While { condition, body } => {
                while self.eval_condition(condition)? {
                    match self.run_block(body) {
                        Ok(_) => {}
                        Err(Interrupt::Flow(flow)) if flow.target() == body.info.id => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Unit)
            }
            ExprKind::Loop { body } => loop {
                match self.run_block(body) {
                    Ok(_) => {}
                    Err(Interrupt::Flow(flow)) if flow.target() == body.info.id => {
                        return Ok(flow.into_value())
                    }
                    Err(other) => return Err(other),
                }
            },
            ExprKind::Grouped(None) => Ok(Value::Unit),
            ExprKind::Grouped(Some(inner)) => self.eval(inner),
            ExprKind::Break(jump) => {
                let (target, value) = self.jump(jump)?;
                Err(Interrupt::Flow(FlowSignal::Break { target, value }))
            }
            ExprKind::Return(jump) => {
                let (target, value) = self.jump(jump)?;
                Err(Interrupt::Flow(FlowSignal::Return { target, value }))
            }
        }
    }

    fn eval_condition(&mut self, condition: &Expr) -> Eval<bool> {
        let value = self.eval(condition)?;
        value.as_bool().ok_or_else(|| {
            RuntimeError::Unsupported {
                action: OpAction::NotBool,
                operands: format!("condition of type {}", value.type_name()),
            }
            .into()
        })
    }

    /// `&&` and `||` skip their right operand once the left decides the result.
    fn eval_binary(&mut self, op: &Operator, left: &Expr, right: &Expr) -> Eval {
        match op.action {
            OpAction::And | OpAction::Or => {
                let decisive = op.action == OpAction::Or;
                if self.eval_condition(left)? == decisive {
                    return Ok(Value::Bool(decisive));
                }
                Ok(Value::Bool(self.eval_condition(right)?))
            }
            action => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                Ok(lhs.binary(action, rhs)?)
            }
        }
    }

    fn eval_if(&mut self, if_expr: &IfExpr) -> Eval {
        if self.eval_condition(&if_expr.condition)? {
            return self.eval_block(&if_expr.then_block);
        }
        match if_expr.else_branch.as_deref() {
            None => Ok(Value::Unit),
            Some(ElseBranch::Block(block)) => self.eval_block(block),
            Some(ElseBranch::If(next)) => self.eval_if(next),
        }
    }

    fn jump(&mut self, jump: &Jump) -> Eval<(BlockId, Value)> {
        let target = jump.target.ok_or(RuntimeError::Unresolved {
            what: "jump target",
        })?;
        let value = match &jump.value {
            Some(value) => self.eval(value)?,
            None => Value::Unit,
        };
        Ok((target.block, value))
    }

    /// Runs a block and catches jumps aimed at it.
    fn eval_block(&mut self, block: &BlockExpr) -> Eval {
        match self.run_block(block) {
            Err(Interrupt::Flow(flow)) if flow.target() == block.info.id => Ok(flow.into_value()),
            other => other,
        }
    }

    fn run_block(&mut self, block: &BlockExpr) -> Eval {
        self.env.push_scope();
        let result = self.run_statements(block);
        self.env.pop_scope();
        result
    }

    fn run_statements(&mut self, block: &BlockExpr) -> Eval {
        for stmt in &block.stmts {
            self.exec(stmt)?;
        }
        match &block.tail {
            Some(tail) => self.eval(tail),
            None => Ok(Value::Unit),
        }
    }

    fn call(&mut self, function: &Rc<Function>, given: Vec<Option<Value>>) -> Eval {
        let item = *self
            .functions
            .get(&Rc::as_ptr(function))
            .ok_or_else(|| RuntimeError::MissingBody {
                name: function.name.clone(),
            })?;
        if self.env.depth() >= self.limit {
            return Err(RuntimeError::CallDepth {
                name: function.name.clone(),
                limit: self.limit,
            }
            .into());
        }
        tracing::trace!(name = %function.name, depth = self.env.depth(), "call");

        self.env.push_frame();
        let result = self.enter(function, item, given);
        self.env.pop_frame();
        match result {
            Err(Interrupt::Flow(_)) => Err(RuntimeError::Unresolved {
                what: "jump target",
            }
            .into()),
            other => other,
        }
    }

    /// Binds parameters in order. Defaults run in the callee's frame, after the parameters
    /// before them.
    fn enter(
        &mut self,
        function: &Function,
        item: &FunctionItem,
        mut given: Vec<Option<Value>>,
    ) -> Eval {
        given.resize(function.params.len(), None);
        for (position, (param, value)) in function.params.iter().zip(given).enumerate() {
            let value = match (value, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default)?,
                (None, None) if param.ty == Some(TypeId::EMPTY) => Value::Unit,
                (None, None) => {
                    return Err(RuntimeError::MissingArgument {
                        name: function.name.clone(),
                        position,
                    }
                    .into())
                }
            };
            if let Some(var) = &param.var {
                self.env.declare(var, value);
            }
        }
        self.eval_block(&item.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_source;

    fn run(source: &str) -> RuntimeResult<Value> {
        let types = TypeRegistry::builtin();
        let unit = parse_source(source, &types);
        assert!(
            unit.is_clean(),
            "unexpected diagnostics: {:?}",
            unit.diagnostics.kinds()
        );
        Interpreter::new(&types).run(&unit)
    }

    #[test]
    fn main_value_is_the_result() {
        assert_eq!(run("fn main(): i32 { 40 + 2 }"), Ok(Value::I32(42)));
        assert_eq!(run("fn main() { }"), Ok(Value::Unit));
    }

    #[test]
    fn operators_follow_flat_precedence() {
        assert_eq!(run("fn main(): i32 { 1 + 2 * 3 }"), Ok(Value::I32(9)));
        assert_eq!(run("fn main(): i64 { -1 as i64 }"), Ok(Value::I64(-1)));
        assert_eq!(run("fn main(): u8 { 250u8 + 10 }"), Ok(Value::U8(4)));
    }

    #[test]
    fn recursion_and_overloads() {
        let source = "
            fn fib(n: i32): i32 {
                if n < 2 { return n; }
                fib(n - 1) + fib(n - 2)
            }
            fn pick(x: i32): i32 { x }
            fn pick(x: f64): i32 { 0 }
            fn main(): i32 { fib(10) + pick(1.5) + pick(1) }
        ";
        assert_eq!(run(source), Ok(Value::I32(56)));
    }

    #[test]
    fn loops_break_with_values() {
        let source = "
            fn main(): i32 {
                let mut i = 0;
                let mut total = 0;
                while i < 5 {
                    total = total + i;
                    i = i + 1;
                }
                let found = loop @grow: {
                    if total > 20 { break @grow total; }
                    total = total * 2;
                };
                found
            }
        ";
        assert_eq!(run(source), Ok(Value::I32(40)));
    }

    #[test]
    fn unlabelled_break_leaves_only_the_if_block() {
        let source = "
            fn main(): i32 {
                let mut n = 0;
                let mut steps = 0;
                while n < 3 {
                    n = n + 1;
                    if n == 2 { break; }
                    steps = steps + 10;
                }
                steps + n
            }
        ";
        assert_eq!(run(source), Ok(Value::I32(33)));
    }

    #[test]
    fn labelled_break_leaves_outer_loop() {
        let source = "
            fn main(): i32 {
                let mut n = 0;
                loop @outer: {
                    loop {
                        n = n + 1;
                        if n == 3 { break @outer; }
                    }
                }
                n
            }
        ";
        assert_eq!(run(source), Ok(Value::I32(3)));
    }

    #[test]
    fn nested_return_leaves_function() {
        let source = "
            fn sign(x: i32): i32 {
                { if x < 0 { return -1; } }
                1
            }
            fn main(): i32 { sign(-5) * 10 + sign(5) }
        ";
        assert_eq!(run(source), Ok(Value::I32(-9)));
    }

    #[test]
    fn short_circuit_skips_right_operand() {
        let source = "
            static mut HITS: i32 = 0;
            fn touch(): bool { HITS = HITS + 1; true }
            fn main(): i32 {
                let a = false && touch();
                let b = true || touch();
                let c = true && touch();
                HITS
            }
        ";
        assert_eq!(run(source), Ok(Value::I32(1)));
    }

    #[test]
    fn defaults_evaluate_at_call_time() {
        let source = "
            static mut NEXT: i32 = 0;
            fn tick(): i32 { NEXT = NEXT + 1; NEXT }
            fn add(a: i32, b: i32 = a + tick()): i32 { a + b }
            fn main(): i32 { add(10) + add(b = 1, a = 2) + add(100) }
        ";
        // 10 + 11, 2 + 1, 100 + 102
        assert_eq!(run(source), Ok(Value::I32(226)));
    }

    #[test]
    fn globals_initialize_before_main() {
        let source = "
            const BASE: i64 = 5;
            static SCALED: i64 = BASE * 3;
            fn main(): i64 { SCALED + BASE }
        ";
        assert_eq!(run(source), Ok(Value::I64(20)));
    }

    #[test]
    fn runtime_failures_are_errors() {
        let division = run("fn main(): i32 { let zero = 0; 10 / zero }");
        assert!(matches!(
            division,
            Err(RuntimeError::DivisionByZero {
                action: OpAction::SDiv
            })
        ));

        let types = TypeRegistry::builtin();
        let unit = parse_source(
            "fn forever(n: i32): i32 { forever(n + 1) } fn main(): i32 { forever(0) }",
            &types,
        );
        assert!(unit.is_clean());
        let deep = Interpreter::new(&types).with_call_depth(32).run(&unit);
        assert!(matches!(deep, Err(RuntimeError::CallDepth { limit: 32, .. })));
    }

    #[test]
    fn lower_records_outcome() {
        let types = TypeRegistry::builtin();
        let unit = parse_source("fn main(): u8 { 7u8 }", &types);
        let mut interpreter = Interpreter::new(&types);
        assert!(interpreter.lower(&unit));
        assert_eq!(interpreter.result().map(|value| value.exit_code()), Some(7));
        assert!(interpreter.take_error().is_none());
    }
}
