use super::{value::Value, Backend};
use crate::language::{
    ast::{
        Binding, BlockExpr, CallArg, ElseBranch, Expr, ExprKind, FunctionItem, IfExpr, Item, Jump,
        Stmt,
    },
    parser::Unit,
    types::TypeRegistry,
};
use std::fmt::Write;

/// Renders the resolved tree, one node per line. Expressions carry their type, operators their
/// semantic action and jumps the block they leave.
pub struct TreePrinter<'t> {
    types: &'t TypeRegistry,
    out: String,
}

impl<'t> TreePrinter<'t> {
    pub fn new(types: &'t TypeRegistry) -> Self {
        Self {
            types,
            out: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn ty(&self, expr: &Expr) -> String {
        self.types.describe(expr.ty())
    }

    fn write_item(&mut self, depth: usize, item: &Item) {
        match item {
            Item::Function(function) => self.write_function(depth, function),
            Item::Const(binding) => self.write_binding(depth, "const", binding),
            Item::Static(binding) => self.write_binding(depth, "static", binding),
        }
    }

    fn write_function(&mut self, depth: usize, item: &FunctionItem) {
        let function = &item.function;
        let ret = self.types.describe(function.ret);
        self.line(depth, format!("fn {} : {ret}", function.name));
        for param in &function.params {
            let name = param.name.as_deref().unwrap_or("_");
            let mutable = if param.mutable { "mut " } else { "" };
            let ty = self.types.describe(param.ty);
            self.line(depth + 1, format!("param {mutable}{name} : {ty}"));
            if let Some(default) = &param.default {
                self.write_expr(depth + 2, default, "");
            }
        }
        self.write_block(depth + 1, &item.body, "");
    }

    fn write_binding(&mut self, depth: usize, keyword: &str, binding: &Binding) {
        let name = binding.pattern.name().unwrap_or("_");
        let mutable = if binding.pattern.is_mutable() { "mut " } else { "" };
        let ty = self
            .types
            .describe(binding.var.as_ref().and_then(|var| var.ty));
        self.line(depth, format!("{keyword} {mutable}{name} : {ty}"));
        if let Some(value) = &binding.value {
            self.write_expr(depth + 1, value, "");
        }
    }

    fn write_block(&mut self, depth: usize, block: &BlockExpr, prefix: &str) {
        let mut header = format!("{prefix}block {}", block.info.id);
        let name = block.info.display_name();
        if !name.is_empty() {
            let _ = write!(header, " {name}");
        }
        let _ = write!(header, " : {}", self.types.describe(block.ty(false)));
        self.line(depth, header);

        for stmt in &block.stmts {
            match stmt {
                Stmt::Local(binding) => self.write_binding(depth + 1, "let", binding),
                Stmt::Item(item) => self.write_item(depth + 1, item),
                Stmt::Expr(expr) => self.write_expr(depth + 1, expr, ""),
            }
        }
        if let Some(tail) = &block.tail {
            self.write_expr(depth + 1, tail, "tail: ");
        }
    }

    fn write_if(&mut self, depth: usize, if_expr: &IfExpr, ty: &str, prefix: &str) {
        self.line(depth, format!("{prefix}if : {ty}"));
        self.write_expr(depth + 1, &if_expr.condition, "cond: ");
        self.write_block(depth + 1, &if_expr.then_block, "then: ");
        match if_expr.else_branch.as_deref() {
            None => {}
            Some(ElseBranch::Block(block)) => self.write_block(depth + 1, block, "else: "),
            Some(ElseBranch::If(next)) => {
                let ty = self.types.describe(next.return_type());
                self.write_if(depth + 1, next, &ty, "else: ");
            }
        }
    }

    fn write_jump(&mut self, depth: usize, keyword: &str, jump: &Jump, prefix: &str) {
        let target = jump
            .target
            .map_or_else(|| "?".to_string(), |target| target.block.to_string());
        self.line(depth, format!("{prefix}{keyword} -> {target} : !"));
        if let Some(value) = &jump.value {
            self.write_expr(depth + 1, value, "");
        }
    }

    fn write_expr(&mut self, depth: usize, expr: &Expr, prefix: &str) {
        let ty = self.ty(expr);
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let value = Value::from_literal(literal, self.types.kind(literal.ty));
                self.line(depth, format!("{prefix}literal {value} : {ty}"));
            }
            ExprKind::Variable(var) => {
                self.line(depth, format!("{prefix}variable {} : {ty}", var.name));
            }
            ExprKind::Unary { op, operand } => {
                self.line(depth, format!("{prefix}unary {} [{}] : {ty}", op.name, op.action));
                self.write_expr(depth + 1, operand, "");
            }
            ExprKind::Binary { op, left, right } => {
                self.line(depth, format!("{prefix}binary {} [{}] : {ty}", op.name, op.action));
                self.write_expr(depth + 1, left, "");
                self.write_expr(depth + 1, right, "");
            }
            ExprKind::Cast { expr: inner, op, .. } => {
                self.line(depth, format!("{prefix}cast [{}] : {ty}", op.action));
                self.write_expr(depth + 1, inner, "");
            }
            ExprKind::Assign { target, value } => {
                self.line(depth, format!("{prefix}assign : {ty}"));
                self.write_expr(depth + 1, target, "");
                self.write_expr(depth + 1, value, "");
            }
            ExprKind::Call { function, args } => {
                self.line(depth, format!("{prefix}call {} : {ty}", function.name));
                for arg in args {
                    match arg {
                        CallArg::Given { name: Some(name), value } => {
                            self.write_expr(depth + 1, value, &format!("{name} = "));
                        }
                        CallArg::Given { name: None, value } => {
                            self.write_expr(depth + 1, value, "");
                        }
                        CallArg::Omitted { position } => {
                            let name = function
                                .params
                                .get(*position)
                                .and_then(|param| param.name.as_deref())
                                .unwrap_or("_");
                            self.line(depth + 1, format!("default {name}"));
                        }
                    }
                }
            }
            ExprKind::Block(block) => self.write_block(depth, block, prefix),
            ExprKind::If(if_expr) => self.write_if(depth, if_expr, &ty, prefix),
            ExprKind::While { condition, body } => {
                self.line(depth, format!("{prefix}while : {ty}"));
                self.write_expr(depth + 1, condition, "cond: ");
                self.write_block(depth + 1, body, "");
            }
            ExprKind::Loop { body } => {
                self.line(depth, format!("{prefix}loop : {ty}"));
                self.write_block(depth + 1, body, "");
            }
            ExprKind::Grouped(None) => self.line(depth, format!("{prefix}unit : {ty}")),
            ExprKind::Grouped(Some(inner)) => {
                self.line(depth, format!("{prefix}group : {ty}"));
                self.write_expr(depth + 1, inner, "");
            }
            ExprKind::Break(jump) => self.write_jump(depth, "break", jump, prefix),
            ExprKind::Return(jump) => self.write_jump(depth, "return", jump, prefix),
        }
    }
}

impl Backend for TreePrinter<'_> {
    fn lower(&mut self, unit: &Unit) -> bool {
        self.out.clear();
        for item in &unit.file.items {
            self.write_item(0, item);
        }
        tracing::debug!(bytes = self.out.len(), "printed resolved tree");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_source;

    fn render(source: &str) -> String {
        let types = TypeRegistry::builtin();
        let unit = parse_source(source, &types);
        assert!(unit.is_clean(), "{:?}", unit.diagnostics.kinds());
        let mut printer = TreePrinter::new(&types);
        assert!(printer.lower(&unit));
        printer.into_output()
    }

    #[test]
    fn prints_types_actions_and_defaults() {
        let tree = render(
            "fn add(a: i32, b: i32 = 2): i32 { a + b }
             fn main() { let x = add(1); if x > 2 { return; } }",
        );
        let expected = "\
fn add : i32
  param a : i32
  param b : i32
    literal 2 : i32
  block #0 add : i32
    tail: binary + [Add] : i32
      variable a : i32
      variable b : i32
fn main : ()
  block #1 main : ()
    let x : i32
      call add : i32
        literal 1 : i32
        default b
    if : ()
      cond: binary > [SGt] : bool
        variable x : i32
        literal 2 : i32
      then: block #2 if : !
        return -> #1 : !
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn prints_conversions_and_loop_targets() {
        let tree = render("fn main(): i64 { loop { break -3 as i64; } }");
        let expected = "\
fn main : i64
  block #0 main : i64
    tail: loop : i64
      block #1 loop : i64
        break -> #1 : !
          unary - [NegSInt] : i64
            cast [SIntToSInt] : i64
              literal 3 : i32
";
        assert_eq!(tree, expected);
    }
}
