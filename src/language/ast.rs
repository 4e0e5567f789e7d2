use crate::language::{
    span::{Span, Spanned},
    symbols::{Block, BlockId, Function, Variable},
    types::{Operator, TypeId},
};
use std::rc::Rc;

/// Marker for an expression that could not be resolved. Its diagnostics have already been
/// reported; `assignable` records whether it still named a variable, so an assignment to it is
/// not reported a second time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unresolved {
    pub assignable: bool,
}

pub type Resolved<T> = Result<T, Unresolved>;

#[derive(Debug, Default)]
pub struct File {
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub enum Item {
    Function(FunctionItem),
    Const(Binding),
    Static(Binding),
}

impl Spanned for Item {
    fn span(&self) -> Span {
        match self {
            Item::Function(function) => function.span,
            Item::Const(binding) | Item::Static(binding) => binding.span,
        }
    }
}

#[derive(Debug)]
pub struct FunctionItem {
    pub function: Rc<Function>,
    pub ret_type: Option<TypeAnnotation>,
    pub body: BlockExpr,
    pub span: Span,
}

/// `let`, `const` and `static` share one shape.
#[derive(Debug)]
pub struct Binding {
    pub pattern: Pattern,
    pub ty: Option<TypeAnnotation>,
    pub value: Option<Expr>,
    pub var: Option<Rc<Variable>>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Wildcard(Span),
    Identifier {
        name: String,
        mutable: bool,
        span: Span,
    },
}

impl Pattern {
    pub fn name(&self) -> Option<&str> {
        match self {
            Pattern::Wildcard(_) => None,
            Pattern::Identifier { name, .. } => Some(name),
        }
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self, Pattern::Identifier { mutable: true, .. })
    }
}

impl Spanned for Pattern {
    fn span(&self) -> Span {
        match self {
            Pattern::Wildcard(span) | Pattern::Identifier { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeAnnotationKind {
    Named(String),
    Inferred,
    Empty,
    Paren(Box<TypeAnnotation>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    pub kind: TypeAnnotationKind,
    pub ty: Option<TypeId>,
    pub span: Span,
}

impl TypeAnnotation {
    pub fn is_inferred(&self) -> bool {
        match &self.kind {
            TypeAnnotationKind::Inferred => true,
            TypeAnnotationKind::Paren(inner) => inner.is_inferred(),
            TypeAnnotationKind::Named(_) | TypeAnnotationKind::Empty => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub name: String,
    pub span: Span,
}

#[derive(Debug)]
pub enum Stmt {
    Local(Binding),
    Item(Item),
    Expr(Expr),
}

impl Stmt {
    pub fn return_target(&self) -> Option<JumpTarget> {
        match self {
            Stmt::Local(binding) => binding.value.as_ref().and_then(Expr::return_target),
            Stmt::Item(_) => None,
            Stmt::Expr(expr) => expr.return_target(),
        }
    }
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Literal(Literal),
    Variable(Rc<Variable>),
    Unary {
        op: Operator,
        operand: Box<Expr>,
    },
    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        target: TypeAnnotation,
        op: Operator,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        function: Rc<Function>,
        args: Vec<CallArg>,
    },
    Block(BlockExpr),
    If(IfExpr),
    While {
        condition: Box<Expr>,
        body: BlockExpr,
    },
    Loop {
        body: BlockExpr,
    },
    Grouped(Option<Box<Expr>>),
    Break(Jump),
    Return(Jump),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LiteralValue {
    Int(u64),
    Float(f64),
    Bool(bool),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub ty: TypeId,
}

/// One argument slot of a resolved call, in parameter order.
#[derive(Debug)]
pub enum CallArg {
    Given { name: Option<String>, value: Expr },
    /// Filled from the parameter's default, or unit for a `()` parameter.
    Omitted { position: usize },
}

/// Block a `break` or `return` leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JumpTarget {
    pub block: BlockId,
    pub level: usize,
}

#[derive(Debug)]
pub struct Jump {
    pub label: Option<Label>,
    pub target: Option<JumpTarget>,
    pub value: Option<Box<Expr>>,
}

#[derive(Debug)]
pub struct BlockExpr {
    pub label: Option<Label>,
    /// Final state of the block's return inference.
    pub info: Block,
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

impl BlockExpr {
    /// Diverging blocks report `!` unless the caller asks for the inner type.
    pub fn ty(&self, without_divergence: bool) -> Option<TypeId> {
        if !without_divergence && self.info.not_return {
            Some(TypeId::NEVER)
        } else {
            self.info.must_return
        }
    }

    /// Outer block that every path through this block jumps to, if the first such jump is found.
    pub fn return_target(&self) -> Option<JumpTarget> {
        let escapes = |target: &JumpTarget| target.level < self.info.level;
        self.stmts
            .iter()
            .filter_map(Stmt::return_target)
            .find(escapes)
            .or_else(|| {
                self.tail
                    .as_ref()
                    .and_then(|tail| tail.return_target())
                    .filter(escapes)
            })
    }
}

#[derive(Debug)]
pub struct IfExpr {
    pub condition: Box<Expr>,
    pub then_block: BlockExpr,
    pub else_branch: Option<Box<ElseBranch>>,
    pub if_span: Span,
}

#[derive(Debug)]
pub enum ElseBranch {
    If(IfExpr),
    Block(BlockExpr),
}

impl IfExpr {
    fn arms(&self) -> (Vec<&BlockExpr>, bool) {
        let mut arms = vec![&self.then_block];
        let mut current = self;
        loop {
            match current.else_branch.as_deref() {
                None => return (arms, false),
                Some(ElseBranch::Block(block)) => {
                    arms.push(block);
                    return (arms, true);
                }
                Some(ElseBranch::If(next)) => {
                    arms.push(&next.then_block);
                    current = next;
                }
            }
        }
    }

    /// Whether the chain ends with a plain `else`.
    pub fn is_complete(&self) -> bool {
        self.arms().1
    }

    /// `!` when every arm diverges, the last arm's type when the chain is complete, unit otherwise.
    pub fn return_type(&self) -> Option<TypeId> {
        let (arms, complete) = self.arms();
        if !complete {
            return Some(TypeId::EMPTY);
        }
        let mut all_diverge = true;
        let mut last = None;
        for arm in arms {
            last = arm.ty(false);
            if last != Some(TypeId::NEVER) {
                all_diverge = false;
            }
            if last.is_none() {
                return Some(TypeId::EMPTY);
            }
        }
        if all_diverge {
            Some(TypeId::NEVER)
        } else {
            last
        }
    }

    /// Innermost outer block that every arm of a complete chain jumps to.
    pub fn return_target(&self) -> Option<JumpTarget> {
        let (arms, complete) = self.arms();
        if !complete {
            return None;
        }
        let mut chosen: Option<JumpTarget> = None;
        for arm in arms {
            let target = arm.return_target()?;
            chosen = match chosen {
                Some(current) if current.level >= target.level => Some(current),
                _ => Some(target),
            };
        }
        chosen
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn ty(&self) -> Option<TypeId> {
        match &self.kind {
            ExprKind::Literal(literal) => Some(literal.ty),
            ExprKind::Variable(var) => var.ty,
            ExprKind::Unary { op, .. } | ExprKind::Binary { op, .. } | ExprKind::Cast { op, .. } => {
                Some(op.ret)
            }
            ExprKind::Assign { .. } => Some(TypeId::EMPTY),
            ExprKind::Call { function, .. } => function.ret,
            ExprKind::Block(block) => block.ty(false),
            ExprKind::If(if_expr) => if_expr.return_type(),
            ExprKind::While { body, .. } | ExprKind::Loop { body } => body.ty(false),
            ExprKind::Grouped(None) => Some(TypeId::EMPTY),
            ExprKind::Grouped(Some(inner)) => inner.ty(),
            ExprKind::Break(_) | ExprKind::Return(_) => Some(TypeId::NEVER),
        }
    }

    /// Outer block this expression unconditionally jumps to.
    pub fn return_target(&self) -> Option<JumpTarget> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::Call { .. } => None,
            ExprKind::Grouped(inner) => inner.as_ref().and_then(|inner| inner.return_target()),
            ExprKind::Cast { expr, .. } => expr.return_target(),
            ExprKind::Unary { operand, .. } => operand.return_target(),
            ExprKind::Binary { left, right, .. } => {
                left.return_target().or_else(|| right.return_target())
            }
            ExprKind::Assign { value, .. } => value.return_target(),
            ExprKind::Break(jump) | ExprKind::Return(jump) => jump.target,
            ExprKind::While { body, .. } | ExprKind::Loop { body } => body.return_target(),
            ExprKind::If(if_expr) => if_expr.return_target(),
            ExprKind::Block(block) => block.return_target(),
        }
    }

    /// Expressions ending in a block, which need no `;` in statement position.
    pub fn is_block_like(&self) -> bool {
        match &self.kind {
            ExprKind::Block(_) | ExprKind::If(_) | ExprKind::While { .. } | ExprKind::Loop { .. } => {
                true
            }
            ExprKind::Grouped(Some(inner)) => inner.is_block_like(),
            _ => false,
        }
    }

    pub fn as_variable(&self) -> Option<&Rc<Variable>> {
        match &self.kind {
            ExprKind::Variable(var) => Some(var),
            ExprKind::Grouped(Some(inner)) => inner.as_variable(),
            _ => None,
        }
    }
}
