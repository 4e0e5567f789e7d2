use crate::language::{
    ast::Expr,
    types::{TypeId, TypeRegistry},
};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Const,
    Static,
    Local,
    Param { position: usize },
}

/// A named binding. Scopes own the declaration; AST nodes hold shared references to it.
#[derive(Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Option<TypeId>,
    pub mutable: bool,
    pub kind: VariableKind,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        ty: Option<TypeId>,
        mutable: bool,
        kind: VariableKind,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            ty,
            mutable,
            kind,
        })
    }
}

#[derive(Debug)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Option<TypeId>,
    pub mutable: bool,
    pub default: Option<Expr>,
    pub var: Option<Rc<Variable>>,
}

impl Param {
    /// A call may leave this parameter out.
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.ty == Some(TypeId::EMPTY)
    }
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeId>,
}

impl Function {
    /// Two signatures collide only when the return type and every parameter type are resolved
    /// and identical. Unresolved types never collide.
    pub fn same_signature(&self, other: &Function) -> bool {
        self.ret.is_some()
            && self.ret == other.ret
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.is_some() && a.ty == b.ty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inferred return behaviour of one lexical block.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub name: Option<String>,
    pub alt_name: Option<String>,
    pub level: usize,
    pub possible: Option<Vec<TypeId>>,
    pub must_return: Option<TypeId>,
    /// Every path leaves through an enclosing block.
    pub not_return: bool,
    /// The last effective statement is an unconditional jump.
    pub last_is_jump: bool,
}

impl Block {
    pub fn matches(&self, label: Option<&str>) -> bool {
        match label {
            None => true,
            Some(label) => {
                self.name.as_deref() == Some(label) || self.alt_name.as_deref() == Some(label)
            }
        }
    }

    /// Name used when reporting on this block.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.alt_name.as_deref())
            .unwrap_or("")
    }

    /// Hint set handed to expressions that produce this block's value.
    pub fn hints(&self) -> Option<Vec<TypeId>> {
        match self.must_return {
            Some(ty) => Some(vec![ty]),
            None => self.possible.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    pub level: usize,
    variables: HashMap<String, Vec<Rc<Variable>>>,
    functions: HashMap<String, Vec<Rc<Function>>>,
    types: HashMap<String, TypeId>,
    pub block: Option<Block>,
}

impl Scope {
    fn new(level: usize) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &Rc<Variable>> {
        self.variables.values().flatten()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Rc<Function>> {
        self.functions.values().flatten()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("cannot leave the global scope")]
    LeaveGlobal,
    #[error("'{0}' is already declared in this scope")]
    Redefinition(String),
    #[error("function '{0}' is already declared with the same signature")]
    DuplicateFunction(String),
}

/// Chain of lexical scopes, innermost last. The global scope is never popped.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    next_block: u32,
}

impl SymbolTable {
    pub fn new(registry: &TypeRegistry) -> Self {
        let mut table = Self {
            scopes: vec![Scope::new(0)],
            next_block: 0,
        };
        for ty in registry.iter() {
            table.declare_type(ty.name, ty.id);
        }
        table
    }

    fn current(&self) -> &Scope {
        self.scopes
            .last()
            .unwrap_or_else(|| unreachable!("global scope is never removed"))
    }

    fn current_mut(&mut self) -> &mut Scope {
        self.scopes
            .last_mut()
            .unwrap_or_else(|| unreachable!("global scope is never removed"))
    }

    fn global_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    pub fn level(&self) -> usize {
        self.current().level
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn enter_scope(&mut self) {
        let level = self.level() + 1;
        tracing::trace!(level, "enter scope");
        self.scopes.push(Scope::new(level));
    }

    pub fn leave_scope(&mut self) -> Result<Scope, SymbolError> {
        if self.level() == 0 {
            return Err(SymbolError::LeaveGlobal);
        }
        let scope = self
            .scopes
            .pop()
            .unwrap_or_else(|| unreachable!("non-global scope present"));
        tracing::trace!(level = scope.level, "leave scope");
        Ok(scope)
    }

    /// Declares `var` in the current scope. Without `allow_redefinition`, a variable with the
    /// same name in the current scope is an error; outer scopes are always shadowed.
    pub fn declare_variable(
        &mut self,
        var: Rc<Variable>,
        allow_redefinition: bool,
    ) -> Result<(), SymbolError> {
        let scope = self.current_mut();
        let slot = scope.variables.entry(var.name.clone()).or_default();
        if !allow_redefinition && !slot.is_empty() {
            return Err(SymbolError::Redefinition(var.name.clone()));
        }
        slot.push(var);
        Ok(())
    }

    pub fn declare_function(&mut self, function: Rc<Function>) -> Result<(), SymbolError> {
        let global = self.global_mut();
        let overloads = global.functions.entry(function.name.clone()).or_default();
        if overloads
            .iter()
            .any(|existing| existing.same_signature(&function))
        {
            return Err(SymbolError::DuplicateFunction(function.name.clone()));
        }
        overloads.push(function);
        Ok(())
    }

    pub fn declare_type(&mut self, name: &str, id: TypeId) -> bool {
        let types = &mut self.current_mut().types;
        if types.contains_key(name) {
            return false;
        }
        types.insert(name.to_string(), id);
        true
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.types.get(name).copied())
    }

    pub fn lookup_variable(&self, name: &str) -> Option<Rc<Variable>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name).and_then(|vars| vars.last()))
            .cloned()
    }

    pub fn lookup_functions(&self, name: &str) -> &[Rc<Function>] {
        self.global()
            .functions
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Creates the block owned by the current scope and returns its id.
    pub fn associate_block(
        &mut self,
        name: Option<String>,
        alt_name: Option<String>,
        possible: Option<Vec<TypeId>>,
        must_return: Option<TypeId>,
    ) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        let level = self.level();
        self.current_mut().block = Some(Block {
            id,
            name,
            alt_name,
            level,
            possible,
            must_return,
            not_return: false,
            last_is_jump: false,
        });
        id
    }

    pub fn current_block_mut(&mut self) -> Option<&mut Block> {
        self.current_mut().block.as_mut()
    }

    /// Nearest enclosing block matching `label`; the target of `break`.
    pub fn innermost_block_mut(&mut self, label: Option<&str>) -> Option<&mut Block> {
        self.scopes
            .iter_mut()
            .rev()
            .filter_map(|scope| scope.block.as_mut())
            .find(|block| block.matches(label))
    }

    /// Outermost enclosing block matching `label`; the target of `return`.
    pub fn outermost_block_mut(&mut self, label: Option<&str>) -> Option<&mut Block> {
        self.scopes
            .iter_mut()
            .filter_map(|scope| scope.block.as_mut())
            .find(|block| block.matches(label))
    }
}
