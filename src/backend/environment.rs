use super::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
};
use crate::language::symbols::Variable;
use std::collections::HashMap;
use std::rc::Rc;

/// Bindings are keyed by the identity of their resolved declaration, so shadowed names never
/// collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Slot(*const Variable);

impl Slot {
    fn of(var: &Rc<Variable>) -> Self {
        Slot(Rc::as_ptr(var))
    }
}

#[derive(Clone, Debug)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug, Default)]
struct Frame {
    scopes: Vec<HashMap<Slot, Binding>>,
}

/// Storage for one program run: globals plus one frame per active call. Only the innermost
/// frame and the globals are visible.
#[derive(Debug, Default)]
pub struct Environment {
    globals: HashMap<Slot, Binding>,
    frames: Vec<Frame>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame {
            scopes: vec![HashMap::new()],
        });
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(HashMap::new());
        }
    }

    pub fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    pub fn define_global(&mut self, var: &Rc<Variable>, value: Value) {
        self.globals.insert(
            Slot::of(var),
            Binding {
                value,
                mutable: var.mutable,
            },
        );
    }

    /// Declares in the innermost scope, or globally outside of any call.
    pub fn declare(&mut self, var: &Rc<Variable>, value: Value) {
        let binding = Binding {
            value,
            mutable: var.mutable,
        };
        match self.frames.last_mut().and_then(|frame| frame.scopes.last_mut()) {
            Some(scope) => {
                scope.insert(Slot::of(var), binding);
            }
            None => {
                self.globals.insert(Slot::of(var), binding);
            }
        }
    }

    fn lookup_mut(&mut self, slot: Slot) -> Option<&mut Binding> {
        let local = self.frames.last_mut().and_then(|frame| {
            frame
                .scopes
                .iter_mut()
                .rev()
                .find_map(|scope| scope.get_mut(&slot))
        });
        match local {
            Some(binding) => Some(binding),
            None => self.globals.get_mut(&slot),
        }
    }

    pub fn get(&mut self, var: &Rc<Variable>) -> RuntimeResult<Value> {
        self.lookup_mut(Slot::of(var))
            .map(|binding| binding.value)
            .ok_or_else(|| RuntimeError::UnknownVariable {
                name: var.name.clone(),
            })
    }

    pub fn assign(&mut self, var: &Rc<Variable>, value: Value) -> RuntimeResult<()> {
        let binding =
            self.lookup_mut(Slot::of(var))
                .ok_or_else(|| RuntimeError::UnknownVariable {
                    name: var.name.clone(),
                })?;
        if !binding.mutable {
            return Err(RuntimeError::ImmutableBinding {
                name: var.name.clone(),
            });
        }
        binding.value = value;
        Ok(())
    }
}
