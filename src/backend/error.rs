use crate::language::types::OpAction;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("division by zero in `{action}`")]
    DivisionByZero { action: OpAction },
    #[error("operation `{action}` not supported for {operands}")]
    Unsupported { action: OpAction, operands: String },
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
    #[error("immutable binding `{name}` cannot be reassigned")]
    ImmutableBinding { name: String },
    #[error("call depth limit of {limit} exceeded while calling `{name}`")]
    CallDepth { name: String, limit: usize },
    #[error("function `{name}` has no body")]
    MissingBody { name: String },
    #[error("parameter {position} of `{name}` received no value")]
    MissingArgument { name: String, position: usize },
    #[error("no `main` callable without arguments")]
    MissingEntry,
    #[error("unresolved {what} reached at run time")]
    Unresolved { what: &'static str },
}
