//! Consumers of a resolved unit.

pub mod environment;
pub mod error;
pub mod interpreter;
pub mod printer;
pub mod value;

use crate::language::parser::Unit;

pub use error::{RuntimeError, RuntimeResult};
pub use interpreter::Interpreter;
pub use printer::TreePrinter;

/// Lowers a unit that resolved without diagnostics. Returns whether lowering succeeded.
pub trait Backend {
    fn lower(&mut self, unit: &Unit) -> bool;
}
