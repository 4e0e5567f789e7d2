use super::error::{RuntimeError, RuntimeResult};
use crate::language::{
    ast::{Literal, LiteralValue},
    types::{OpAction, TypeKind},
};
use std::fmt;

/// A typed scalar. Integer arithmetic works on the two's complement bits widened to 64 bits
/// (sign-extended for signed types) and truncates back to the value's own width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> TypeKind {
        match self {
            Value::Unit => TypeKind::Empty,
            Value::Bool(_) => TypeKind::Bool,
            Value::U8(_) => TypeKind::U8,
            Value::U16(_) => TypeKind::U16,
            Value::U32(_) => TypeKind::U32,
            Value::U64(_) => TypeKind::U64,
            Value::I8(_) => TypeKind::I8,
            Value::I16(_) => TypeKind::I16,
            Value::I32(_) => TypeKind::I32,
            Value::I64(_) => TypeKind::I64,
            Value::F32(_) => TypeKind::F32,
            Value::F64(_) => TypeKind::F64,
        }
    }

    pub fn from_literal(literal: &Literal, kind: TypeKind) -> Value {
        match literal.value {
            LiteralValue::Bool(value) => Value::Bool(value),
            LiteralValue::Int(bits) => Value::from_bits(kind, bits),
            LiteralValue::Float(value) => Value::from_f64(kind, value),
        }
    }

    /// Truncates `bits` to `kind`. Booleans test for nonzero; floats read the bits as unsigned.
    pub fn from_bits(kind: TypeKind, bits: u64) -> Value {
        match kind {
            TypeKind::Never | TypeKind::Empty => Value::Unit,
            TypeKind::Bool => Value::Bool(bits != 0),
            TypeKind::U8 => Value::U8(bits as u8),
            TypeKind::U16 => Value::U16(bits as u16),
            TypeKind::U32 => Value::U32(bits as u32),
            TypeKind::U64 => Value::U64(bits),
            TypeKind::I8 => Value::I8(bits as i8),
            TypeKind::I16 => Value::I16(bits as i16),
            TypeKind::I32 => Value::I32(bits as i32),
            TypeKind::I64 => Value::I64(bits as i64),
            TypeKind::F32 => Value::F32(bits as f32),
            TypeKind::F64 => Value::F64(bits as f64),
        }
    }

    /// Converts with `as` semantics: integers saturate, NaN becomes zero.
    pub fn from_f64(kind: TypeKind, value: f64) -> Value {
        match kind {
            TypeKind::Never | TypeKind::Empty => Value::Unit,
            TypeKind::Bool => Value::Bool(value != 0.0),
            TypeKind::U8 => Value::U8(value as u8),
            TypeKind::U16 => Value::U16(value as u16),
            TypeKind::U32 => Value::U32(value as u32),
            TypeKind::U64 => Value::U64(value as u64),
            TypeKind::I8 => Value::I8(value as i8),
            TypeKind::I16 => Value::I16(value as i16),
            TypeKind::I32 => Value::I32(value as i32),
            TypeKind::I64 => Value::I64(value as i64),
            TypeKind::F32 => Value::F32(value as f32),
            TypeKind::F64 => Value::F64(value),
        }
    }

    /// Widened bits of a boolean or integer.
    pub fn int_bits(&self) -> Option<u64> {
        match *self {
            Value::Bool(value) => Some(u64::from(value)),
            Value::U8(value) => Some(u64::from(value)),
            Value::U16(value) => Some(u64::from(value)),
            Value::U32(value) => Some(u64::from(value)),
            Value::U64(value) => Some(value),
            Value::I8(value) => Some(i64::from(value) as u64),
            Value::I16(value) => Some(i64::from(value) as u64),
            Value::I32(value) => Some(i64::from(value) as u64),
            Value::I64(value) => Some(value as u64),
            Value::Unit | Value::F32(_) | Value::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(value) => Some(f64::from(value)),
            Value::F64(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// Process exit status for a program result. Only integers carry one.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            kind if kind.is_integer() => self.int_bits().map_or(0, |bits| bits as i32),
            _ => 0,
        }
    }

    fn unsupported(&self, action: OpAction, other: Option<&Value>) -> RuntimeError {
        let operands = match other {
            Some(other) => format!("{} and {}", self.type_name(), other.type_name()),
            None => self.type_name().to_string(),
        };
        RuntimeError::Unsupported { action, operands }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "()",
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
        }
    }

    pub fn unary(self, action: OpAction) -> RuntimeResult<Value> {
        match (action, self) {
            (OpAction::NotBool, Value::Bool(value)) => Ok(Value::Bool(!value)),
            (OpAction::NegSInt, _) if self.kind().is_signed() => {
                let bits = self.int_bits().unwrap_or_default();
                Ok(Value::from_bits(self.kind(), bits.wrapping_neg()))
            }
            (OpAction::NegFloat, _) => match self.as_f64() {
                Some(value) => Ok(Value::from_f64(self.kind(), -value)),
                None => Err(self.unsupported(action, None)),
            },
            _ => Err(self.unsupported(action, None)),
        }
    }

    pub fn binary(self, action: OpAction, rhs: Value) -> RuntimeResult<Value> {
        if self.kind() != rhs.kind() {
            return Err(self.unsupported(action, Some(&rhs)));
        }
        if let (Some(a), Some(b)) = (self.as_f64(), rhs.as_f64()) {
            return self.float_binary(action, a, b, &rhs);
        }
        match (self.int_bits(), rhs.int_bits()) {
            (Some(a), Some(b)) => self.int_binary(action, a, b, &rhs),
            _ => Err(self.unsupported(action, Some(&rhs))),
        }
    }

    fn int_binary(self, action: OpAction, a: u64, b: u64, rhs: &Value) -> RuntimeResult<Value> {
        let kind = self.kind();
        let shift = (b & u64::from(kind.bits().saturating_sub(1))) as u32;
        let zero = || RuntimeError::DivisionByZero { action };
        let bits = match action {
            OpAction::Add => a.wrapping_add(b),
            OpAction::Sub => a.wrapping_sub(b),
            OpAction::Mul => a.wrapping_mul(b),
            OpAction::UDiv => a.checked_div(b).ok_or_else(zero)?,
            OpAction::URem => a.checked_rem(b).ok_or_else(zero)?,
            OpAction::SDiv | OpAction::SRem if b == 0 => return Err(zero()),
            OpAction::SDiv => (a as i64).wrapping_div(b as i64) as u64,
            OpAction::SRem => (a as i64).wrapping_rem(b as i64) as u64,
            OpAction::BitAnd => a & b,
            OpAction::BitOr => a | b,
            OpAction::BitXor => a ^ b,
            OpAction::Shl => a << shift,
            OpAction::UShr => a >> shift,
            OpAction::SShr => ((a as i64) >> shift) as u64,
            OpAction::And => return Ok(Value::Bool(a != 0 && b != 0)),
            OpAction::Or => return Ok(Value::Bool(a != 0 || b != 0)),
            OpAction::IntEq | OpAction::EqBool => return Ok(Value::Bool(a == b)),
            OpAction::IntNeq | OpAction::NeqBool => return Ok(Value::Bool(a != b)),
            OpAction::ULt => return Ok(Value::Bool(a < b)),
            OpAction::ULe => return Ok(Value::Bool(a <= b)),
            OpAction::UGt => return Ok(Value::Bool(a > b)),
            OpAction::UGe => return Ok(Value::Bool(a >= b)),
            OpAction::SLt => return Ok(Value::Bool((a as i64) < (b as i64))),
            OpAction::SLe => return Ok(Value::Bool((a as i64) <= (b as i64))),
            OpAction::SGt => return Ok(Value::Bool((a as i64) > (b as i64))),
            OpAction::SGe => return Ok(Value::Bool((a as i64) >= (b as i64))),
            _ => return Err(self.unsupported(action, Some(rhs))),
        };
        Ok(Value::from_bits(kind, bits))
    }

    fn float_binary(self, action: OpAction, a: f64, b: f64, rhs: &Value) -> RuntimeResult<Value> {
        let value = match action {
            OpAction::FAdd => a + b,
            OpAction::FSub => a - b,
            OpAction::FMul => a * b,
            OpAction::FDiv => a / b,
            OpAction::FRem => a % b,
            OpAction::FEq => return Ok(Value::Bool(a == b)),
            OpAction::FNeq => return Ok(Value::Bool(a != b)),
            OpAction::FLt => return Ok(Value::Bool(a < b)),
            OpAction::FLe => return Ok(Value::Bool(a <= b)),
            OpAction::FGt => return Ok(Value::Bool(a > b)),
            OpAction::FGe => return Ok(Value::Bool(a >= b)),
            _ => return Err(self.unsupported(action, Some(rhs))),
        };
        Ok(Value::from_f64(self.kind(), value))
    }

    /// Applies a conversion operator. Integer sources extend by their own signedness before
    /// truncating to the target.
    pub fn convert(self, action: OpAction, target: TypeKind) -> RuntimeResult<Value> {
        match action {
            OpAction::SuIntToSuInt | OpAction::SIntToSInt | OpAction::UIntToFloat => self
                .int_bits()
                .map(|bits| Value::from_bits(target, bits))
                .ok_or_else(|| self.unsupported(action, None)),
            OpAction::SIntToFloat => {
                let bits = self.int_bits().ok_or_else(|| self.unsupported(action, None))?;
                Ok(match target {
                    TypeKind::F32 => Value::F32(bits as i64 as f32),
                    _ => Value::from_f64(target, bits as i64 as f64),
                })
            }
            OpAction::FloatToUInt | OpAction::FloatToSInt | OpAction::FloatToFloat => self
                .as_f64()
                .map(|value| Value::from_f64(target, value))
                .ok_or_else(|| self.unsupported(action, None)),
            _ => Err(self.unsupported(action, None)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::U8(value) => write!(f, "{value}"),
            Value::U16(value) => write!(f, "{value}"),
            Value::U32(value) => write!(f, "{value}"),
            Value::U64(value) => write!(f, "{value}"),
            Value::I8(value) => write!(f, "{value}"),
            Value::I16(value) => write!(f, "{value}"),
            Value::I32(value) => write!(f, "{value}"),
            Value::I64(value) => write!(f, "{value}"),
            Value::F32(value) => write!(f, "{value:?}"),
            Value::F64(value) => write!(f, "{value:?}"),
        }
    }
}
