use std::collections::HashMap;
use std::fmt;

/// Handle to a built-in type. Handles are positional: the registry creates types in the order
/// of the associated constants, so every integer type lies in `U8..=I64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u8);

impl TypeId {
    pub const NEVER: TypeId = TypeId(0);
    pub const EMPTY: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    pub const U8: TypeId = TypeId(3);
    pub const U16: TypeId = TypeId(4);
    pub const U32: TypeId = TypeId(5);
    pub const U64: TypeId = TypeId(6);
    pub const I8: TypeId = TypeId(7);
    pub const I16: TypeId = TypeId(8);
    pub const I32: TypeId = TypeId(9);
    pub const I64: TypeId = TypeId(10);
    pub const F32: TypeId = TypeId(11);
    pub const F64: TypeId = TypeId(12);

    pub const COUNT: usize = 13;

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    fn all() -> impl Iterator<Item = TypeId> {
        (0..Self::COUNT as u8).map(TypeId)
    }

    fn range(from: TypeId, to: TypeId) -> impl Iterator<Item = TypeId> {
        (from.0..=to.0).map(TypeId)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Never,
    Empty,
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl TypeKind {
    pub fn is_integer(self) -> bool {
        self.is_unsigned() || self.is_signed()
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, TypeKind::U8 | TypeKind::U16 | TypeKind::U32 | TypeKind::U64)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, TypeKind::I8 | TypeKind::I16 | TypeKind::I32 | TypeKind::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeKind::F32 | TypeKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits for scalar kinds; `bool` counts as one bit.
    pub fn bits(self) -> u32 {
        match self {
            TypeKind::Never | TypeKind::Empty => 0,
            TypeKind::Bool => 1,
            TypeKind::U8 | TypeKind::I8 => 8,
            TypeKind::U16 | TypeKind::I16 => 16,
            TypeKind::U32 | TypeKind::I32 | TypeKind::F32 => 32,
            TypeKind::U64 | TypeKind::I64 | TypeKind::F64 => 64,
        }
    }

    fn of(id: TypeId) -> TypeKind {
        const KINDS: [TypeKind; TypeId::COUNT] = [
            TypeKind::Never,
            TypeKind::Empty,
            TypeKind::Bool,
            TypeKind::U8,
            TypeKind::U16,
            TypeKind::U32,
            TypeKind::U64,
            TypeKind::I8,
            TypeKind::I16,
            TypeKind::I32,
            TypeKind::I64,
            TypeKind::F32,
            TypeKind::F64,
        ];
        KINDS[id.index()]
    }

    fn name(self) -> &'static str {
        match self {
            TypeKind::Never => "!",
            TypeKind::Empty => "()",
            TypeKind::Bool => "bool",
            TypeKind::U8 => "u8",
            TypeKind::U16 => "u16",
            TypeKind::U32 => "u32",
            TypeKind::U64 => "u64",
            TypeKind::I8 => "i8",
            TypeKind::I16 => "i16",
            TypeKind::I32 => "i32",
            TypeKind::I64 => "i64",
            TypeKind::F32 => "f32",
            TypeKind::F64 => "f64",
        }
    }
}

/// Semantic action attached to an operator. The resolver only carries it; backends dispatch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpAction {
    And,
    Or,
    NotBool,
    EqBool,
    NeqBool,

    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    UShr,
    SShr,
    IntEq,
    IntNeq,
    ULt,
    ULe,
    UGt,
    UGe,
    SLt,
    SLe,
    SGt,
    SGe,
    NegSInt,

    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    FEq,
    FNeq,
    FLt,
    FLe,
    FGt,
    FGe,
    NegFloat,

    SuIntToSuInt,
    SIntToSInt,
    UIntToFloat,
    SIntToFloat,
    FloatToUInt,
    FloatToSInt,
    FloatToFloat,
}

impl fmt::Display for OpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An operator of a built-in type. `TypeId::EMPTY` in an operand slot means the operator takes
/// nothing there: prefix operators have an empty first slot, postfix and conversion operators an
/// empty second slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operator {
    pub name: &'static str,
    pub first: TypeId,
    pub second: TypeId,
    pub ret: TypeId,
    pub action: OpAction,
}

impl Operator {
    pub fn is_prefix(&self) -> bool {
        self.first == TypeId::EMPTY
    }

    pub fn is_postfix(&self) -> bool {
        self.second == TypeId::EMPTY
    }

    pub fn is_infix(&self) -> bool {
        !self.is_prefix() && !self.is_postfix()
    }
}

#[derive(Clone, Debug)]
pub struct Type {
    pub id: TypeId,
    pub kind: TypeKind,
    pub name: &'static str,
    operators: HashMap<&'static str, Vec<Operator>>,
}

impl Type {
    fn new(id: TypeId) -> Self {
        let kind = TypeKind::of(id);
        Self {
            id,
            kind,
            name: kind.name(),
            operators: HashMap::new(),
        }
    }

    pub fn operators(&self, name: &str) -> &[Operator] {
        self.operators.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub const CONVERSION: &str = "as";

const INT_BINARY: [&str; 16] = [
    "+", "-", "*", "/", "%", "&", "|", "^", "<<", ">>", "==", "!=", "<", "<=", ">", ">=",
];
const FLOAT_BINARY: [&str; 11] = ["+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">="];

/// The fixed catalogue of built-in types and their operators. Built once and then only read.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    types: Vec<Type>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            types: TypeId::all().map(Type::new).collect(),
        };
        registry.register_bool();
        registry.register_integers();
        registry.register_floats();
        tracing::debug!(types = registry.types.len(), "registered builtin types");
        registry
    }

    fn add(&mut self, owner: TypeId, op: Operator) {
        self.types[owner.index()]
            .operators
            .entry(op.name)
            .or_default()
            .push(op);
    }

    fn infix(&mut self, name: &'static str, ty: TypeId, ret: TypeId, action: OpAction) {
        self.add(
            ty,
            Operator {
                name,
                first: ty,
                second: ty,
                ret,
                action,
            },
        );
    }

    fn prefix(&mut self, name: &'static str, ty: TypeId, action: OpAction) {
        self.add(
            ty,
            Operator {
                name,
                first: TypeId::EMPTY,
                second: ty,
                ret: ty,
                action,
            },
        );
    }

    fn conversion(&mut self, from: TypeId, to: TypeId, action: OpAction) {
        self.add(
            from,
            Operator {
                name: CONVERSION,
                first: from,
                second: TypeId::EMPTY,
                ret: to,
                action,
            },
        );
    }

    fn register_bool(&mut self) {
        let ty = TypeId::BOOL;
        self.infix("&&", ty, ty, OpAction::And);
        self.infix("||", ty, ty, OpAction::Or);
        self.infix("==", ty, ty, OpAction::EqBool);
        self.infix("!=", ty, ty, OpAction::NeqBool);
        self.prefix("!", ty, OpAction::NotBool);
        for to in TypeId::range(TypeId::BOOL, TypeId::F64) {
            let action = if to <= TypeId::I64 {
                OpAction::SuIntToSuInt
            } else {
                OpAction::UIntToFloat
            };
            self.conversion(ty, to, action);
        }
    }

    fn register_integers(&mut self) {
        for ty in TypeId::range(TypeId::U8, TypeId::I64) {
            let signed = self.kind(ty).is_signed();
            for name in INT_BINARY {
                let pick = |unsigned, signed_action| if signed { signed_action } else { unsigned };
                let (ret, action) = match name {
                    "+" => (ty, OpAction::Add),
                    "-" => (ty, OpAction::Sub),
                    "*" => (ty, OpAction::Mul),
                    "/" => (ty, pick(OpAction::UDiv, OpAction::SDiv)),
                    "%" => (ty, pick(OpAction::URem, OpAction::SRem)),
                    "&" => (ty, OpAction::BitAnd),
                    "|" => (ty, OpAction::BitOr),
                    "^" => (ty, OpAction::BitXor),
                    "<<" => (ty, OpAction::Shl),
                    ">>" => (ty, pick(OpAction::UShr, OpAction::SShr)),
                    "==" => (TypeId::BOOL, OpAction::IntEq),
                    "!=" => (TypeId::BOOL, OpAction::IntNeq),
                    "<" => (TypeId::BOOL, pick(OpAction::ULt, OpAction::SLt)),
                    "<=" => (TypeId::BOOL, pick(OpAction::ULe, OpAction::SLe)),
                    ">" => (TypeId::BOOL, pick(OpAction::UGt, OpAction::SGt)),
                    ">=" => (TypeId::BOOL, pick(OpAction::UGe, OpAction::SGe)),
                    other => unreachable!("unexpected integer operator {other}"),
                };
                self.infix(name, ty, ret, action);
            }
            if signed {
                self.prefix("-", ty, OpAction::NegSInt);
            }
            for to in TypeId::range(TypeId::BOOL, TypeId::F64) {
                let target = self.kind(to);
                let action = match (signed, target) {
                    (false, target) if !target.is_float() => OpAction::SuIntToSuInt,
                    (false, _) => OpAction::UIntToFloat,
                    (true, target) if target.is_signed() => OpAction::SIntToSInt,
                    (true, target) if target.is_float() => OpAction::SIntToFloat,
                    (true, _) => OpAction::SuIntToSuInt,
                };
                self.conversion(ty, to, action);
            }
        }
    }

    fn register_floats(&mut self) {
        for ty in TypeId::range(TypeId::F32, TypeId::F64) {
            for name in FLOAT_BINARY {
                let (ret, action) = match name {
                    "+" => (ty, OpAction::FAdd),
                    "-" => (ty, OpAction::FSub),
                    "*" => (ty, OpAction::FMul),
                    "/" => (ty, OpAction::FDiv),
                    "%" => (ty, OpAction::FRem),
                    "==" => (TypeId::BOOL, OpAction::FEq),
                    "!=" => (TypeId::BOOL, OpAction::FNeq),
                    "<" => (TypeId::BOOL, OpAction::FLt),
                    "<=" => (TypeId::BOOL, OpAction::FLe),
                    ">" => (TypeId::BOOL, OpAction::FGt),
                    ">=" => (TypeId::BOOL, OpAction::FGe),
                    other => unreachable!("unexpected float operator {other}"),
                };
                self.infix(name, ty, ret, action);
            }
            self.prefix("-", ty, OpAction::NegFloat);
            for to in TypeId::range(TypeId::BOOL, TypeId::F64) {
                let target = self.kind(to);
                let action = if target.is_float() {
                    OpAction::FloatToFloat
                } else if target.is_signed() {
                    OpAction::FloatToSInt
                } else {
                    OpAction::FloatToUInt
                };
                self.conversion(ty, to, action);
            }
        }
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.get(id).kind
    }

    pub fn name(&self, id: TypeId) -> &'static str {
        self.get(id).name
    }

    /// Display name for an optional type; unresolved types print as `?`.
    pub fn describe(&self, id: Option<TypeId>) -> String {
        id.map_or_else(|| "?".to_string(), |id| self.name(id).to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    pub fn lookup_prefix(&self, ty: TypeId, name: &str) -> Option<&Operator> {
        self.get(ty).operators(name).iter().find(|op| op.is_prefix())
    }

    pub fn lookup_postfix(&self, ty: TypeId, name: &str) -> Option<&Operator> {
        if name == CONVERSION {
            return None;
        }
        self.get(ty).operators(name).iter().find(|op| op.is_postfix())
    }

    pub fn lookup_infix_candidates(&self, ty: TypeId, name: &str) -> Vec<&Operator> {
        self.get(ty)
            .operators(name)
            .iter()
            .filter(|op| op.is_infix())
            .collect()
    }

    pub fn lookup_conversion(&self, from: TypeId, to: TypeId) -> Option<&Operator> {
        self.get(from)
            .operators(CONVERSION)
            .iter()
            .find(|op| op.ret == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_types_are_contiguous() {
        let registry = TypeRegistry::builtin();
        let integers: Vec<_> = registry
            .iter()
            .filter(|ty| ty.kind.is_integer())
            .map(|ty| ty.id)
            .collect();
        assert_eq!(integers.first(), Some(&TypeId::U8));
        assert_eq!(integers.last(), Some(&TypeId::I64));
        assert_eq!(integers.len(), 8);
        assert_eq!(registry.name(TypeId::NEVER), "!");
        assert_eq!(registry.name(TypeId::EMPTY), "()");
    }

    #[test]
    fn operators_are_classified_structurally() {
        let registry = TypeRegistry::builtin();
        let neg = registry.lookup_prefix(TypeId::I32, "-").expect("signed negation");
        assert_eq!(neg.action, OpAction::NegSInt);
        assert!(registry.lookup_prefix(TypeId::U32, "-").is_none());
        assert!(registry.lookup_postfix(TypeId::I32, "-").is_none());

        let candidates = registry.lookup_infix_candidates(TypeId::U16, ">>");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].action, OpAction::UShr);
        assert_eq!(candidates[0].second, TypeId::U16);

        let lt = registry.lookup_infix_candidates(TypeId::F32, "<");
        assert_eq!(lt[0].ret, TypeId::BOOL);
        assert!(registry.lookup_infix_candidates(TypeId::F64, "&").is_empty());
    }

    #[test]
    fn conversions_pick_action_by_target() {
        let registry = TypeRegistry::builtin();
        let action = |from, to| registry.lookup_conversion(from, to).map(|op| op.action);
        assert_eq!(action(TypeId::I8, TypeId::I64), Some(OpAction::SIntToSInt));
        assert_eq!(action(TypeId::I8, TypeId::U64), Some(OpAction::SuIntToSuInt));
        assert_eq!(action(TypeId::U32, TypeId::F32), Some(OpAction::UIntToFloat));
        assert_eq!(action(TypeId::F64, TypeId::U8), Some(OpAction::FloatToUInt));
        assert_eq!(action(TypeId::F64, TypeId::BOOL), Some(OpAction::FloatToUInt));
        assert_eq!(action(TypeId::BOOL, TypeId::I32), Some(OpAction::SuIntToSuInt));
        assert_eq!(action(TypeId::I32, TypeId::EMPTY), None);
        assert_eq!(action(TypeId::EMPTY, TypeId::I32), None);
    }
}
