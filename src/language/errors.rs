use crate::language::span::Span;
use miette::SourceSpan;
use thiserror::Error;

/// Every message the front end can emit. The variant fields are the positional arguments of the
/// message template.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageKind {
    #[error("missing main function")]
    MissingMain,
    #[error("unknown start of token")]
    UnknownToken,
    #[error("expected token '{expected}', but found '{found}'")]
    UnexpectedToken {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected expression, but found '{found}'")]
    ExpectedExpression { found: &'static str },
    #[error("expected type, but found '{found}'")]
    ExpectedType { found: &'static str },
    #[error("const cannot be mutable")]
    ConstMut,
    #[error("expected type '{expected}', but found type '{found}'")]
    TypeMismatch { expected: String, found: String },
    #[error("cannot initialize const with non literal values")]
    ConstInitializer,
    #[error("label name must be a valid name-identifier")]
    LabelDeclName,
    #[error("label declaration must be followed by a colon")]
    LabelDeclColon,
    #[error("no label found with the name '{name}'")]
    LabelNotFound { name: String },
    #[error("label reference must be a valid name-identifier, 'loop', 'while', 'if' or 'else'")]
    LabelRefName,
    #[error("invalid item starter")]
    InvalidItem,
    #[error("invalid pattern")]
    InvalidPattern,
    #[error("type '{name}' is unknown")]
    UnknownType { name: String },
    #[error("'{digit}' is not a valid digit in a {base} number")]
    InvalidDigit { digit: char, base: &'static str },
    #[error("'{suffix}' is not a valid integer suffix")]
    IntSuffix { suffix: String },
    #[error("'{suffix}' is not a valid float suffix")]
    FloatSuffix { suffix: String },
    #[error("cannot return type '{ty}' from block '{block}'")]
    ReturnType { ty: String, block: String },
    #[error("return type '{found}' does not match previously declared type '{expected}'")]
    ReturnTypeMismatch { found: String, expected: String },
    #[error("return outside of a block")]
    ReturnOutsideBlock,
    #[error("cannot break block '{block}' with type '{ty}'")]
    BreakType { block: String, ty: String },
    #[error("breaking block '{block}' with type '{ty}' that is different from the one used previously")]
    BreakTypeMismatch { block: String, ty: String },
    #[error("break outside of a block")]
    BreakOutsideBlock,
    #[error("block implicitly returns '{found}', but expected type '{expected}'")]
    BlockReturnEmpty { found: String, expected: String },
    #[error("cannot return '{ty}' from an incomplete if expression")]
    IncompleteIf { ty: String },
    #[error("cannot find variable '{name}' in this scope")]
    VariableNotFound { name: String },
    #[error("cannot find function '{name}' in this scope")]
    FunctionNotFound { name: String },
    #[error("no function matches")]
    NoFunctionMatch,
    #[error("{count} overloaded functions match")]
    FunctionAmbiguity { count: usize },
    #[error("type '{ty}' has no operator '{op}'")]
    NoOperator { ty: String, op: String },
    #[error("type in function parameters has to be declared")]
    FunctionParamType,
    #[error("parameter '{name}' already present in the parameter list")]
    ParamRedefinition { name: String },
    #[error("type annotation needed")]
    TypeAnnotation,
    #[error("missing final expression from a block with non empty return type")]
    MissingFinalExpression,
    #[error("no existing operator '{op}' between '{left}' and '{right}'")]
    InfixOperatorNotFound {
        op: String,
        left: String,
        right: String,
    },
    #[error("invalid left-hand side of assignment")]
    InvalidLeftAssign,
    #[error("cannot assign twice to immutable variable '{name}'")]
    AssignImmutable { name: String },
    #[error("no known conversion from '{from}' to '{to}'")]
    NoConversion { from: String, to: String },
    #[error("cannot declare a function inside a block")]
    FunctionInsideBlock,
    #[error("a function with the same signature has already been declared")]
    DuplicateFunction,
    #[error("type '!' cannot be assigned to any value")]
    NoReturnAssignment,
    #[error("final expression is not allowed inside a loop/while block")]
    ExpressionNotAllowed,
    #[error("argument '{name}' already specified")]
    ParamAlreadyMatched { name: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Type,
    Name,
    ControlFlow,
    Declaration,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax error",
            ErrorCategory::Type => "type error",
            ErrorCategory::Name => "unresolved name",
            ErrorCategory::ControlFlow => "control-flow error",
            ErrorCategory::Declaration => "declaration error",
        }
    }
}

impl MessageKind {
    pub fn category(&self) -> ErrorCategory {
        use MessageKind::*;
        match self {
            UnknownToken | UnexpectedToken { .. } | ExpectedExpression { .. }
            | ExpectedType { .. } | LabelDeclName | LabelDeclColon | LabelRefName
            | InvalidItem | InvalidPattern | InvalidDigit { .. } => ErrorCategory::Syntax,
            TypeMismatch { .. }
            | UnknownType { .. }
            | IntSuffix { .. }
            | FloatSuffix { .. }
            | NoFunctionMatch
            | FunctionAmbiguity { .. }
            | NoOperator { .. }
            | TypeAnnotation
            | InfixOperatorNotFound { .. }
            | InvalidLeftAssign
            | AssignImmutable { .. }
            | NoConversion { .. }
            | NoReturnAssignment
            | ParamAlreadyMatched { .. } => ErrorCategory::Type,
            LabelNotFound { .. } | VariableNotFound { .. } | FunctionNotFound { .. } => {
                ErrorCategory::Name
            }
            ReturnType { .. }
            | ReturnTypeMismatch { .. }
            | ReturnOutsideBlock
            | BreakType { .. }
            | BreakTypeMismatch { .. }
            | BreakOutsideBlock
            | BlockReturnEmpty { .. }
            | IncompleteIf { .. }
            | MissingFinalExpression
            | ExpressionNotAllowed => ErrorCategory::ControlFlow,
            MissingMain | ConstMut | ConstInitializer | FunctionParamType
            | ParamRedefinition { .. } | FunctionInsideBlock | DuplicateFunction => {
                ErrorCategory::Declaration
            }
        }
    }

    pub fn help(&self) -> Option<&'static str> {
        match self {
            MessageKind::MissingMain => Some("declare `fn main() { ... }` in this file"),
            MessageKind::IncompleteIf { .. } => {
                Some("add an `else` branch producing the same type")
            }
            MessageKind::AssignImmutable { .. } => Some("declare the binding with `let mut`"),
            MessageKind::TypeAnnotation => Some("conversions need a concrete target type"),
            MessageKind::FunctionAmbiguity { .. } => {
                Some("give the call an expected type or use named arguments")
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: MessageKind,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: MessageKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn to_source_span(&self) -> SourceSpan {
        self.span.to_source_span()
    }
}

/// Accumulates diagnostics in the order they were posted.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: MessageKind, span: Span) {
        tracing::trace!(%kind, start = span.start, end = span.end, "diagnostic");
        self.entries.push(Diagnostic::new(kind, span));
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.entries.extend(diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn kinds(&self) -> Vec<&MessageKind> {
        self.entries.iter().map(|diag| &diag.kind).collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_substitute_arguments() {
        let kind = MessageKind::InfixOperatorNotFound {
            op: "+".into(),
            left: "i32".into(),
            right: "bool".into(),
        };
        assert_eq!(
            kind.to_string(),
            "no existing operator '+' between 'i32' and 'bool'"
        );
        assert_eq!(
            MessageKind::FunctionAmbiguity { count: 2 }.to_string(),
            "2 overloaded functions match"
        );
    }

    #[test]
    fn sink_keeps_posting_order() {
        let mut sink = Diagnostics::new();
        sink.report(MessageKind::InvalidItem, Span::new(0, 1));
        sink.report(MessageKind::MissingMain, Span::point(0));
        assert_eq!(
            sink.kinds(),
            vec![&MessageKind::InvalidItem, &MessageKind::MissingMain]
        );
        assert_eq!(MessageKind::MissingMain.category(), ErrorCategory::Declaration);
    }
}
