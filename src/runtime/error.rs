use thiserror::Error;

/// Errors raised while evaluating a program.
///
/// Never recovered inside the evaluator: they unwind through every enclosing
/// statement until the host catches them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("'{name}' is not a class instance")]
    NotAnInstance { name: String },
    #[error("Cannot call method '{method}' on a value of type {type_name}")]
    MethodCallOnNonInstance {
        method: String,
        type_name: &'static str,
    },
    #[error("Method '{method}' not found in class '{class}'")]
    UnknownMethod { method: String, class: String },
    #[error("Method '{method}' expected {expected} arguments, got {found}")]
    MethodArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("Operation '{operation}' is not supported for types {lhs} and {rhs}")]
    UnsupportedOperands {
        operation: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Expected a Bool value in {context}, got {got}")]
    ExpectedBool {
        context: &'static str,
        got: &'static str,
    },
    #[error("Expected a Bool result from '{method}', got {got}")]
    NonBoolDunderResult {
        method: &'static str,
        got: &'static str,
    },
    #[error("zero division")]
    ZeroDivision,
    #[error("Failed to write to the output stream")]
    OutputStream(#[from] std::fmt::Error),
}
