//! Engine errors
//!
//! Two families: `LoadError` for everything the binary reader can reject,
//! and `TrapKind`/`InvokeError` for faults during export invocation. All of
//! them are reported, never thrown across the boundary.

use thiserror::Error;

use crate::engine::value::ValueType;

/// Errors from decoding a binary module
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Bad magic number")]
    BadMagic,

    #[error("Unsupported binary version: {0}")]
    BadVersion(u32),

    #[error("Unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("Trailing bytes after last section at offset {0}")]
    TrailingBytes(usize),

    #[error("Section {id} exceeds its declared size")]
    SectionOverrun { id: u8 },

    #[error("Malformed {what} at offset {offset}")]
    Malformed { what: &'static str, offset: usize },

    #[error("Unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("Opcode 0x{opcode:02x} requires the {feature} feature")]
    FeatureDisabled { opcode: u8, feature: &'static str },

    #[error("Type index {0} out of range")]
    TypeIndexOutOfRange(u32),

    #[error("Function index {0} out of range")]
    FuncIndexOutOfRange(u32),

    #[error("Function {0} declared multiple results without the multi_value feature")]
    MultiValueDisabled(u32),

    #[error("Unknown import: {module}.{field}")]
    UnknownImport { module: String, field: String },

    #[error("Unsupported import kind for {module}.{field}")]
    UnsupportedImport { module: String, field: String },

    #[error("Import {module}.{field} does not match the declared signature")]
    ImportTypeMismatch { module: String, field: String },
}

/// A runtime fault that aborts the current call
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    #[error("unreachable executed")]
    Unreachable,

    #[error("integer divide by zero")]
    IntegerDivideByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("call stack exhausted")]
    CallStackExhausted,

    #[error("value stack exhausted")]
    ValueStackExhausted,

    #[error("type mismatch on operand stack")]
    TypeMismatch,

    #[error("local index out of range")]
    InvalidLocalIndex,
}

/// Why an export invocation did not complete normally
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("module handle out of range")]
    InvalidModule,

    #[error("unknown export: {0:?}")]
    UnknownExport(String),

    #[error("export {0:?} is not a function")]
    NotAFunction(String),

    #[error("signature mismatch: expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("signature mismatch: argument {index} expected {expected}, got {got}")]
    ArgumentTypeMismatch {
        index: usize,
        expected: ValueType,
        got: ValueType,
    },

    #[error("trap in {func}: {kind}")]
    Trap { kind: TrapKind, func: String },
}
