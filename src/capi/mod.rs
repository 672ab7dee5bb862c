//! C-callable boundary
//!
//! The stable surface a host process drives the engine through: opaque
//! handles with explicit create/destroy pairs, a fixed-layout tagged value
//! union, and a two-valued result code. No exception or panic ever crosses
//! these functions; every fallible operation reports through `ResultCode`
//! plus the caller-owned diagnostics sink.
//!
//! Ownership at a glance:
//!
//! - Environment, Executor, ExecResult, Errors, Script, TextModule:
//!   caller-owned, one create paired with one destroy.
//! - DefinedModule: owned by its environment; the handle returned by
//!   `wasmgate_read_binary` is valid exactly as long as that environment.
//! - Executor → Environment is a non-owning back-reference; the caller
//!   orders destruction.

pub mod exec;
pub mod handles;
pub mod resolve;
pub mod value;

pub use exec::ExecResult;
pub use handles::BoundExecutor;
pub use value::{decode, encode, ResultCode, TypedValue, ValuePayload, ValueTag};

#[cfg(test)]
mod tests;
