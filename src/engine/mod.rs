//! Interpreter engine
//!
//! Everything the boundary layer drives: typed values, the environment
//! and module model, the binary reader, and the stack-machine executor.

pub mod binary;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod features;
pub mod instr;
pub mod module;
pub mod value;

pub use binary::{read_binary, ReadBinaryOptions};
pub use environment::Environment;
pub use errors::{InvokeError, LoadError, TrapKind};
pub use executor::{ExecOutcome, Executor, ExecutorConfig, ReturnValues};
pub use features::Features;
pub use module::{DefinedModule, ModuleId};
pub use value::{Value, ValueType};

#[cfg(test)]
pub mod tests;
