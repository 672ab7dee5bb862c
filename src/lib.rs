//! wasmgate
//!
//! An embeddable WebAssembly bytecode interpreter behind a stable,
//! C-callable boundary. A host process creates an environment, loads
//! binary modules into it, binds an executor, and invokes exports with
//! typed arguments; a script frontend with a name-resolution pass is
//! exposed alongside for driving textual test scripts.
//!
//! # Example
//!
//! ```no_run
//! use wasmgate::{run_binary_export, Value};
//!
//! fn main() -> wasmgate::Result<()> {
//!     let wasm = std::fs::read("add.wasm")?;
//!     let results = run_binary_export(&wasm, "add", &[Value::I32(2), Value::I32(3)])?;
//!     println!("{:?}", results);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/wasmgate")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod capi;
pub mod engine;
pub mod text;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use engine::{
    Environment, Executor, Features, InvokeError, LoadError, ReadBinaryOptions, TrapKind, Value,
    ValueType,
};
pub use util::Errors;

use tracing::debug;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "wasmgate";

/// Load a binary module into a fresh environment and run one export.
///
/// Convenience wrapper over the environment/executor API for hosts that
/// need exactly one call.
pub fn run_binary_export(
    wasm: &[u8],
    name: &str,
    args: &[Value],
) -> Result<Vec<Value>> {
    let mut env = Environment::new();
    let mut errors = Errors::new();
    let options = ReadBinaryOptions {
        read_debug_names: true,
        ..ReadBinaryOptions::default()
    };
    debug!("loading {} byte(s)", wasm.len());
    let module = engine::read_binary(&mut env, wasm, &options, &mut errors)
        .map_err(|_| anyhow::anyhow!("failed to load module:\n{}", errors.format()))?;

    let mut executor = Executor::new();
    let values = executor
        .run_export(&env, module, name, args)
        .with_context(|| format!("failed to run export {:?}", name))?;
    Ok(values.into_vec())
}

/// Parse a script and run its name-resolution pass, collecting diagnostics.
///
/// Returns the formatted diagnostics on failure.
pub fn check_script(source: &str) -> Result<()> {
    let mut script = text::parse_script(source).context("failed to parse script")?;
    let mut errors = Errors::new();
    debug!("resolving {} command(s)", script.commands.len());
    text::resolve_script(&mut script, &mut errors)
        .map_err(|_| anyhow::anyhow!("resolution failed:\n{}", errors.format()))?;
    Ok(())
}
