//! Handle lifecycle
//!
//! Every engine object a host can hold is an opaque pointer to a distinct
//! Rust type, created by `Box::into_raw` and released by `Box::from_raw`.
//! One create pairs with exactly one destroy; nothing here is reference
//! counted or runtime-checked. The executor keeps a non-owning back
//! pointer to its environment and must never be used after that
//! environment is destroyed; that invariant belongs to the caller.

use tracing::debug;

use crate::capi::exec::ExecResult;
use crate::engine::environment::Environment;
use crate::engine::executor::Executor;
use crate::util::Errors;

/// An executor bound to its environment
///
/// The environment pointer is a back-reference only; destroying the
/// executor never touches the environment.
pub struct BoundExecutor {
    pub(crate) env: *mut Environment,
    pub(crate) executor: Executor,
}

/// Allocate a fresh, empty environment. Never fails.
#[no_mangle]
pub extern "C" fn wasmgate_create_env() -> *mut Environment {
    debug!("create environment");
    Box::into_raw(Box::new(Environment::new()))
}

/// Release an environment and, transitively, every module it owns.
///
/// # Safety
///
/// `env` must come from `wasmgate_create_env` and must not be used again;
/// no executor bound to it may be used afterwards either.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_env(env: *mut Environment) {
    debug!("destroy environment");
    drop(Box::from_raw(env));
}

/// Bind a new executor to an environment.
///
/// # Safety
///
/// `env` must be a live environment handle.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_create_executor(
    env: *mut Environment
) -> *mut BoundExecutor {
    Box::into_raw(Box::new(BoundExecutor {
        env,
        executor: Executor::new(),
    }))
}

/// Release executor-local state only; the environment is untouched.
///
/// # Safety
///
/// `executor` must come from `wasmgate_create_executor` and must not be
/// used again.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_executor(executor: *mut BoundExecutor) {
    drop(Box::from_raw(executor));
}

/// Release an invocation result and its return-value storage.
///
/// # Safety
///
/// `result` must come from `wasmgate_run_export`, exactly once per result.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_exec_result(result: *mut ExecResult) {
    drop(Box::from_raw(result));
}

/// Allocate an empty diagnostics sink. The caller owns it.
#[no_mangle]
pub extern "C" fn wasmgate_new_errors() -> *mut Errors {
    Box::into_raw(Box::new(Errors::new()))
}

/// Release a diagnostics sink.
///
/// # Safety
///
/// `errors` must come from `wasmgate_new_errors` and must not be used again.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_errors(errors: *mut Errors) {
    drop(Box::from_raw(errors));
}

/// Number of diagnostics accumulated so far.
///
/// # Safety
///
/// `errors` must be a live sink handle.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_errors_count(errors: *const Errors) -> usize {
    (*errors).len()
}

/// Message text of the diagnostic at `index`, valid until the sink is
/// appended to or destroyed. Null when `index` is out of range.
///
/// # Safety
///
/// `errors` must be a live sink handle and `len_out` writable.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_errors_message(
    errors: *const Errors,
    index: usize,
    len_out: *mut usize,
) -> *const u8 {
    match (*errors).get(index) {
        Some(diagnostic) => {
            *len_out = diagnostic.message.len();
            diagnostic.message.as_ptr()
        }
        None => {
            *len_out = 0;
            std::ptr::null()
        }
    }
}
