//! Execution bridge
//!
//! Binary loading and export invocation across the boundary. No panic
//! escapes these functions: engine faults are caught and folded into the
//! error protocol before control returns to the host.

use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

use smallvec::SmallVec;
use tracing::debug;

use crate::capi::handles::BoundExecutor;
use crate::capi::value::{decode, encode, ResultCode, TypedValue};
use crate::engine::binary::{read_binary, ReadBinaryOptions};
use crate::engine::errors::InvokeError;
use crate::engine::executor::ReturnValues;
use crate::engine::module::DefinedModule;
use crate::engine::value::Value;
use crate::engine::Environment;
use crate::util::Errors;

/// Outcome of one export invocation: status plus the ordered return values
///
/// Owned by the caller via handle once returned from `wasmgate_run_export`;
/// destroying it releases the return-value storage.
pub struct ExecResult {
    status: ResultCode,
    values: ReturnValues,
    message: String,
}

impl ExecResult {
    fn ok(values: ReturnValues) -> ExecResult {
        ExecResult {
            status: ResultCode::Ok,
            values,
            message: String::new(),
        }
    }

    fn error(message: String) -> ExecResult {
        ExecResult {
            status: ResultCode::Error,
            values: ReturnValues::new(),
            message,
        }
    }
}

/// Decode a binary module into the environment.
///
/// On success writes the module handle (owned by the environment, never
/// freed by the caller) to `out_module`. On failure appends to `errors`,
/// leaves the environment unchanged, and `out_module` is not written.
/// `read_debug_names` retains the `name` section for richer diagnostics.
///
/// # Safety
///
/// `env` and `errors` must be live handles, `data` must point to `size`
/// readable bytes, and `out_module` must be writable.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_read_binary(
    env: *mut Environment,
    data: *const u8,
    size: usize,
    read_debug_names: c_int,
    errors: *mut Errors,
    out_module: *mut *mut DefinedModule,
) -> ResultCode {
    let bytes = if size == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(data, size)
    };
    let options = ReadBinaryOptions {
        read_debug_names: read_debug_names != 0,
        ..ReadBinaryOptions::default()
    };
    let env = &mut *env;
    let errors = &mut *errors;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        read_binary(env, bytes, &options, errors)
    }));
    match outcome {
        Ok(Ok(id)) => {
            // Loaded modules always have a stable address
            *out_module = env.module_ptr(id).unwrap_or(ptr::null_mut());
            ResultCode::Ok
        }
        Ok(Err(_)) => ResultCode::Error,
        Err(_) => {
            errors.error("internal error while reading binary module");
            ResultCode::Error
        }
    }
}

/// Invoke an export by name.
///
/// Always returns a non-null result handle; inspect its status before
/// trusting the return values. Unknown exports, signature mismatches, and
/// traps are all reported through the status, not as boundary failures.
/// Blocks until the export completes or traps.
///
/// # Safety
///
/// `executor` and `module` must be live handles whose environment is still
/// alive, `name` must point to `name_len` readable bytes, and `args` to
/// `argc` readable values. No other call may be running on this executor.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_run_export(
    executor: *mut BoundExecutor,
    module: *mut DefinedModule,
    name: *const u8,
    name_len: usize,
    args: *const TypedValue,
    argc: usize,
) -> *mut ExecResult {
    let bound = &mut *executor;
    let env = &*bound.env;
    let module_id = (*module).id;

    let name_bytes = if name_len == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(name, name_len)
    };
    let raw_args = if argc == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(args, argc)
    };
    let mut args: SmallVec<[Value; 4]> = SmallVec::with_capacity(argc);
    for value in raw_args {
        args.push(decode(*value));
    }

    let outcome = match std::str::from_utf8(name_bytes) {
        // Export names are UTF-8; anything else cannot match any export
        Err(_) => Ok(Err(InvokeError::UnknownExport(
            String::from_utf8_lossy(name_bytes).into_owned(),
        ))),
        Ok(name) => panic::catch_unwind(AssertUnwindSafe(|| {
            bound.executor.run_export(env, module_id, name, &args)
        })),
    };

    let result = match outcome {
        Ok(Ok(values)) => ExecResult::ok(values),
        Ok(Err(err)) => {
            debug!("run_export failed: {}", err);
            ExecResult::error(err.to_string())
        }
        Err(_) => ExecResult::error("internal error during export invocation".to_string()),
    };
    Box::into_raw(Box::new(result))
}

/// `Ok` iff the call completed without trapping and with a matching
/// signature.
///
/// # Safety
///
/// `result` must be a live result handle.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_exec_result_get_result(
    result: *const ExecResult
) -> ResultCode {
    (*result).status
}

/// Number of return values.
///
/// # Safety
///
/// `result` must be a live result handle.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_exec_result_get_return_size(
    result: *const ExecResult
) -> usize {
    (*result).values.len()
}

/// The return value at `index`. `index` must be less than the return size.
///
/// # Safety
///
/// `result` must be a live result handle and `index` in range.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_exec_result_get_return(
    result: *const ExecResult,
    index: usize,
) -> TypedValue {
    encode((&(*result).values)[index])
}

/// Status text for a failed call (empty on success), valid until the
/// result is destroyed.
///
/// # Safety
///
/// `result` must be a live result handle and `len_out` writable.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_exec_result_get_message(
    result: *const ExecResult,
    len_out: *mut usize,
) -> *const u8 {
    *len_out = (&(*result).message).len();
    (*result).message.as_ptr()
}
