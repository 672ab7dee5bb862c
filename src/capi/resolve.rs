//! Resolution bridge
//!
//! Parses scripts and standalone modules and exposes the name-resolution
//! pass over them. Independent of any environment: the script and module
//! objects here are frontend trees, not loaded modules. Failure is
//! communicated only through the result code and the caller's sink.

use std::panic::{self, AssertUnwindSafe};
use std::slice;

use crate::capi::value::ResultCode;
use crate::text::ast::{Script, TextModule};
use crate::text::{parse_module, parse_script, resolve_module, resolve_script};
use crate::util::Errors;

/// Parse script source into a tree for resolution.
///
/// On success writes a script handle to `out_script`, owned by the caller
/// and released with `wasmgate_destroy_script`. On failure appends to
/// `errors` and `out_script` is not written.
///
/// # Safety
///
/// `data` must point to `size` readable bytes, `errors` must be a live
/// sink handle, and `out_script` must be writable.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_parse_script(
    data: *const u8,
    size: usize,
    errors: *mut Errors,
    out_script: *mut *mut Script,
) -> ResultCode {
    let bytes = if size == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(data, size)
    };
    let source = match std::str::from_utf8(bytes) {
        Ok(source) => source,
        Err(_) => {
            (*errors).error("script source is not valid utf-8");
            return ResultCode::Error;
        }
    };
    match panic::catch_unwind(|| parse_script(source)) {
        Ok(Ok(script)) => {
            *out_script = Box::into_raw(Box::new(script));
            ResultCode::Ok
        }
        Ok(Err(err)) => {
            (*errors).error(err.to_string());
            ResultCode::Error
        }
        Err(_) => {
            (*errors).error("internal error while parsing script");
            ResultCode::Error
        }
    }
}

/// Release a parsed script.
///
/// # Safety
///
/// `script` must come from `wasmgate_parse_script` and must not be used
/// again.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_script(script: *mut Script) {
    drop(Box::from_raw(script));
}

/// Parse a standalone `(module ...)` into a tree for resolution.
///
/// # Safety
///
/// Same contract as `wasmgate_parse_script`.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_parse_module(
    data: *const u8,
    size: usize,
    errors: *mut Errors,
    out_module: *mut *mut TextModule,
) -> ResultCode {
    let bytes = if size == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(data, size)
    };
    let source = match std::str::from_utf8(bytes) {
        Ok(source) => source,
        Err(_) => {
            (*errors).error("module source is not valid utf-8");
            return ResultCode::Error;
        }
    };
    match panic::catch_unwind(|| parse_module(source)) {
        Ok(Ok(module)) => {
            *out_module = Box::into_raw(Box::new(module));
            ResultCode::Ok
        }
        Ok(Err(err)) => {
            (*errors).error(err.to_string());
            ResultCode::Error
        }
        Err(_) => {
            (*errors).error("internal error while parsing module");
            ResultCode::Error
        }
    }
}

/// Release a parsed standalone module.
///
/// # Safety
///
/// `module` must come from `wasmgate_parse_module` and must not be used
/// again.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_destroy_module(module: *mut TextModule) {
    drop(Box::from_raw(module));
}

/// Resolve symbolic names across a whole script, in place.
///
/// References resolve against names declared by earlier commands; forward
/// references, duplicates, and unknown names append diagnostics and yield
/// `Error`.
///
/// # Safety
///
/// `script` and `errors` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_resolve_names_script(
    script: *mut Script,
    errors: *mut Errors,
) -> ResultCode {
    let script = &mut *script;
    let errors = &mut *errors;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolve_script(script, errors)));
    match outcome {
        Ok(Ok(())) => ResultCode::Ok,
        Ok(Err(_)) => ResultCode::Error,
        Err(_) => {
            errors.error("internal error while resolving script");
            ResultCode::Error
        }
    }
}

/// Resolve symbolic names within a single module, in place.
///
/// # Safety
///
/// `module` and `errors` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn wasmgate_resolve_names_module(
    module: *mut TextModule,
    errors: *mut Errors,
) -> ResultCode {
    let module = &mut *module;
    let errors = &mut *errors;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolve_module(module, errors)));
    match outcome {
        Ok(Ok(())) => ResultCode::Ok,
        Ok(Err(_)) => ResultCode::Error,
        Err(_) => {
            errors.error("internal error while resolving module");
            ResultCode::Error
        }
    }
}
