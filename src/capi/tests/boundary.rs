//! Handle lifecycle and execution bridge tests
//!
//! These drive the boundary the way a C host would: raw handles in, raw
//! handles out, explicit destroys.

use std::ptr;

use crate::capi::exec::{
    wasmgate_exec_result_get_message, wasmgate_exec_result_get_result,
    wasmgate_exec_result_get_return, wasmgate_exec_result_get_return_size,
    wasmgate_read_binary, wasmgate_run_export,
};
use crate::capi::handles::{
    wasmgate_create_env, wasmgate_create_executor, wasmgate_destroy_env,
    wasmgate_destroy_errors, wasmgate_destroy_exec_result, wasmgate_destroy_executor,
    wasmgate_errors_count, wasmgate_errors_message, wasmgate_new_errors,
};
use crate::capi::value::{encode, ResultCode, TypedValue};
use crate::engine::module::DefinedModule;
use crate::engine::tests::{add_module, div_module};
use crate::engine::value::Value;

fn run(
    executor: *mut crate::capi::handles::BoundExecutor,
    module: *mut DefinedModule,
    name: &str,
    args: &[TypedValue],
) -> *mut crate::capi::exec::ExecResult {
    unsafe {
        wasmgate_run_export(
            executor,
            module,
            name.as_ptr(),
            name.len(),
            args.as_ptr(),
            args.len(),
        )
    }
}

#[test]
fn create_load_invoke_destroy() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();
        let executor = wasmgate_create_executor(env);

        let wasm = add_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        let code = wasmgate_read_binary(env, wasm.as_ptr(), wasm.len(), 0, errors, &mut module);
        assert_eq!(code, ResultCode::Ok);
        assert!(!module.is_null());
        assert_eq!(wasmgate_errors_count(errors), 0);

        let args = [encode(Value::I32(2)), encode(Value::I32(3))];
        let result = run(executor, module, "add", &args);
        assert!(!result.is_null());
        assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Ok);
        assert_eq!(wasmgate_exec_result_get_return_size(result), 1);
        let value = wasmgate_exec_result_get_return(result, 0);
        assert_eq!(crate::capi::value::decode(value), Value::I32(5));

        wasmgate_destroy_exec_result(result);
        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn truncated_binary_reports_error_and_leaves_env_empty() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();

        let wasm = add_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        let code = wasmgate_read_binary(env, wasm.as_ptr(), 4, 0, errors, &mut module);
        assert_eq!(code, ResultCode::Error);
        assert!(module.is_null());
        assert_eq!(wasmgate_errors_count(errors), 1);
        assert_eq!((*env).module_count(), 0);

        // The sink exposes the diagnostic text
        let mut len = 0usize;
        let text = wasmgate_errors_message(errors, 0, &mut len);
        assert!(!text.is_null());
        assert!(len > 0);

        // Out of range index yields null, not a crash
        let text = wasmgate_errors_message(errors, 7, &mut len);
        assert!(text.is_null());
        assert_eq!(len, 0);

        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn unknown_export_yields_error_status() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();
        let executor = wasmgate_create_executor(env);
        let wasm = add_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        wasmgate_read_binary(env, wasm.as_ptr(), wasm.len(), 0, errors, &mut module);

        let result = run(executor, module, "mul", &[]);
        assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Error);
        assert_eq!(wasmgate_exec_result_get_return_size(result), 0);

        let mut len = 0usize;
        let text = wasmgate_exec_result_get_message(result, &mut len);
        let message = std::str::from_utf8(std::slice::from_raw_parts(text, len)).unwrap();
        assert!(message.contains("mul"), "got: {}", message);

        wasmgate_destroy_exec_result(result);
        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn arity_mismatch_yields_error_status_not_crash() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();
        let executor = wasmgate_create_executor(env);
        let wasm = add_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        wasmgate_read_binary(env, wasm.as_ptr(), wasm.len(), 0, errors, &mut module);

        let result = run(executor, module, "add", &[]);
        assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Error);

        wasmgate_destroy_exec_result(result);
        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn trap_yields_error_status_with_message() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();
        let executor = wasmgate_create_executor(env);
        let wasm = div_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        wasmgate_read_binary(env, wasm.as_ptr(), wasm.len(), 0, errors, &mut module);

        let args = [encode(Value::I32(1)), encode(Value::I32(0))];
        let result = run(executor, module, "div", &args);
        assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Error);

        let mut len = 0usize;
        let text = wasmgate_exec_result_get_message(result, &mut len);
        let message = std::str::from_utf8(std::slice::from_raw_parts(text, len)).unwrap();
        assert!(message.contains("divide by zero"), "got: {}", message);

        wasmgate_destroy_exec_result(result);
        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn environments_do_not_share_modules() {
    unsafe {
        let env_a = wasmgate_create_env();
        let env_b = wasmgate_create_env();
        let errors = wasmgate_new_errors();

        let wasm = add_module();
        let mut module_a: *mut DefinedModule = ptr::null_mut();
        let mut module_b: *mut DefinedModule = ptr::null_mut();
        wasmgate_read_binary(env_a, wasm.as_ptr(), wasm.len(), 0, errors, &mut module_a);
        wasmgate_read_binary(env_b, wasm.as_ptr(), wasm.len(), 0, errors, &mut module_b);

        // Destroying A must leave B's module and executor fully usable
        wasmgate_destroy_env(env_a);

        let executor = wasmgate_create_executor(env_b);
        let args = [encode(Value::I32(20)), encode(Value::I32(22))];
        let result = run(executor, module_b, "add", &args);
        assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Ok);
        let value = wasmgate_exec_result_get_return(result, 0);
        assert_eq!(crate::capi::value::decode(value), Value::I32(42));

        wasmgate_destroy_exec_result(result);
        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env_b);
        wasmgate_destroy_errors(errors);
    }
}

#[test]
fn executor_can_run_many_exports_sequentially() {
    unsafe {
        let env = wasmgate_create_env();
        let errors = wasmgate_new_errors();
        let executor = wasmgate_create_executor(env);
        let wasm = add_module();
        let mut module: *mut DefinedModule = ptr::null_mut();
        wasmgate_read_binary(env, wasm.as_ptr(), wasm.len(), 0, errors, &mut module);

        for i in 0..10u32 {
            let args = [encode(Value::I32(i)), encode(Value::I32(i))];
            let result = run(executor, module, "add", &args);
            assert_eq!(wasmgate_exec_result_get_result(result), ResultCode::Ok);
            let value = wasmgate_exec_result_get_return(result, 0);
            assert_eq!(crate::capi::value::decode(value), Value::I32(i * 2));
            wasmgate_destroy_exec_result(result);
        }

        wasmgate_destroy_executor(executor);
        wasmgate_destroy_env(env);
        wasmgate_destroy_errors(errors);
    }
}
