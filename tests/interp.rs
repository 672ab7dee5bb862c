//! Engine-level integration tests through the safe Rust API

mod common;

use common::{add_module, func_body, module, section};
use wasmgate::engine::{read_binary, ReadBinaryOptions};
use wasmgate::{check_script, run_binary_export, Environment, Errors, Executor, Value};

#[test]
fn convenience_wrapper_runs_one_export() {
    let results = run_binary_export(&add_module(), "add", &[Value::I32(2), Value::I32(3)])
        .expect("add(2, 3)");
    assert_eq!(results, vec![Value::I32(5)]);
}

#[test]
fn convenience_wrapper_reports_load_failures() {
    let err = run_binary_export(&add_module()[..6], "add", &[]).expect_err("truncated");
    assert!(err.to_string().contains("failed to load"));
}

#[test]
fn script_check_passes_and_fails() {
    check_script(
        r#"
        (module $a (func (export "f")))
        (invoke $a "f")
        "#,
    )
    .expect("resolvable script");

    let err = check_script(r#"(invoke $missing "f")"#).expect_err("unresolvable script");
    assert!(err.to_string().contains("resolution failed"));
}

#[test]
fn one_environment_hosts_many_modules() {
    let mut env = Environment::new();
    let mut errors = Errors::new();
    let options = ReadBinaryOptions::default();

    let first = read_binary(&mut env, &add_module(), &options, &mut errors).expect("first");
    let second = read_binary(&mut env, &add_module(), &options, &mut errors).expect("second");
    assert_eq!(env.module_count(), 2);

    let mut executor = Executor::new();
    for id in [first, second] {
        let result = executor
            .run_export(&env, id, "add", &[Value::I32(1), Value::I32(2)])
            .expect("add");
        assert_eq!(result.as_slice(), &[Value::I32(3)]);
    }
}

#[test]
fn float_pipeline_computes_with_bit_exact_io() {
    // (func (export "hyp") (param f64 f64) (result f64)
    //   local.get 0 local.get 0 f64.mul
    //   local.get 1 local.get 1 f64.mul
    //   f64.add f64.sqrt)
    let wasm = module(&[
        section(1, vec![0x01, 0x60, 0x02, 0x7C, 0x7C, 0x01, 0x7C]),
        section(3, vec![0x01, 0x00]),
        section(7, vec![0x01, 0x03, b'h', b'y', b'p', 0x00, 0x00]),
        section(10, {
            let mut payload = vec![0x01];
            payload.extend(func_body(
                &[],
                &[
                    0x20, 0x00, 0x20, 0x00, 0xA2, // x*x
                    0x20, 0x01, 0x20, 0x01, 0xA2, // y*y
                    0xA0, 0x9F, // add, sqrt
                    0x0B,
                ],
            ));
            payload
        }),
    ]);

    let results = run_binary_export(
        &wasm,
        "hyp",
        &[Value::from_f64(3.0), Value::from_f64(4.0)],
    )
    .expect("hyp(3, 4)");
    assert_eq!(results, vec![Value::from_f64(5.0)]);
}
