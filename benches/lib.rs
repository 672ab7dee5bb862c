//! Executor micro-benchmarks

use criterion::{criterion_group, criterion_main, Criterion};

use wasmgate::engine::{read_binary, ReadBinaryOptions};
use wasmgate::{Environment, Errors, Executor, Value};

fn leb(mut value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

fn section(
    id: u8,
    payload: Vec<u8>,
) -> Vec<u8> {
    let mut out = vec![id];
    out.extend(leb(payload.len() as u32));
    out.extend(payload);
    out
}

/// Iterative factorial over i64, exercising locals, the loop/branch path,
/// and the arithmetic dispatch
fn fac_module() -> Vec<u8> {
    let mut body = vec![0x01, 0x01, 0x7E];
    body.extend([
        0x42, 0x01, 0x21, 0x01, // acc = 1
        0x02, 0x40, 0x03, 0x40, // block loop
        0x20, 0x00, 0x50, 0x0D, 0x01, // if n == 0 break
        0x20, 0x00, 0x20, 0x01, 0x7E, 0x21, 0x01, // acc *= n
        0x20, 0x00, 0x42, 0x01, 0x7D, 0x21, 0x00, // n -= 1
        0x0C, 0x00, 0x0B, 0x0B, // continue
        0x20, 0x01, 0x0B, // return acc
    ]);
    let mut entry = leb(body.len() as u32);
    entry.extend(body);

    let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
    out.extend(section(1, vec![0x01, 0x60, 0x01, 0x7E, 0x01, 0x7E]));
    out.extend(section(3, vec![0x01, 0x00]));
    out.extend(section(7, vec![0x01, 0x03, b'f', b'a', b'c', 0x00, 0x00]));
    out.extend(section(10, {
        let mut payload = vec![0x01];
        payload.extend(entry);
        payload
    }));
    out
}

fn bench_read_binary(c: &mut Criterion) {
    let wasm = fac_module();
    c.bench_function("read_binary/fac", |b| {
        b.iter(|| {
            let mut env = Environment::new();
            let mut errors = Errors::new();
            read_binary(&mut env, &wasm, &ReadBinaryOptions::default(), &mut errors)
                .expect("fac module")
        });
    });
}

fn bench_run_export(c: &mut Criterion) {
    let wasm = fac_module();
    let mut env = Environment::new();
    let mut errors = Errors::new();
    let id = read_binary(&mut env, &wasm, &ReadBinaryOptions::default(), &mut errors)
        .expect("fac module");
    let mut executor = Executor::new();

    c.bench_function("run_export/fac(20)", |b| {
        b.iter(|| {
            executor
                .run_export(&env, id, "fac", &[Value::I64(20)])
                .expect("fac(20)")
        });
    });
}

criterion_group!(benches, bench_read_binary, bench_run_export);
criterion_main!(benches);
