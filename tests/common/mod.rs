//! Shared helpers for integration tests: hand-assembled binary modules

// Not every test binary uses every helper
#![allow(dead_code)]

/// Unsigned LEB128 encode
pub fn leb(mut value: u32) -> Vec<u8> {
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

pub fn section(
    id: u8,
    payload: Vec<u8>,
) -> Vec<u8> {
    let mut out = vec![id];
    out.extend(leb(payload.len() as u32));
    out.extend(payload);
    out
}

pub fn module(sections: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
    for section in sections {
        out.extend_from_slice(section);
    }
    out
}

pub fn func_body(
    locals: &[(u32, u8)],
    instrs: &[u8],
) -> Vec<u8> {
    let mut body = leb(locals.len() as u32);
    for (count, ty) in locals {
        body.extend(leb(*count));
        body.push(*ty);
    }
    body.extend_from_slice(instrs);
    let mut out = leb(body.len() as u32);
    out.extend(body);
    out
}

/// `(func (export "add") (param i32 i32) (result i32) local.get 0
/// local.get 1 i32.add)`
pub fn add_module() -> Vec<u8> {
    module(&[
        section(1, vec![0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F]),
        section(3, vec![0x01, 0x00]),
        section(7, vec![0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00]),
        section(10, {
            let mut payload = vec![0x01];
            payload.extend(func_body(&[], &[0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B]));
            payload
        }),
    ])
}
