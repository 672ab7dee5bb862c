//! Boundary value codec
//!
//! `TypedValue` is the fixed-layout representation a host sees: a tag plus
//! an 8-byte union payload. Conversion to and from the engine's `Value` is
//! total over the four kinds and copies float payloads as raw bit patterns,
//! never through float arithmetic, so NaN payloads round-trip bit-exactly.

use crate::engine::value::Value;

/// Boundary result code
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Error,
}

/// Value kind tag
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    I32,
    I64,
    F32,
    F64,
}

/// 8-byte payload wide enough for the largest kind
#[repr(C)]
#[derive(Clone, Copy)]
pub union ValuePayload {
    pub i32_: u32,
    pub i64_: u64,
    pub f32_bits: u32,
    pub f64_bits: u64,
}

/// The tagged union passed across the boundary
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TypedValue {
    pub tag: ValueTag,
    pub payload: ValuePayload,
}

/// Convert an engine value to its boundary form.
///
/// Exhaustive over the engine's kinds: a new kind fails to compile here
/// instead of silently coercing.
pub fn encode(value: Value) -> TypedValue {
    match value {
        Value::I32(v) => TypedValue {
            tag: ValueTag::I32,
            payload: ValuePayload { i32_: v },
        },
        Value::I64(v) => TypedValue {
            tag: ValueTag::I64,
            payload: ValuePayload { i64_: v },
        },
        Value::F32(bits) => TypedValue {
            tag: ValueTag::F32,
            payload: ValuePayload { f32_bits: bits },
        },
        Value::F64(bits) => TypedValue {
            tag: ValueTag::F64,
            payload: ValuePayload { f64_bits: bits },
        },
    }
}

/// Convert a boundary value back to the engine form.
///
/// # Safety
///
/// The tag must be one the caller obtained from this boundary; a tag byte
/// outside the four defined values is a caller contract violation, as is a
/// payload narrower than the tag claims.
pub unsafe fn decode(value: TypedValue) -> Value {
    match value.tag {
        ValueTag::I32 => Value::I32(value.payload.i32_),
        ValueTag::I64 => Value::I64(value.payload.i64_),
        ValueTag::F32 => Value::F32(value.payload.f32_bits),
        ValueTag::F64 => Value::F64(value.payload.f64_bits),
    }
}

impl std::fmt::Debug for TypedValue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // Safety: tag and payload agree by construction on our side
        let value = unsafe { decode(*self) };
        write!(f, "TypedValue({})", value)
    }
}
