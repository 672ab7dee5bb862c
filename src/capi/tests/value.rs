//! Value codec tests

use proptest::prelude::*;

use crate::capi::value::{decode, encode, ValueTag};
use crate::engine::value::Value;

#[test]
fn encode_tags_match_kinds() {
    assert_eq!(encode(Value::I32(1)).tag, ValueTag::I32);
    assert_eq!(encode(Value::I64(1)).tag, ValueTag::I64);
    assert_eq!(encode(Value::F32(0)).tag, ValueTag::F32);
    assert_eq!(encode(Value::F64(0)).tag, ValueTag::F64);
}

#[test]
fn nan_payloads_round_trip() {
    // Quiet NaN with a distinctive payload; arithmetic would canonicalize it
    let f32_nan = 0x7FC1_2345u32;
    let f64_nan = 0x7FF8_DEAD_BEEF_0001u64;

    let round = unsafe { decode(encode(Value::F32(f32_nan))) };
    assert_eq!(round, Value::F32(f32_nan));
    let round = unsafe { decode(encode(Value::F64(f64_nan))) };
    assert_eq!(round, Value::F64(f64_nan));
}

#[test]
fn signed_zero_round_trips() {
    let value = Value::from_f64(-0.0);
    assert_eq!(unsafe { decode(encode(value)) }, value);
}

#[test]
fn payload_is_copied_verbatim() {
    let encoded = encode(Value::I64(0xDEAD_BEEF_CAFE_F00D));
    // Safety: tag says I64
    assert_eq!(unsafe { encoded.payload.i64_ }, 0xDEAD_BEEF_CAFE_F00D);
}

proptest! {
    #[test]
    fn i32_round_trips(bits in any::<u32>()) {
        let value = Value::I32(bits);
        prop_assert_eq!(unsafe { decode(encode(value)) }, value);
    }

    #[test]
    fn i64_round_trips(bits in any::<u64>()) {
        let value = Value::I64(bits);
        prop_assert_eq!(unsafe { decode(encode(value)) }, value);
    }

    #[test]
    fn f32_round_trips(bits in any::<u32>()) {
        // Arbitrary bit patterns include every NaN payload
        let value = Value::F32(bits);
        prop_assert_eq!(unsafe { decode(encode(value)) }, value);
    }

    #[test]
    fn f64_round_trips(bits in any::<u64>()) {
        let value = Value::F64(bits);
        prop_assert_eq!(unsafe { decode(encode(value)) }, value);
    }
}
