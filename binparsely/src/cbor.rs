//! CBOR encoding.
//!
//! Mapping to CBOR:
//!   - Value::Null    -> CBOR null
//!   - Value::Bool    -> CBOR bool
//!   - Value::Integer -> CBOR integer, or a bignum (tag 2/3) outside -2^64..2^64
//!   - Value::Float   -> CBOR float
//!   - Value::String  -> CBOR text string
//!   - Value::Array   -> CBOR array
//!   - Value::Object  -> CBOR map with text string keys, in document order

use ciborium::value::{Integer, Value as CborValue};
use libparsely::Value;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

/// Tag for unsigned bignums (RFC 8949 section 3.4.3).
const TAG_POSITIVE_BIGNUM: u64 = 2;
/// Tag for negative bignums; the payload encodes -1 - n.
const TAG_NEGATIVE_BIGNUM: u64 = 3;

/// Encode a Value as CBOR bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&value_to_cbor(value), &mut buf)
        .map_err(|e| format!("CBOR encode error: {}", e))?;
    Ok(buf)
}

fn value_to_cbor(value: &Value) -> CborValue {
    match value {
        Value::Null => CborValue::Null,
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Integer(n) => integer_to_cbor(n),
        Value::Float(f) => CborValue::Float(*f),
        Value::String(s) => CborValue::Text(s.clone()),
        Value::Array(arr) => CborValue::Array(arr.iter().map(value_to_cbor).collect()),
        Value::Object(obj) => CborValue::Map(
            obj.iter()
                .map(|(k, v)| (CborValue::Text(k.clone()), value_to_cbor(v)))
                .collect(),
        ),
    }
}

fn integer_to_cbor(n: &BigInt) -> CborValue {
    if let Some(native) = n.to_i128().and_then(|i| Integer::try_from(i).ok()) {
        return CborValue::Integer(native);
    }
    let (tag, magnitude) = if n.sign() == Sign::Minus {
        let payload: BigInt = -n - 1;
        (TAG_NEGATIVE_BIGNUM, payload.to_bytes_be().1)
    } else {
        (TAG_POSITIVE_BIGNUM, n.to_bytes_be().1)
    };
    CborValue::Tag(tag, Box::new(CborValue::Bytes(magnitude)))
}
