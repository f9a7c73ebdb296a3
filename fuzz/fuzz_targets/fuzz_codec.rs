#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pathkv::{codec, Value};

#[derive(Debug, Arbitrary)]
enum Primitive {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl From<Primitive> for Value {
    fn from(p: Primitive) -> Self {
        match p {
            Primitive::Null => Value::Null,
            Primitive::Boolean(b) => Value::Boolean(b),
            Primitive::Number(n) => Value::Number(n),
            Primitive::String(s) => Value::String(s),
        }
    }
}

#[derive(Debug, Arbitrary)]
enum Input {
    // Round-trip a value the codec is actually meant to carry.
    Encode(Primitive),
    // `decode` must never panic, no matter how malformed the bytes are.
    Decode(Vec<u8>),
}

fuzz_target!(|input: Input| match input {
    Input::Encode(primitive) => {
        let value: Value = primitive.into();
        let bytes = codec::encode(&value);
        let decoded = codec::decode(&bytes).expect("encoded bytes must decode");
        match (&value, &decoded) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => {}
            _ => assert_eq!(decoded, value),
        }
    }
    Input::Decode(bytes) => {
        let _ = codec::decode(&bytes);
    }
});
