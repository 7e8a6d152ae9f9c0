//! Tests for the key codec
//!
//! These tests verify:
//! - Encoding round-trips for every part kind
//! - Byte order of encoded keys equals typed key order
//! - Malformed native keys are rejected

use tuplekv::key::{decode, encode};
use tuplekv::{key, Key, KeyPart, KvError, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn key_pool() -> Vec<Key> {
    vec![
        Key::root(),
        key![false],
        key![true],
        key![true, false],
        key![f64::NEG_INFINITY],
        key![-1e300],
        key![-42],
        key![-0.5],
        key![-0.0],
        key![0],
        key![0, "a"],
        key![1],
        key![1.5],
        key![42],
        key![1e300],
        key![f64::INFINITY],
        key![""],
        key!["", ""],
        key!["\0"],
        key!["\0", 1],
        key!["a"],
        key!["a", false],
        key!["a", 1],
        key!["a", "b"],
        key!["a\0b"],
        key!["ab"],
        key!["users"],
        key!["users", 42],
        key!["users", 42, "name"],
        key!["users", 43],
        key!["users", "42"],
        key!["é"],
        key!["日本"],
    ]
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_roundtrip_pool() {
    for key in key_pool() {
        let decoded = decode(&encode(&key)).unwrap();
        assert_eq!(decoded, key, "round-trip failed for {}", key);
    }
}

#[test]
fn test_roundtrip_preserves_number_identity() {
    let key = key![-0.0, f64::NAN];
    let decoded = decode(&encode(&key)).unwrap();

    let parts = decoded.parts();
    assert!(parts[0].as_f64().unwrap().is_sign_negative());
    assert!(parts[1].as_f64().unwrap().is_nan());
}

#[test]
fn test_key_methods_delegate_to_codec() {
    let key = key!["users", 42, true];
    assert_eq!(key.encode(), encode(&key));
    assert_eq!(Key::decode(&key.encode()).unwrap(), key);
}

// =============================================================================
// Order Tests
// =============================================================================

#[test]
fn test_byte_order_matches_key_order() {
    let pool = key_pool();
    for a in &pool {
        for b in &pool {
            assert_eq!(
                encode(a).cmp(&encode(b)),
                a.cmp(b),
                "order mismatch between {} and {}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_pool_is_listed_in_key_order() {
    let pool = key_pool();
    let mut sorted = pool.clone();
    sorted.sort();
    assert_eq!(sorted, pool);
}

#[test]
fn test_type_precedence() {
    assert!(encode(&key![true]) < encode(&key![f64::NEG_INFINITY]));
    assert!(encode(&key![f64::INFINITY]) < encode(&key![""]));
    assert!(encode(&key![false]) < encode(&key![true]));
}

#[test]
fn test_prefix_sorts_before_extension() {
    assert!(encode(&key!["users"]) < encode(&key!["users", false]));
    assert!(encode(&key!["users", 42]) < encode(&key!["users", 42, "name"]));
    assert!(encode(&key!["users", 42, "name"]) < encode(&key!["users", 43]));
}

#[test]
fn test_encoded_prefix_is_byte_prefix() {
    let parent = key!["users", 42];
    let child = parent.with("name");
    assert!(encode(&child).starts_with(&encode(&parent)));
}

// =============================================================================
// Decode Error Tests
// =============================================================================

#[test]
fn test_decode_rejects_malformed_bytes() {
    let cases: &[&[u8]] = &[
        &[0x99],
        &[0x20, 0x00, 0x01],
        &[0x30, b'a'],
        &[0x30, b'a', 0x00, 0x01],
        &[0x30, 0xC3, 0x28, 0x00],
    ];

    for bytes in cases {
        assert!(
            matches!(decode(bytes), Err(KvError::Decode(_))),
            "expected decode error for {:?}",
            bytes
        );
    }
}

#[test]
fn test_empty_bytes_decode_to_root() {
    assert_eq!(decode(&[]).unwrap(), Key::root());
}

// =============================================================================
// Dynamic Part Tests
// =============================================================================

#[test]
fn test_dynamic_parts_from_values() {
    let key = Key::try_from_values(vec![Value::from("users"), Value::from(42), Value::from(true)]).unwrap();
    assert_eq!(key, key!["users", 42, true]);

    assert!(matches!(
        KeyPart::try_from(Value::Null),
        Err(KvError::InvalidKeyPart(_))
    ));
    assert!(matches!(
        Key::try_from_values(vec![Value::from("a"), Value::bytes(vec![1, 2])]),
        Err(KvError::InvalidKeyPart(_))
    ));
}

#[test]
fn test_dynamic_parts_from_json() {
    let part = KeyPart::try_from(serde_json::json!("x")).unwrap();
    assert_eq!(part, KeyPart::from("x"));

    assert!(KeyPart::try_from(serde_json::json!({"a": 1})).is_err());
    assert!(KeyPart::try_from(serde_json::json!([1])).is_err());
}
