// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn new_ids_are_uuids_and_unique() {
    let a = SessionId::new();
    let b = SessionId::new();
    assert_ne!(a, b);
    assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
}

#[test]
fn define_id_hash_map_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(TestId::from_string("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
}

#[test]
fn short_truncates() {
    let id = TestId::from_string("abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
}

#[test]
fn short_returns_full_when_shorter() {
    let id = TestId::from_string("abc");
    assert_eq!(id.short(8), "abc");
    assert_eq!(short("abc", 3), "abc");
}

#[test]
fn serde_is_transparent() {
    let id = SessionId::from_string("6f1c");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"6f1c\"");
    let parsed: SessionId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}
