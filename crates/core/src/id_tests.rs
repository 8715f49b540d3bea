// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn define_id_has_prefix() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
}

#[test]
fn define_id_unique() {
    assert_ne!(TestId::new(), TestId::new());
}

crate::define_ext_id! {
    pub struct TestExtId;
}

#[test]
fn define_ext_id_roundtrips_string() {
    let id = TestExtId::from("session-123");
    assert_eq!(id.as_str(), "session-123");
    assert_eq!(id.to_string(), "session-123");
}

#[test]
fn define_ext_id_hash_map_lookup() {
    let mut map: HashMap<TestExtId, i32> = HashMap::new();
    map.insert(TestExtId::new("a"), 1);
    assert_eq!(map.get(&TestExtId::new("a")), Some(&1));
}

#[test]
fn short_truncates() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}
