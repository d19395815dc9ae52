// SPDX-License-Identifier: MIT

use super::*;
use crate::DeserializeOutcome;

fn entry() -> StaticEntry<String> {
    StaticEntry::new("/x/boom", "goat".to_string(), Arc::new(|raw: &[u8], _stat: &Stat| {
        Ok(DeserializeOutcome::Value(String::from_utf8_lossy(raw).to_string()))
    }))
}

#[test]
fn starts_at_default_and_invalid() {
    let e = entry();
    assert_eq!(e.value(), "goat");
    assert_eq!(e.valid_value(), None);
}

#[test]
fn mark_value_becomes_valid() {
    let e = entry();
    let old = e.mark_value("cat".to_string(), Stat::missing());
    assert_eq!(old, "goat");
    assert_eq!(e.value(), "cat");
    assert_eq!(e.valid_value(), Some("cat".to_string()));
}

#[test]
fn mark_missing_resets_to_default_and_invalid() {
    let e = entry();
    e.mark_value("cat".to_string(), Stat::missing());
    let old = e.mark_missing();
    assert_eq!(old, "cat");
    assert_eq!(e.value(), "goat");
    assert_eq!(e.valid_value(), None);
}

#[test]
fn mark_invalid_resets_to_default_but_keeps_stat() {
    let e = entry();
    let stat = Stat { exists: true, version: 3, child_list_version: 0, mtime_ms: 42, data_length: 3 };
    e.mark_invalid(stat);
    assert_eq!(e.value(), "goat");
    assert_eq!(e.valid_value(), None);
    assert_eq!(e.stat(), Some(stat));
}
