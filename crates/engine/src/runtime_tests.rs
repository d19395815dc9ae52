// SPDX-License-Identifier: MIT

use super::*;
use std::sync::Arc;
use zkcache_core::{DeserializeOutcome, Directory};

struct NullSub;
impl Subscription for NullSub {
    fn unregister(&self) {}
}

/// Fabricates `n + 1` distinct `Directory` allocations and returns the id
/// of the `n`th, keeping the whole batch alive in `storage` so the id
/// stays valid for the caller's whole test — `DirectoryId` is derived
/// from `Arc::as_ptr`, so a dropped backing `Arc` can have its allocation
/// reused by a later one, making two unrelated ids compare equal.
fn ids(storage: &mut Vec<Arc<Directory<String>>>, n: usize) -> DirectoryId {
    while storage.len() <= n {
        storage.push(Arc::new(Directory::new(
            "/x",
            Arc::new(|c: &str| c.to_string()),
            Arc::new(|raw: &[u8]| Ok(DeserializeOutcome::Value(String::from_utf8_lossy(raw).to_string()))),
        )));
    }
    DirectoryId::of(&storage[n])
}

#[test]
fn acquire_installs_once_and_shares_across_owners() {
    let reg = RuntimeRegistry::new();
    let mut storage = Vec::new();
    let a = ids(&mut storage, 0);
    let b = ids(&mut storage, 1);
    let mut installs = 0;
    assert!(reg
        .acquire(&"/x/runtime".to_string(), a, || {
            installs += 1;
            Box::new(NullSub)
        })
        .unwrap());
    assert!(!reg
        .acquire(&"/x/runtime".to_string(), b, || {
            installs += 1;
            Box::new(NullSub)
        })
        .unwrap());
    assert_eq!(installs, 1);
    assert_eq!(reg.watched_count(), 1);
}

#[test]
fn acquire_twice_by_same_owner_is_a_duplicate() {
    let reg = RuntimeRegistry::new();
    let mut storage = Vec::new();
    let a = ids(&mut storage, 0);
    reg.acquire(&"/x/runtime".to_string(), a, || Box::new(NullSub)).unwrap();
    let err = reg.acquire(&"/x/runtime".to_string(), a, || Box::new(NullSub)).unwrap_err();
    assert_eq!(err, StateError::DuplicateRuntimeWatch("/x/runtime".to_string()));
}

#[test]
fn release_tears_down_only_after_last_owner() {
    let reg = RuntimeRegistry::new();
    let mut storage = Vec::new();
    let a = ids(&mut storage, 0);
    let b = ids(&mut storage, 1);
    reg.acquire(&"/x/runtime".to_string(), a, || Box::new(NullSub)).unwrap();
    reg.acquire(&"/x/runtime".to_string(), b, || Box::new(NullSub)).unwrap();
    reg.release("/x/runtime", a).unwrap();
    assert!(reg.is_watched("/x/runtime"));
    reg.release("/x/runtime", b).unwrap();
    assert!(!reg.is_watched("/x/runtime"));
}

#[test]
fn release_of_stray_owner_reports_watch_still_owned() {
    let reg = RuntimeRegistry::new();
    let mut storage = Vec::new();
    let a = ids(&mut storage, 0);
    let stray = ids(&mut storage, 1);
    reg.acquire(&"/x/runtime".to_string(), a, || Box::new(NullSub)).unwrap();
    let err = reg.release("/x/runtime", stray).unwrap_err();
    assert_eq!(err, StateError::WatchStillOwned("/x/runtime".to_string()));
    assert!(reg.is_watched("/x/runtime"));
}
