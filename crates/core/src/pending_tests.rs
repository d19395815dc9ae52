// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn starts_empty() {
    let q = PendingQueue::new();
    assert!(q.is_empty());
}

#[test]
fn enqueue_then_remove_drains_to_empty() {
    let q = PendingQueue::new();
    q.enqueue("/x/boom".to_string(), PendingKind::Static);
    q.enqueue("/x/group".to_string(), PendingKind::Directory);
    assert!(!q.is_empty());
    assert_eq!(q.remove("/x/boom"), Some(PendingKind::Static));
    assert_eq!(q.remove("/x/group"), Some(PendingKind::Directory));
    assert!(q.is_empty());
}

#[test]
fn clear_drops_everything_at_once() {
    let q = PendingQueue::new();
    q.enqueue("/x/boom".to_string(), PendingKind::Runtime);
    q.clear();
    assert!(q.is_empty());
    assert_eq!(q.snapshot().len(), 0);
}
