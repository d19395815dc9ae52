// SPDX-License-Identifier: MIT

use super::*;
use crate::any_entry::{DirectoryHandle, StaticEntryHandle};
use zkcache_adapters::{FakeClient, FakeNotifier, NotifyChannel, NotifyValue};
use zkcache_core::test_support::{utf8_directory, utf8_static_entry};
use zkcache_core::FakeClock;

fn engine() -> (Arc<WatchEngine<FakeClock>>, FakeClient, FakeNotifier) {
    let client = FakeClient::new();
    let notifier = FakeNotifier::new();
    let engine = WatchEngine::new(Arc::new(notifier.clone()), FakeClock::new(), Arc::new(WarmLatch::new()), Arc::new(client.clone()));
    (engine, client, notifier)
}

#[test]
fn insert_static_publishes_default_value_exactly_once() {
    let (engine, _client, notifier) = engine();
    let handle: Arc<dyn AnyStaticEntry> = Arc::new(StaticEntryHandle::new(Arc::new(utf8_static_entry("/x/boom", "goat"))));
    assert!(engine.insert_static("/x/boom".to_string(), handle));

    let calls = notifier.calls_on(NotifyChannel::Static);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload.get("value"), Some(&NotifyValue::Text("\"goat\"".to_string())));
}

#[test]
fn insert_static_twice_rejects_and_does_not_republish() {
    let (engine, _client, notifier) = engine();
    let handle: Arc<dyn AnyStaticEntry> = Arc::new(StaticEntryHandle::new(Arc::new(utf8_static_entry("/x/boom", "goat"))));
    assert!(engine.insert_static("/x/boom".to_string(), handle.clone()));
    assert!(!engine.insert_static("/x/boom".to_string(), handle));
    assert_eq!(notifier.calls_on(NotifyChannel::Static).len(), 1);
}

#[test]
fn insert_directory_publishes_empty_directory_event_exactly_once() {
    let (engine, _client, notifier) = engine();
    let handle: Arc<dyn AnyDirectory> = Arc::new(DirectoryHandle::new(Arc::new(utf8_directory("/x/group"))));
    assert!(engine.insert_directory("/x/group".to_string(), handle));

    let calls = notifier.calls_on(NotifyChannel::Directory);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload.get("directory_paths"), Some(&NotifyValue::List(Vec::new())));
}

#[test]
fn dispatch_thread_is_recorded_on_first_use_and_enforced_after() {
    let (engine, _client, _notifier) = engine();
    assert!(engine.check_dispatch_thread().is_ok());
    assert!(engine.check_dispatch_thread().is_ok());

    let engine = engine.clone();
    let violated = std::thread::spawn(move || engine.check_dispatch_thread().is_err()).join().unwrap();
    assert!(violated);
}

#[test]
fn process_pending_skips_when_client_disconnected() {
    let (engine, client, _notifier) = engine();
    let handle: Arc<dyn AnyStaticEntry> = Arc::new(StaticEntryHandle::new(Arc::new(utf8_static_entry("/x/boom", "goat"))));
    engine.insert_static("/x/boom".to_string(), handle);
    engine.pending.enqueue("/x/boom".to_string(), PendingKind::Static);

    assert!(!client.connected());
    engine.process_pending();
    // still pending: process_pending is a no-op while disconnected.
    assert!(!engine.pending.is_empty());
}
