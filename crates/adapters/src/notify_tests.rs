// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn fake_notifier_records_calls_per_channel() {
    let n = FakeNotifier::new();
    let mut payload = NotifyPayload::new();
    payload.insert("path".to_string(), "/x/boom".into());
    n.publish(NotifyChannel::Static, payload.clone());
    n.publish(NotifyChannel::Directory, payload);

    assert_eq!(n.calls().len(), 2);
    assert_eq!(n.calls_on(NotifyChannel::Static).len(), 1);
    assert_eq!(n.calls_on(NotifyChannel::Runtime).len(), 0);
}

#[test]
fn clear_drops_recorded_calls() {
    let n = FakeNotifier::new();
    n.publish(NotifyChannel::Runtime, NotifyPayload::new());
    n.clear();
    assert!(n.calls().is_empty());
}
