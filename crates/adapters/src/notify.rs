// SPDX-License-Identifier: MIT

//! The Notifier capability the engine publishes update events through
//! (spec §6), grounded on the `NotifyAdapter`/`DesktopNotifyAdapter` pair.
//!
//! Unlike the desktop notifier this mirrors, publication happens
//! synchronously on the dispatch thread — there is no async runtime in
//! this crate's concurrency model (spec §5) — so the trait has no
//! `async_trait` dependency and no fire-and-forget spawn.

use std::collections::BTreeMap;
use std::fmt;

/// One of the three publication channels named in spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    Static,
    Directory,
    Runtime,
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyChannel::Static => write!(f, "static"),
            NotifyChannel::Directory => write!(f, "directory"),
            NotifyChannel::Runtime => write!(f, "runtime"),
        }
    }
}

/// A single published field. Payloads in spec.md §4.2-§4.4 mix strings,
/// numbers, and lists (`directory_paths`); a small closed value enum
/// keeps the payload map concretely typed without reaching for `Any` or
/// a `serde_json::Value` dependency this spec has no other use for.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl From<&str> for NotifyValue {
    fn from(v: &str) -> Self {
        NotifyValue::Text(v.to_string())
    }
}

impl From<String> for NotifyValue {
    fn from(v: String) -> Self {
        NotifyValue::Text(v)
    }
}

impl From<i64> for NotifyValue {
    fn from(v: i64) -> Self {
        NotifyValue::Int(v)
    }
}

impl From<f64> for NotifyValue {
    fn from(v: f64) -> Self {
        NotifyValue::Float(v)
    }
}

impl From<bool> for NotifyValue {
    fn from(v: bool) -> Self {
        NotifyValue::Bool(v)
    }
}

impl From<Vec<String>> for NotifyValue {
    fn from(v: Vec<String>) -> Self {
        NotifyValue::List(v)
    }
}

/// An update event, keyed like the spec's `payload_map`. `BTreeMap` for
/// deterministic iteration order in `tracing` field emission and tests.
pub type NotifyPayload = BTreeMap<String, NotifyValue>;

/// Sink for update notifications (spec §6, §7: "subscribers are
/// responsible for their own error handling" — `publish` itself cannot
/// fail from the engine's point of view).
pub trait Notifier: Send + Sync {
    fn publish(&self, channel: NotifyChannel, payload: NotifyPayload);
}

/// Publishes update events as structured `tracing` events — the natural
/// "instrumentation bus" for a library with no metrics pipeline of its
/// own, mirroring `DesktopNotifyAdapter`'s role as the one real adapter
/// shipped alongside the fake.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn publish(&self, channel: NotifyChannel, payload: NotifyPayload) {
        tracing::debug!(%channel, ?payload, "cache update published");
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{NotifyChannel, NotifyPayload, Notifier};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// One recorded publication.
    #[derive(Debug, Clone)]
    pub struct NotifyCall {
        pub channel: NotifyChannel,
        pub payload: NotifyPayload,
    }

    struct FakeNotifierState {
        calls: Vec<NotifyCall>,
    }

    /// Fake notifier for testing: records every publication instead of
    /// emitting it anywhere.
    #[derive(Clone)]
    pub struct FakeNotifier {
        inner: Arc<Mutex<FakeNotifierState>>,
    }

    impl Default for FakeNotifier {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeNotifierState { calls: Vec::new() })) }
        }
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<NotifyCall> {
            self.inner.lock().calls.clone()
        }

        pub fn calls_on(&self, channel: NotifyChannel) -> Vec<NotifyCall> {
            self.inner.lock().calls.iter().filter(|c| c.channel == channel).cloned().collect()
        }

        pub fn clear(&self) {
            self.inner.lock().calls.clear();
        }
    }

    impl Notifier for FakeNotifier {
        fn publish(&self, channel: NotifyChannel, payload: NotifyPayload) {
            self.inner.lock().calls.push(NotifyCall { channel, payload });
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
