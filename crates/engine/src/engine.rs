// SPDX-License-Identifier: MIT

//! `WatchEngine`: the state machine tying the data model to the Client
//! (spec §4.2), cooperatively single-threaded on the Client's dispatch
//! thread.

use crate::any_entry::{AnyDirectory, AnyStaticEntry};
use crate::runtime::{DirectoryByIdRegistry, DirectoryRegistry, RuntimeRegistry, StaticRegistry};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use zkcache_adapters::{Client, ClientError, NotifyChannel, NotifyPayload, Notifier, SessionId, Subscription};
use zkcache_core::{Clock, DeserializeOutcome, NodePath, PendingKind, PendingQueue, StaticEntry, StateError, WarmLatch};

/// Retries `op` in-line while it keeps failing with a transient error and
/// the client still reports `connected` (spec §4.2: "retry in-line, as the
/// subsequent attempt will either succeed or raise a terminal error").
/// Returns `None` on a terminal error (already logged) or once the client
/// drops out of `connected` mid-retry — both collapse to "enqueue and try
/// again on the next event" for the caller.
fn retry_transient<T>(client: &dyn Client, context: &str, mut op: impl FnMut() -> Result<T, ClientError>) -> Option<T> {
    loop {
        match op() {
            Ok(value) => return Some(value),
            Err(ClientError::Transient(e)) => {
                if !client.connected() {
                    tracing::debug!(%context, error = %e, "transient error and client disconnected, giving up this pass");
                    return None;
                }
                tracing::debug!(%context, error = %e, "transient error, retrying in-line");
            }
            Err(ClientError::Terminal(e)) => {
                tracing::warn!(%context, error = %e, "terminal client error");
                return None;
            }
        }
    }
}

/// One update pass against a statically-registered path (spec §4.2).
///
/// Free function rather than a method on `StaticEntry<V>` itself:
/// `StaticEntry` is a pure data holder in `zkcache-core`, which must not
/// depend on the `Client`/`Notifier` traits defined in
/// `zkcache-adapters` (that would make `zkcache-core` depend on its own
/// downstream crate).
pub(crate) fn update_static_entry<V: Clone + Send + Sync + std::fmt::Debug + 'static>(
    entry: &Arc<StaticEntry<V>>,
    client: &dyn Client,
    notifier: &dyn Notifier,
    now_epoch_ms: u64,
) -> bool {
    let path = entry.path().to_string();
    let stat = match retry_transient(client, &path, || client.stat(&path, true)) {
        Some(stat) => stat,
        None => return false,
    };

    if !stat.exists {
        entry.mark_missing();
        publish_value(notifier, NotifyChannel::Static, &path, entry.default_value(), 0.0, 0, 0, None);
        return true;
    }

    let (raw, stat) = match retry_transient(client, &path, || client.get(&path, true)) {
        Some(r) => r,
        None => return false,
    };
    let latency_seconds = (now_epoch_ms as f64 - stat.mtime_ms as f64).max(0.0) / 1000.0;

    match entry.deserializer()(&raw, &stat) {
        Ok(DeserializeOutcome::Value(value)) => {
            entry.mark_value(value, stat);
            publish_value(notifier, NotifyChannel::Static, &path, &entry.value(), latency_seconds, stat.version, stat.data_length, None);
        }
        Ok(DeserializeOutcome::UseDefault) => {
            entry.mark_invalid(stat);
            publish_value(notifier, NotifyChannel::Static, &path, entry.default_value(), latency_seconds, stat.version, stat.data_length, None);
        }
        Err(e) => {
            tracing::warn!(%path, error = %e, "deserializer failed for static path");
            entry.mark_invalid(stat);
            publish_value(
                notifier,
                NotifyChannel::Static,
                &path,
                entry.default_value(),
                latency_seconds,
                stat.version,
                stat.data_length,
                Some(e.to_string()),
            );
        }
    }
    true
}

// `NotifyPayload` only carries text/int/float/bool/list values, so the
// published `value` field is a `Debug` rendering rather than requiring
// every registered `V` to implement a conversion into `NotifyValue` —
// forcing that on every cache user for a field nothing downstream
// parses structurally isn't worth the ergonomics cost.
pub(crate) fn publish_value<V: std::fmt::Debug>(
    notifier: &dyn Notifier,
    channel: NotifyChannel,
    path: &str,
    value: &V,
    latency_seconds: f64,
    version: i32,
    data_length: i32,
    error: Option<String>,
) {
    let mut payload = NotifyPayload::new();
    payload.insert("path".to_string(), path.to_string().into());
    payload.insert("value".to_string(), format!("{value:?}").into());
    payload.insert("latency_seconds".to_string(), latency_seconds.into());
    payload.insert("version".to_string(), (version as i64).into());
    payload.insert("data_length".to_string(), (data_length as i64).into());
    if let Some(e) = error {
        payload.insert("error".to_string(), e.into());
    }
    notifier.publish(channel, payload);
}

/// Free function for the same reason as `publish_value`: directories are
/// published from both `WatchEngine` methods and from registration
/// (`insert_directory`, before any `WatchEngine` instance method call
/// makes sense for the handle doing the publishing).
pub(crate) fn publish_directory_event(
    notifier: &dyn Notifier,
    path: &str,
    directory_paths: &[String],
    directory_version: i32,
    latency_seconds: f64,
    data_length: i32,
) {
    let mut payload = NotifyPayload::new();
    payload.insert("path".to_string(), path.to_string().into());
    payload.insert("directory_paths".to_string(), directory_paths.to_vec().into());
    payload.insert("directory_version".to_string(), (directory_version as i64).into());
    payload.insert("latency_seconds".to_string(), latency_seconds.into());
    payload.insert("data_length".to_string(), (data_length as i64).into());
    notifier.publish(NotifyChannel::Directory, payload);
}

/// The watch/update finite state machine (spec §4.2-§4.5).
pub struct WatchEngine<C: Clock> {
    client: Arc<dyn Client>,
    notifier: Arc<dyn Notifier>,
    clock: C,
    statics: RwLock<StaticRegistry>,
    directories: RwLock<DirectoryRegistry>,
    directories_by_id: RwLock<DirectoryByIdRegistry>,
    runtime: RuntimeRegistry,
    pending: PendingQueue,
    last_session_id: Mutex<Option<SessionId>>,
    warm: Arc<WarmLatch>,
    dispatch_thread: Mutex<Option<ThreadId>>,
    own_subscriptions: Mutex<Vec<Box<dyn Subscription>>>,
    started: AtomicBool,
}

impl<C: Clock + 'static> WatchEngine<C> {
    pub fn new(notifier: Arc<dyn Notifier>, clock: C, warm: Arc<WarmLatch>, client: Arc<dyn Client>) -> Arc<Self> {
        Arc::new(Self {
            client,
            notifier,
            clock,
            statics: RwLock::new(StaticRegistry::new()),
            directories: RwLock::new(DirectoryRegistry::new()),
            directories_by_id: RwLock::new(DirectoryByIdRegistry::new()),
            runtime: RuntimeRegistry::new(),
            pending: PendingQueue::new(),
            last_session_id: Mutex::new(None),
            warm,
            dispatch_thread: Mutex::new(None),
            own_subscriptions: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    pub fn runtime(&self) -> &RuntimeRegistry {
        &self.runtime
    }

    pub fn statics(&self) -> &RwLock<StaticRegistry> {
        &self.statics
    }

    pub fn directories(&self) -> &RwLock<DirectoryRegistry> {
        &self.directories
    }

    /// Returns `false` without inserting if `path` is already registered.
    /// On success, publishes the default-value Notifier event spec §4.1
    /// requires exactly once per registration.
    pub fn insert_static(&self, path: NodePath, handle: Arc<dyn AnyStaticEntry>) -> bool {
        {
            let mut statics = self.statics.write();
            if statics.contains_key(&path) {
                return false;
            }
            statics.insert(path, handle.clone());
        }
        handle.publish_registered(self.notifier.as_ref());
        true
    }

    /// Returns `false` without inserting if `path` is already registered.
    /// On success, publishes the default (empty) Notifier event spec §4.1
    /// requires exactly once per registration.
    pub fn insert_directory(&self, path: NodePath, handle: Arc<dyn AnyDirectory>) -> bool {
        {
            let mut directories = self.directories.write();
            if directories.contains_key(&path) {
                return false;
            }
            self.directories_by_id.write().insert(handle.id(), handle.clone());
            directories.insert(path, handle.clone());
        }
        handle.publish_registered(self.notifier.as_ref());
        true
    }

    pub fn warm(&self) -> &Arc<WarmLatch> {
        &self.warm
    }

    fn check_dispatch_thread(&self) -> Result<(), StateError> {
        let current = std::thread::current().id();
        let mut guard = self.dispatch_thread.lock();
        match *guard {
            Some(recorded) if recorded != current => Err(StateError::WrongThread),
            Some(_) => Ok(()),
            None => {
                *guard = Some(current);
                Ok(())
            }
        }
    }

    fn now_epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Install every subscription (spec §4.2 steps 1-4) and return once
    /// wired; does not itself seed — the first `on_connected` call does
    /// that.
    pub fn install(self: &Arc<Self>) {
        let statics: Vec<_> = self.statics.read().values().cloned().collect();
        for entry in statics {
            let path = entry.path().to_string();
            let engine = self.clone();
            let sub = self.client.register(
                &path,
                Box::new(move |_event| {
                    engine.run_update_static(&path);
                }),
            );
            self.own_subscriptions.lock().push(sub);
        }

        let directories: Vec<_> = self.directories.read().values().cloned().collect();
        for dir in directories {
            let path = dir.path().to_string();
            let engine = self.clone();
            let sub = self.client.register(
                &path,
                Box::new(move |_event| {
                    engine.run_update_directory(&path);
                }),
            );
            self.own_subscriptions.lock().push(sub);
        }

        let engine = self.clone();
        let sub = self.client.on_connected(Box::new(move || engine.on_connected()));
        self.own_subscriptions.lock().push(sub);

        let engine = self.clone();
        let sub = self.client.on_exception(Box::new(move |e| {
            tracing::warn!(error = %e, "client reported an exception");
        }));
        self.own_subscriptions.lock().push(sub);

        self.started.store(true, Ordering::SeqCst);
    }

    /// spec §4.2 `on_connected`.
    pub fn on_connected(self: &Arc<Self>) {
        let current = self.client.session_id();
        let mut last = self.last_session_id.lock();
        let same_session = *last == Some(current);

        if same_session {
            drop(last);
            tracing::info!(session_id = current, "reconnected within the same session, draining pending");
            self.process_pending();
            return;
        }

        tracing::info!(session_id = current, "new session, reseeding every registered path");
        self.pending.clear();
        *last = Some(current);
        drop(last);

        for entry in self.statics.read().values().cloned().collect::<Vec<_>>() {
            if !entry.update(self.client.as_ref(), self.notifier.as_ref(), self.now_epoch_ms()) {
                self.pending.enqueue(entry.path().to_string(), PendingKind::Static);
            }
        }
        for dir in self.directories.read().values().cloned().collect::<Vec<_>>() {
            if !self.update_directory_now(&dir) {
                self.pending.enqueue(dir.path().to_string(), PendingKind::Directory);
            }
        }
        for path in self.runtime.paths() {
            if !self.update_runtime_now(&path) {
                self.pending.enqueue(path, PendingKind::Runtime);
            }
        }

        self.warm.release();

        let engine = self.clone();
        self.client.defer(Box::new(move || engine.process_pending()));
    }

    fn run_update_static(self: &Arc<Self>, path: &str) {
        if let Err(e) = self.check_dispatch_thread() {
            tracing::error!(%path, error = %e, "update_static invariant violated");
            return;
        }
        let entry = match self.statics.read().get(path).cloned() {
            Some(e) => e,
            None => return,
        };
        if !self.client.connected() {
            self.pending.enqueue(path.to_string(), PendingKind::Static);
            return;
        }
        if !entry.update(self.client.as_ref(), self.notifier.as_ref(), self.now_epoch_ms()) {
            self.pending.enqueue(path.to_string(), PendingKind::Static);
            let engine = self.clone();
            self.client.defer(Box::new(move || engine.process_pending()));
        }
    }

    fn run_update_directory(self: &Arc<Self>, path: &str) {
        if let Err(e) = self.check_dispatch_thread() {
            tracing::error!(%path, error = %e, "update_directory invariant violated");
            return;
        }
        let dir = match self.directories.read().get(path).cloned() {
            Some(d) => d,
            None => return,
        };
        if !self.client.connected() {
            self.pending.enqueue(path.to_string(), PendingKind::Directory);
            return;
        }
        if !self.update_directory_now(&dir) {
            self.pending.enqueue(path.to_string(), PendingKind::Directory);
            let engine = self.clone();
            self.client.defer(Box::new(move || engine.process_pending()));
        }
    }

    fn run_update_runtime(self: &Arc<Self>, path: &str) {
        if let Err(e) = self.check_dispatch_thread() {
            tracing::error!(%path, error = %e, "update_runtime invariant violated");
            return;
        }
        if !self.client.connected() {
            self.pending.enqueue(path.to_string(), PendingKind::Runtime);
            return;
        }
        if !self.update_runtime_now(path) {
            self.pending.enqueue(path.to_string(), PendingKind::Runtime);
            let engine = self.clone();
            self.client.defer(Box::new(move || engine.process_pending()));
        }
    }

    /// spec §4.2 `update_directory`.
    fn update_directory_now(self: &Arc<Self>, dir: &Arc<dyn AnyDirectory>) -> bool {
        let path = dir.path().to_string();
        let client = self.client.as_ref();
        let stat = match retry_transient(client, &path, || client.stat(&path, true)) {
            Some(s) => s,
            None => return false,
        };

        if !stat.exists {
            let owned = dir.watched_paths();
            self.release_runtime_for(dir, &owned);
            dir.clear();
            self.publish_directory(&path, &[], 0, 0.0, 0);
            return true;
        }

        let children = match retry_transient(client, &path, || client.children(&path, true)) {
            Some(c) => c,
            None => return false,
        };

        let incoming: HashSet<NodePath> = children.iter().map(|c| dir.mapped_path(c)).collect();
        let (added, removed) = dir.diff_against(&incoming);

        for mapped in &added {
            if !dir.shadow_with_static(mapped, &self.statics.read()) {
                self.acquire_runtime_for(dir, mapped);
            }
        }
        self.release_runtime_for(dir, &removed);

        dir.replace_watched(incoming.clone());

        let latency_seconds = (self.now_epoch_ms() as f64 - stat.mtime_ms as f64).max(0.0) / 1000.0;
        let mut paths: Vec<String> = incoming.into_iter().collect();
        paths.sort();
        self.publish_directory(&path, &paths, stat.child_list_version, latency_seconds, stat.data_length);
        true
    }

    fn acquire_runtime_for(self: &Arc<Self>, dir: &Arc<dyn AnyDirectory>, mapped: &NodePath) {
        let owner = dir.id();
        let engine = self.clone();
        let mapped_for_watch = mapped.clone();
        let acquired = self.runtime.acquire(mapped, owner, || {
            let engine = engine.clone();
            let mapped = mapped_for_watch.clone();
            let handler_path = mapped.clone();
            engine.client.register(&handler_path, Box::new(move |_event| engine.run_update_runtime(&mapped)))
        });
        match acquired {
            Ok(true) => self.run_update_runtime(mapped),
            Ok(false) => {}
            Err(e) => tracing::warn!(path = %mapped, error = %e, "runtime watch acquisition rejected"),
        }
    }

    fn release_runtime_for(&self, dir: &Arc<dyn AnyDirectory>, removed: &[NodePath]) {
        let owner = dir.id();
        let statics = self.statics.read();
        for mapped in removed {
            if statics.contains_key(mapped) {
                continue;
            }
            if let Err(e) = self.runtime.release(mapped, owner) {
                tracing::warn!(path = %mapped, error = %e, "runtime watch release rejected");
            }
        }
    }

    fn publish_directory(&self, path: &str, directory_paths: &[String], directory_version: i32, latency_seconds: f64, data_length: i32) {
        publish_directory_event(self.notifier.as_ref(), path, directory_paths, directory_version, latency_seconds, data_length);
    }

    /// spec §4.2 `update_runtime`.
    fn update_runtime_now(&self, path: &str) -> bool {
        let client = self.client.as_ref();
        let stat = match retry_transient(client, path, || client.stat(path, true)) {
            Some(s) => s,
            None => return false,
        };

        let owners = self.owning_directories(path);

        if !stat.exists {
            for dir in &owners {
                dir.remove_runtime_value(path);
            }
            self.publish_runtime(path, false, 0.0, 0);
            return true;
        }

        let (raw, stat) = match retry_transient(client, path, || client.get(path, true)) {
            Some(r) => r,
            None => return false,
        };

        for dir in &owners {
            dir.apply_runtime_value(path, &raw);
        }
        let latency_seconds = (self.now_epoch_ms() as f64 - stat.mtime_ms as f64).max(0.0) / 1000.0;
        self.publish_runtime(path, true, latency_seconds, stat.data_length);
        true
    }

    fn owning_directories(&self, mapped_path: &str) -> Vec<Arc<dyn AnyDirectory>> {
        let by_id = self.directories_by_id.read();
        self.directories
            .read()
            .values()
            .filter(|d| d.is_watched(mapped_path))
            .filter_map(|d| by_id.get(&d.id()).cloned())
            .collect()
    }

    fn publish_runtime(&self, path: &str, exists: bool, latency_seconds: f64, data_length: i32) {
        let mut payload = NotifyPayload::new();
        payload.insert("path".to_string(), path.to_string().into());
        payload.insert("exists".to_string(), exists.into());
        payload.insert("latency_seconds".to_string(), latency_seconds.into());
        payload.insert("data_length".to_string(), (data_length as i64).into());
        self.notifier.publish(NotifyChannel::Runtime, payload);
    }

    /// spec §4.5 `process_pending`.
    pub fn process_pending(self: &Arc<Self>) {
        if self.pending.is_empty() || !self.client.connected() {
            return;
        }
        for (path, kind) in self.pending.snapshot() {
            let succeeded = match kind {
                PendingKind::Static => match self.statics.read().get(&path).cloned() {
                    Some(entry) => entry.update(self.client.as_ref(), self.notifier.as_ref(), self.now_epoch_ms()),
                    None => true,
                },
                PendingKind::Directory => match self.directories.read().get(&path).cloned() {
                    Some(dir) => self.update_directory_now(&dir),
                    None => true,
                },
                PendingKind::Runtime => self.update_runtime_now(&path),
            };
            if succeeded {
                self.pending.remove(&path);
            }
        }
    }

    /// spec §4.6 `close`: unregister everything, drop pending/runtime
    /// state. Does not close the client — the facade decides that based
    /// on ownership.
    pub fn teardown(&self) {
        for sub in self.own_subscriptions.lock().drain(..) {
            sub.unregister();
        }
        self.runtime.clear();
        self.pending.clear();
    }

    /// spec §4.6 `reopen`: reset session tracking and the warm latch so
    /// the next `on_connected` is treated as a fresh session.
    pub fn prepare_reopen(&self) {
        *self.last_session_id.lock() = None;
        self.pending.clear();
        self.warm.reset();
        *self.dispatch_thread.lock() = None;
    }

    pub fn is_runtime_watched(&self, path: &str) -> bool {
        self.runtime.is_watched(path)
    }

    pub fn is_static_registered(&self, path: &str) -> bool {
        self.statics.read().contains_key(path)
    }

    pub fn is_directory_registered(&self, path: &str) -> bool {
        self.directories.read().contains_key(path)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
