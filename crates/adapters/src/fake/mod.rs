// SPDX-License-Identifier: MIT

//! `FakeClient`: an in-process stand-in coordination store, driven
//! synchronously by tests rather than a real ZooKeeper ensemble.
//!
//! Grounded on `FakeNotifyAdapter`'s role as the one fake shipped
//! alongside a real adapter, but considerably larger: the Client
//! capability has real server-side state (nodes, children, watches,
//! sessions) a notifier fake never needed.
//!
//! Every method that models a server event (`create`, `delete`,
//! `connect`, `disconnect`, `expire_session`) runs its side effects
//! (watch callbacks, `on_connected` handlers) synchronously on the
//! calling thread, standing in for the dispatch thread spec §5 requires
//! — tests drive this type from what is, in effect, the dispatch thread.
//!
//! Watch model: `register(path, handler)` installs a long-lived,
//! per-path handler (the engine calls this once per path at `start`).
//! Each `stat`/`get`/`children` call with `watch=true` arms a one-shot
//! flag for that path; the next mutation to the node fires the
//! registered handler and consumes the flag, mirroring a real ensemble's
//! single-shot server-side watch riding on top of a stable client-side
//! callback.

use crate::client::{Client, ConnectedHandler, DeferredTask, ExceptionHandler, Subscription, WatchEvent, WatchHandler};
use crate::error::ClientError;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use zkcache_core::Stat;

struct FakeNode {
    data: Vec<u8>,
    version: i32,
    mtime_ms: i64,
}

struct ArmedHandler<H> {
    handler: Mutex<Option<H>>,
    cancelled: Arc<AtomicBool>,
}

struct FakeSubscription {
    cancelled: Arc<AtomicBool>,
}

impl Subscription for FakeSubscription {
    fn unregister(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

struct FakeState {
    connected: bool,
    connecting: bool,
    session_id: i64,
    nodes: HashMap<String, FakeNode>,
    children: HashMap<String, BTreeSet<String>>,
    child_versions: HashMap<String, i32>,
    data_handlers: HashMap<String, Arc<ArmedHandler<WatchHandler>>>,
    children_handlers: HashMap<String, Arc<ArmedHandler<WatchHandler>>>,
    armed_data: HashSet<String>,
    armed_children: HashSet<String>,
    on_connected: Vec<Arc<ArmedHandler<ConnectedHandler>>>,
    on_exception: Vec<Arc<ArmedHandler<ExceptionHandler>>>,
    deferred: VecDeque<DeferredTask>,
    pending_errors: HashMap<String, ClientError>,
    next_mtime: i64,
}

/// In-process fake of the Client capability (spec §6).
#[derive(Clone)]
pub struct FakeClient {
    inner: Arc<Mutex<FakeState>>,
    session_counter: Arc<AtomicI64>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                connected: false,
                connecting: false,
                session_id: 1,
                nodes: HashMap::new(),
                children: HashMap::new(),
                child_versions: HashMap::new(),
                data_handlers: HashMap::new(),
                children_handlers: HashMap::new(),
                armed_data: HashSet::new(),
                armed_children: HashSet::new(),
                on_connected: Vec::new(),
                on_exception: Vec::new(),
                deferred: VecDeque::new(),
                pending_errors: HashMap::new(),
                next_mtime: 1,
            })),
            session_counter: Arc::new(AtomicI64::new(1)),
        }
    }

    fn parent_of(path: &str) -> Option<String> {
        let idx = path.rfind('/')?;
        if idx == 0 {
            Some("/".to_string())
        } else {
            Some(path[..idx].to_string())
        }
    }

    fn child_name(path: &str) -> String {
        path.rsplit('/').next().unwrap_or(path).to_string()
    }

    /// Transition to connected and fire `on_connected` handlers, same
    /// session id as before (a fresh `FakeClient` starts disconnected so
    /// tests control exactly when the initial seed happens).
    pub fn connect(&self) {
        let handlers: Vec<_> = {
            let mut st = self.inner.lock();
            st.connected = true;
            st.connecting = false;
            st.on_connected.clone()
        };
        for h in handlers {
            if !h.cancelled.load(Ordering::SeqCst) {
                if let Some(f) = h.handler.lock().as_ref() {
                    f();
                }
            }
        }
    }

    /// Simulate a transient outage: session survives, watches stay
    /// armed server-side (spec §8 scenario 6).
    pub fn disconnect(&self) {
        self.inner.lock().connected = false;
    }

    /// Simulate a session expiry: a brand new session id and every
    /// armed server-side watch dropped (registered handlers persist —
    /// re-arming is the engine's job on reseed) (spec §8 scenario 7).
    pub fn expire_session(&self) {
        {
            let mut st = self.inner.lock();
            st.session_id = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
            st.armed_data.clear();
            st.armed_children.clear();
        }
        self.connect();
    }

    /// Queue a one-shot error for the next `stat`/`get`/`children` call
    /// against `path`.
    pub fn inject_error(&self, path: &str, error: ClientError) {
        self.inner.lock().pending_errors.insert(path.to_string(), error);
    }

    fn take_pending_error(&self, path: &str) -> Option<ClientError> {
        self.inner.lock().pending_errors.remove(path)
    }

    fn tick_mtime(st: &mut FakeState) -> i64 {
        let m = st.next_mtime;
        st.next_mtime += 1;
        m
    }

    /// Create or overwrite a node's data, registering it as a child of
    /// its parent path, and fire the armed data watch for `path` plus the
    /// armed children watch for its parent, if any.
    pub fn create(&self, path: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let (data_handler, children_handler) = {
            let mut st = self.inner.lock();
            let mtime = Self::tick_mtime(&mut st);
            let existing_version = st.nodes.get(path).map(|n| n.version).unwrap_or(-1);
            st.nodes.insert(path.to_string(), FakeNode { data, version: existing_version + 1, mtime_ms: mtime });

            if let Some(parent) = Self::parent_of(path) {
                let set = st.children.entry(parent.clone()).or_default();
                if set.insert(Self::child_name(path)) {
                    *st.child_versions.entry(parent).or_insert(0) += 1;
                }
            }

            let st = &mut *st;
            let dh = Self::take_if_armed(&mut st.armed_data, &st.data_handlers, path);
            let parent = Self::parent_of(path);
            let ch = parent.and_then(|p| Self::take_if_armed(&mut st.armed_children, &st.children_handlers, &p).map(|h| (p, h)));
            (dh.map(|h| (path.to_string(), h)), ch)
        };
        if let Some((p, h)) = data_handler {
            Self::fire(&p, true, &h);
        }
        if let Some((p, h)) = children_handler {
            Self::fire(&p, false, &h);
        }
    }

    /// Register `name` as a bare child of `parent` with no data node of
    /// its own (spec §8 scenario 4's `mkdir`).
    pub fn mkdir(&self, parent: &str, name: &str) {
        let handler = {
            let mut st = self.inner.lock();
            let set = st.children.entry(parent.to_string()).or_default();
            if set.insert(name.to_string()) {
                *st.child_versions.entry(parent.to_string()).or_insert(0) += 1;
            }
            let st = &mut *st;
            Self::take_if_armed(&mut st.armed_children, &st.children_handlers, parent)
        };
        if let Some(h) = handler {
            Self::fire(parent, false, &h);
        }
    }

    /// Delete a node and drop it from its parent's child set.
    pub fn delete(&self, path: &str) {
        let (data_handler, children_handler) = {
            let mut st = self.inner.lock();
            st.nodes.remove(path);
            if let Some(parent) = Self::parent_of(path) {
                if let Some(set) = st.children.get_mut(&parent) {
                    if set.remove(&Self::child_name(path)) {
                        *st.child_versions.entry(parent.clone()).or_insert(0) += 1;
                    }
                }
            }
            let st = &mut *st;
            let dh = Self::take_if_armed(&mut st.armed_data, &st.data_handlers, path);
            let parent = Self::parent_of(path);
            let ch = parent.and_then(|p| Self::take_if_armed(&mut st.armed_children, &st.children_handlers, &p).map(|h| (p, h)));
            (dh.map(|h| (path.to_string(), h)), ch)
        };
        if let Some((p, h)) = data_handler {
            Self::fire(&p, true, &h);
        }
        if let Some((p, h)) = children_handler {
            Self::fire(&p, false, &h);
        }
    }

    fn take_if_armed(
        armed: &mut HashSet<String>,
        handlers: &HashMap<String, Arc<ArmedHandler<WatchHandler>>>,
        path: &str,
    ) -> Option<Arc<ArmedHandler<WatchHandler>>> {
        if !armed.remove(path) {
            return None;
        }
        handlers.get(path).cloned()
    }

    fn fire(path: &str, is_node_event: bool, handler: &Arc<ArmedHandler<WatchHandler>>) {
        if handler.cancelled.load(Ordering::SeqCst) {
            return;
        }
        if let Some(f) = handler.handler.lock().as_ref() {
            let event_name = if is_node_event { "NodeDataChanged" } else { "NodeChildrenChanged" };
            f(WatchEvent { path: path.to_string(), is_node_event, event_name: event_name.to_string(), state_name: "SyncConnected".to_string() });
        }
    }

    /// Run every task submitted via `defer` so far, in FIFO order.
    pub fn run_deferred(&self) {
        loop {
            let task = self.inner.lock().deferred.pop_front();
            match task {
                Some(t) => t(),
                None => break,
            }
        }
    }

    pub fn has_data_watch(&self, path: &str) -> bool {
        self.inner.lock().armed_data.contains(path)
    }

    pub fn has_children_watch(&self, path: &str) -> bool {
        self.inner.lock().armed_children.contains(path)
    }
}

impl Client for FakeClient {
    fn connected(&self) -> bool {
        self.inner.lock().connected
    }

    fn connecting(&self) -> bool {
        self.inner.lock().connecting
    }

    fn session_id(&self) -> i64 {
        self.inner.lock().session_id
    }

    fn stat(&self, path: &str, watch: bool) -> Result<Stat, ClientError> {
        if let Some(err) = self.take_pending_error(path) {
            return Err(err);
        }
        if !self.connected() {
            return Err(ClientError::Transient(format!("not connected: {path}")));
        }
        let mut st = self.inner.lock();
        let stat = match st.nodes.get(path) {
            Some(n) => Stat {
                exists: true,
                version: n.version,
                child_list_version: *st.child_versions.get(path).unwrap_or(&0),
                mtime_ms: n.mtime_ms,
                data_length: n.data.len() as i32,
            },
            None => Stat::missing(),
        };
        if watch {
            st.armed_data.insert(path.to_string());
        }
        Ok(stat)
    }

    fn get(&self, path: &str, watch: bool) -> Result<(Vec<u8>, Stat), ClientError> {
        if let Some(err) = self.take_pending_error(path) {
            return Err(err);
        }
        if !self.connected() {
            return Err(ClientError::Transient(format!("not connected: {path}")));
        }
        let mut st = self.inner.lock();
        let child_list_version = *st.child_versions.get(path).unwrap_or(&0);
        let node = st.nodes.get(path).ok_or_else(|| ClientError::Terminal(format!("no node: {path}")))?;
        let stat = Stat { exists: true, version: node.version, child_list_version, mtime_ms: node.mtime_ms, data_length: node.data.len() as i32 };
        let data = node.data.clone();
        if watch {
            st.armed_data.insert(path.to_string());
        }
        Ok((data, stat))
    }

    fn children(&self, path: &str, watch: bool) -> Result<Vec<String>, ClientError> {
        if let Some(err) = self.take_pending_error(path) {
            return Err(err);
        }
        if !self.connected() {
            return Err(ClientError::Transient(format!("not connected: {path}")));
        }
        let mut st = self.inner.lock();
        let names = st.children.get(path).cloned().unwrap_or_default();
        if watch {
            st.armed_children.insert(path.to_string());
        }
        Ok(names.into_iter().collect())
    }

    fn register(&self, path: &str, handler: WatchHandler) -> Box<dyn Subscription> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(ArmedHandler { handler: Mutex::new(Some(handler)), cancelled: cancelled.clone() });
        let mut st = self.inner.lock();
        st.data_handlers.insert(path.to_string(), slot.clone());
        st.children_handlers.insert(path.to_string(), slot);
        Box::new(FakeSubscription { cancelled })
    }

    fn on_connected(&self, handler: ConnectedHandler) -> Box<dyn Subscription> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(ArmedHandler { handler: Mutex::new(Some(handler)), cancelled: cancelled.clone() });
        self.inner.lock().on_connected.push(slot);
        Box::new(FakeSubscription { cancelled })
    }

    fn on_exception(&self, handler: ExceptionHandler) -> Box<dyn Subscription> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(ArmedHandler { handler: Mutex::new(Some(handler)), cancelled: cancelled.clone() });
        self.inner.lock().on_exception.push(slot);
        Box::new(FakeSubscription { cancelled })
    }

    fn defer(&self, task: DeferredTask) {
        self.inner.lock().deferred.push_back(task);
    }

    fn reopen(&self) -> Result<(), ClientError> {
        self.disconnect();
        {
            let mut st = self.inner.lock();
            st.data_handlers.clear();
            st.children_handlers.clear();
        }
        self.expire_session();
        Ok(())
    }

    fn close(&self) {
        let mut st = self.inner.lock();
        st.connected = false;
        st.data_handlers.clear();
        st.children_handlers.clear();
        st.armed_data.clear();
        st.armed_children.clear();
        st.on_connected.clear();
        st.on_exception.clear();
        st.deferred.clear();
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
