// SPDX-License-Identifier: MIT

//! The Client capability the engine is driven by (spec §6).
//!
//! Modeled as a trait object rather than a generic parameter threaded
//! through every engine type, the same way the daemon's `AgentAdapter`
//! is consumed as `Arc<dyn AgentAdapter>` by its reconciler rather than
//! monomorphized per adapter.

use crate::error::ClientError;
use std::fmt;
use zkcache_core::Stat;

/// Opaque session identity. Changes across a full session expiry; stable
/// across a transient disconnect/reconnect within the same session.
pub type SessionId = i64;

/// A watch delivery forwarded to a per-path subscription handler
/// (spec §6: `{ path, is_node_event, event_name, state_name }`).
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: String,
    pub is_node_event: bool,
    pub event_name: String,
    pub state_name: String,
}

/// A handle to an installed watch or callback, releasable exactly once.
pub trait Subscription: Send + Sync {
    fn unregister(&self);
}

/// Per-path watch handler invoked on the client's dispatch thread.
pub type WatchHandler = Box<dyn Fn(WatchEvent) + Send + Sync>;
/// `on_connected` handler.
pub type ConnectedHandler = Box<dyn Fn() + Send + Sync>;
/// `on_exception` handler.
pub type ExceptionHandler = Box<dyn Fn(ClientError) + Send + Sync>;
/// Work submitted via `defer`, to run on the dispatch thread.
pub type DeferredTask = Box<dyn FnOnce() + Send>;

/// The coordination-store client capability the engine consumes.
///
/// Every method here either runs on, or schedules work onto, the
/// client's single dispatch thread (spec §5) — the engine never spawns
/// its own threads.
pub trait Client: Send + Sync {
    fn connected(&self) -> bool;
    fn connecting(&self) -> bool;
    fn session_id(&self) -> SessionId;

    fn stat(&self, path: &str, watch: bool) -> Result<Stat, ClientError>;
    fn get(&self, path: &str, watch: bool) -> Result<(Vec<u8>, Stat), ClientError>;
    fn children(&self, path: &str, watch: bool) -> Result<Vec<String>, ClientError>;

    /// Install a per-path watch handler. The returned subscription's
    /// `unregister` releases it; `register` may be called again for the
    /// same path (each read re-arms on the server side).
    fn register(&self, path: &str, handler: WatchHandler) -> Box<dyn Subscription>;

    fn on_connected(&self, handler: ConnectedHandler) -> Box<dyn Subscription>;
    fn on_exception(&self, handler: ExceptionHandler) -> Box<dyn Subscription>;

    /// Submit work to run on the dispatch thread. Used by the engine to
    /// schedule pending-queue drains after a seed or enqueue.
    fn defer(&self, task: DeferredTask);

    /// Tear down and reconnect, presenting a fresh session to
    /// `on_connected` (spec §4.1, §5's fork/reopen path).
    fn reopen(&self) -> Result<(), ClientError>;

    fn close(&self);
}

impl fmt::Debug for dyn Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.connected())
            .field("connecting", &self.connecting())
            .finish_non_exhaustive()
    }
}
