// SPDX-License-Identifier: MIT

//! Tracks paths awaiting their first update after (re)connect (spec §5).

use crate::path::NodePath;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Which registry a pending path belongs to, so the dispatch loop knows
/// which `update_*` to call once the Client delivers data for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Static,
    Directory,
    Runtime,
}

/// Paths the engine has asked the Client to watch but has not yet heard
/// back from (spec §5: "warm" only once this is empty).
#[derive(Default)]
pub struct PendingQueue {
    inner: Mutex<HashMap<NodePath, PendingKind>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    pub fn enqueue(&self, path: NodePath, kind: PendingKind) {
        self.inner.lock().insert(path, kind);
    }

    pub fn remove(&self, path: &str) -> Option<PendingKind> {
        self.inner.lock().remove(path)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(NodePath, PendingKind)> {
        self.inner.lock().iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
