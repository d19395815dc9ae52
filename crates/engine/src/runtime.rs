// SPDX-License-Identifier: MIT

//! Registries the engine consults: the frozen static/directory tables
//! and the dynamic, reference-counted runtime-watch set (spec §4.3).

use crate::any_entry::{AnyDirectory, AnyStaticEntry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use zkcache_adapters::Subscription;
use zkcache_core::{DirectoryId, NodePath, RuntimeWatch, StateError};

pub type StaticRegistry = HashMap<NodePath, Arc<dyn AnyStaticEntry>>;
pub type DirectoryRegistry = HashMap<NodePath, Arc<dyn AnyDirectory>>;
pub type DirectoryByIdRegistry = HashMap<DirectoryId, Arc<dyn AnyDirectory>>;

/// Dynamic set of paths watched on behalf of directories, reference
/// counted by owning directory identity (spec §4.3).
///
/// Acquisition/release is only ever called from the dispatch thread
/// (the WatchEngine's invariant, §4.3), so the only synchronization this
/// needs is against concurrent *readers* doing introspection
/// (`is_runtime_watched`), hence a plain mutex rather than anything
/// lock-free.
pub struct RuntimeRegistry {
    watches: Mutex<HashMap<NodePath, RuntimeWatch<Box<dyn Subscription>>>>,
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self { watches: Mutex::new(HashMap::new()) }
    }

    /// Record `owner` as wanting `path` watched. If no watch exists yet,
    /// calls `install` to obtain a fresh subscription and returns `Ok(true)`
    /// (caller should treat this as "newly acquired, seed it"); if a watch
    /// already exists, just adds the owner and returns `Ok(false)`.
    ///
    /// Errs with `DuplicateRuntimeWatch` if `owner` had already acquired
    /// `path` without an intervening `release` — a caller bug.
    pub fn acquire(
        &self,
        path: &NodePath,
        owner: DirectoryId,
        install: impl FnOnce() -> Box<dyn Subscription>,
    ) -> Result<bool, StateError> {
        let mut watches = self.watches.lock();
        match watches.get_mut(path) {
            Some(existing) => {
                if existing.add_owner(owner) {
                    Ok(false)
                } else {
                    Err(StateError::DuplicateRuntimeWatch(path.clone()))
                }
            }
            None => {
                watches.insert(path.clone(), RuntimeWatch::new(owner, install()));
                Ok(true)
            }
        }
    }

    /// Release `owner`'s interest in `path`. If that was the last owner,
    /// the subscription is unregistered and the entry dropped.
    ///
    /// Errs with `WatchStillOwned` if `owner` never held `path` (a stray
    /// release) or if `path` has no runtime watch at all.
    pub fn release(&self, path: &str, owner: DirectoryId) -> Result<(), StateError> {
        let torn_down_sub = {
            let mut watches = self.watches.lock();
            match watches.get_mut(path).map(|rw| rw.remove_owner(owner)) {
                Some(Some(true)) => watches.remove(path),
                Some(Some(false)) => return Ok(()),
                Some(None) | None => return Err(StateError::WatchStillOwned(path.to_string())),
            }
        };
        if let Some(rw) = torn_down_sub {
            rw.subscription().unregister();
        }
        Ok(())
    }

    pub fn is_watched(&self, path: &str) -> bool {
        self.watches.lock().contains_key(path)
    }

    pub fn watched_count(&self) -> usize {
        self.watches.lock().len()
    }

    /// Every path currently runtime-watched, for reseeding after a
    /// session change (spec §4.2's "re-seed every currently watched
    /// runtime path").
    pub fn paths(&self) -> Vec<NodePath> {
        self.watches.lock().keys().cloned().collect()
    }

    pub fn clear(&self) {
        let mut watches = self.watches.lock();
        for (_, rw) in watches.drain() {
            rw.subscription().unregister();
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
