// SPDX-License-Identifier: MIT

//! Type-erased handles to `StaticEntry<V>`/`Directory<V>`.
//!
//! `zkcache-core` holds the concrete `V`-generic types; the facade keeps
//! every registered path in one table regardless of its value type, the
//! same way the daemon's event bus dispatches heterogeneous `Event`
//! payloads through one channel rather than one channel per variant.
//! `as_any` is the trapdoor back to the concrete type for the reader API,
//! which *is* generic per call (`fetch::<String>("/x/boom")`).

use crate::runtime::StaticRegistry;
use std::any::Any;
use std::collections::HashSet;
use zkcache_core::{DeserializeOutcome, Directory, DirectoryId, NodePath, StaticEntry};
use zkcache_adapters::{Client, Notifier};

/// Type-erased view of one registered static path.
pub trait AnyStaticEntry: Send + Sync {
    fn path(&self) -> &str;

    /// Run one update pass (spec §4.2 `update_static`). `true` on
    /// success (including a deserializer failure, which still counts as
    /// a successful pass), `false` on a terminal client error.
    ///
    /// `now_epoch_ms` is passed in rather than a `Clock` object — `Clock`
    /// requires `Clone`, which rules out a trait object, and the only
    /// thing an update pass needs from it is "now" for latency
    /// publication.
    fn update(&self, client: &dyn Client, notifier: &dyn Notifier, now_epoch_ms: u64) -> bool;

    /// Publishes the one-time registration-time event for the default
    /// value (spec §4.1), before any update pass has run.
    fn publish_registered(&self, notifier: &dyn Notifier);

    fn as_any(&self) -> &dyn Any;
}

/// Concrete-`V` wrapper implementing [`AnyStaticEntry`].
pub struct StaticEntryHandle<V> {
    pub entry: std::sync::Arc<StaticEntry<V>>,
}

impl<V> StaticEntryHandle<V> {
    pub fn new(entry: std::sync::Arc<StaticEntry<V>>) -> Self {
        Self { entry }
    }
}

impl<V: Clone + Send + Sync + std::fmt::Debug + 'static> AnyStaticEntry for StaticEntryHandle<V> {
    fn path(&self) -> &str {
        self.entry.path()
    }

    fn update(&self, client: &dyn Client, notifier: &dyn Notifier, now_epoch_ms: u64) -> bool {
        crate::engine::update_static_entry(&self.entry, client, notifier, now_epoch_ms)
    }

    fn publish_registered(&self, notifier: &dyn Notifier) {
        crate::engine::publish_value(
            notifier,
            zkcache_adapters::NotifyChannel::Static,
            self.entry.path(),
            self.entry.default_value(),
            0.0,
            0,
            0,
            None,
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Type-erased view of one registered directory path.
pub trait AnyDirectory: Send + Sync {
    fn path(&self) -> &str;
    fn id(&self) -> DirectoryId;
    fn mapped_path(&self, child_name: &str) -> NodePath;
    fn diff_against(&self, incoming: &HashSet<NodePath>) -> (Vec<NodePath>, Vec<NodePath>);
    fn replace_watched(&self, incoming: HashSet<NodePath>);
    fn watched_paths(&self) -> Vec<NodePath>;
    fn is_watched(&self, mapped_path: &str) -> bool;
    fn clear(&self);

    /// If `statics` has a same-typed `StaticEntry` for `mapped_path`,
    /// record the directory slot as shadowed by it and return `true`
    /// (spec §4.4).
    fn shadow_with_static(&self, mapped_path: &str, statics: &StaticRegistry) -> bool;

    fn apply_runtime_value(&self, mapped_path: &str, raw: &[u8]);
    fn remove_runtime_value(&self, mapped_path: &str);

    /// Publishes the one-time registration-time event for the empty
    /// directory (spec §4.1), before any update pass has run.
    fn publish_registered(&self, notifier: &dyn Notifier);

    fn as_any(&self) -> &dyn Any;
}

/// Concrete-`V` wrapper implementing [`AnyDirectory`].
pub struct DirectoryHandle<V> {
    pub dir: std::sync::Arc<Directory<V>>,
    id: DirectoryId,
}

impl<V: Clone + Send + Sync + 'static> DirectoryHandle<V> {
    pub fn new(dir: std::sync::Arc<Directory<V>>) -> Self {
        let id = DirectoryId::of(&dir);
        Self { dir, id }
    }
}

impl<V: Clone + Send + Sync + 'static> AnyDirectory for DirectoryHandle<V> {
    fn path(&self) -> &str {
        self.dir.path()
    }

    fn id(&self) -> DirectoryId {
        self.id
    }

    fn mapped_path(&self, child_name: &str) -> NodePath {
        self.dir.mapped_path(child_name)
    }

    fn diff_against(&self, incoming: &HashSet<NodePath>) -> (Vec<NodePath>, Vec<NodePath>) {
        self.dir.diff_against(incoming)
    }

    fn replace_watched(&self, incoming: HashSet<NodePath>) {
        self.dir.replace_watched(incoming)
    }

    fn watched_paths(&self) -> Vec<NodePath> {
        self.dir.watched_snapshot().into_iter().collect()
    }

    fn is_watched(&self, mapped_path: &str) -> bool {
        self.dir.is_watched(mapped_path)
    }

    fn clear(&self) {
        self.dir.clear()
    }

    fn shadow_with_static(&self, mapped_path: &str, statics: &StaticRegistry) -> bool {
        let Some(any_static) = statics.get(mapped_path) else {
            return false;
        };
        match any_static.as_any().downcast_ref::<StaticEntryHandle<V>>() {
            Some(handle) => {
                self.dir.set_static_slot(mapped_path.to_string(), handle.entry.clone());
                true
            }
            None => {
                tracing::warn!(path = %mapped_path, "static entry exists but its value type does not match this directory's — not shadowing");
                false
            }
        }
    }

    fn apply_runtime_value(&self, mapped_path: &str, raw: &[u8]) {
        match self.dir.deserialize(raw) {
            Ok(DeserializeOutcome::Value(v)) => self.dir.set_value(mapped_path.to_string(), v),
            Ok(DeserializeOutcome::UseDefault) => self.dir.remove_value(mapped_path),
            Err(e) => {
                tracing::warn!(path = %mapped_path, error = %e, "directory child deserialization failed");
                self.dir.remove_value(mapped_path);
            }
        }
    }

    fn remove_runtime_value(&self, mapped_path: &str) {
        self.dir.remove_value(mapped_path);
    }

    fn publish_registered(&self, notifier: &dyn Notifier) {
        crate::engine::publish_directory_event(notifier, self.dir.path(), &[], 0, 0.0, 0);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
