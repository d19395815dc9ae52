// SPDX-License-Identifier: MIT

//! Mirror of one directory's children (spec §3 `Directory`, §4.3-§4.4).

use crate::path::{NodePath, PathMapper};
use crate::sentinel::{DeserializeError, DeserializeOutcome, DirectorySlot};
use crate::static_entry::StaticEntry;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// `(bytes) -> V | UseDefault`, pure; used only for non-statically-registered
/// children (spec §3).
pub type DirectoryDeserializer<V> =
    Arc<dyn Fn(&[u8]) -> Result<DeserializeOutcome<V>, DeserializeError> + Send + Sync>;

/// Identity of a registered `Directory`, used to key `RuntimeWatch` owner
/// sets (spec §4.3: "the owner set can be mutated... keyed by identity").
/// Derived from the `Arc`'s address rather than a generated counter so
/// that two `Directory`s never collide regardless of registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryId(usize);

impl DirectoryId {
    pub fn of<V>(dir: &Arc<Directory<V>>) -> Self {
        DirectoryId(Arc::as_ptr(dir) as *const u8 as usize)
    }
}

/// Mirror of one registered directory path.
///
/// `watched` and `values` are independently locked: the invariant
/// `keys(values) ⊆ watched` is maintained by `replace_watched`, which
/// always prunes `values` to the new `watched` set under a single
/// critical section spanning both.
pub struct Directory<V> {
    path: String,
    path_mapper: PathMapper,
    deserializer: DirectoryDeserializer<V>,
    watched: RwLock<HashSet<NodePath>>,
    values: RwLock<HashMap<NodePath, DirectorySlot<V>>>,
}

impl<V: Clone> Directory<V> {
    pub fn new(path: impl Into<String>, path_mapper: PathMapper, deserializer: DirectoryDeserializer<V>) -> Self {
        Self {
            path: path.into(),
            path_mapper,
            deserializer,
            watched: RwLock::new(HashSet::new()),
            values: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mapped_path(&self, child_name: &str) -> NodePath {
        (self.path_mapper)(child_name)
    }

    pub fn deserialize(&self, raw: &[u8]) -> Result<DeserializeOutcome<V>, DeserializeError> {
        (self.deserializer)(raw)
    }

    pub fn watched_snapshot(&self) -> HashSet<NodePath> {
        self.watched.read().clone()
    }

    pub fn is_watched(&self, mapped_path: &str) -> bool {
        self.watched.read().contains(mapped_path)
    }

    /// `added = incoming \ watched`, `removed = watched \ incoming` (spec §4.2).
    /// Does not mutate — callers act on the diff first, then call
    /// [`Self::replace_watched`] once membership has settled.
    pub fn diff_against(&self, incoming: &HashSet<NodePath>) -> (Vec<NodePath>, Vec<NodePath>) {
        let current = self.watched.read();
        let added = incoming.difference(&current).cloned().collect();
        let removed = current.difference(incoming).cloned().collect();
        (added, removed)
    }

    /// Replace `watched` with `incoming` and drop any `values` entries no
    /// longer present (spec §4.2's "drop any values entries no longer in watched").
    pub fn replace_watched(&self, incoming: HashSet<NodePath>) {
        let mut values = self.values.write();
        values.retain(|k, _| incoming.contains(k));
        *self.watched.write() = incoming;
    }

    /// Node is missing: directory empties entirely (spec §4.2).
    pub fn clear(&self) {
        self.watched.write().clear();
        self.values.write().clear();
    }

    pub fn set_static_slot(&self, mapped_path: NodePath, entry: Arc<StaticEntry<V>>) {
        self.values.write().insert(mapped_path, DirectorySlot::Static(entry));
    }

    pub fn set_value(&self, mapped_path: NodePath, value: V) {
        self.values.write().insert(mapped_path, DirectorySlot::Value(value));
    }

    pub fn remove_value(&self, mapped_path: &str) {
        self.values.write().remove(mapped_path);
    }

    /// Snapshot copy with `Static` slots resolved (spec §4.4, §4.6
    /// `fetch_directory_values`).
    pub fn values_snapshot(&self) -> HashMap<NodePath, V> {
        self.values
            .read()
            .iter()
            .map(|(k, slot)| {
                let v = match slot {
                    DirectorySlot::Value(v) => v.clone(),
                    DirectorySlot::Static(entry) => entry.value(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
