// SPDX-License-Identifier: MIT

//! Mirror of one statically-registered path (spec §3 `StaticEntry`).
//!
//! Holds only pure state; the dispatch-thread I/O that fills it in lives
//! in `zkcache_engine::watch_engine`. The `(value, valid, stat)` triple
//! is `parking_lot::RwLock`-protected so readers never observe a torn
//! update, matching `Clock`/`KubeMeta` style locking elsewhere in this
//! workspace.

use crate::sentinel::DeserializeError;
use crate::stat::Stat;
use parking_lot::RwLock;
use std::sync::Arc;

/// `(bytes, Stat) -> V | UseDefault`, pure, may fail.
pub type StaticDeserializer<V> =
    Arc<dyn Fn(&[u8], &Stat) -> Result<crate::DeserializeOutcome<V>, DeserializeError> + Send + Sync>;

struct StaticState<V> {
    value: V,
    valid: bool,
    stat: Option<Stat>,
}

/// Mirror of one registered static path.
///
/// Created during the registration phase and frozen in identity from
/// then on: only its interior `(value, valid, stat)` triple mutates, and
/// only from the dispatch thread (spec §5).
pub struct StaticEntry<V> {
    path: String,
    default_value: V,
    deserializer: StaticDeserializer<V>,
    state: RwLock<StaticState<V>>,
}

impl<V: Clone> StaticEntry<V> {
    pub fn new(path: impl Into<String>, default_value: V, deserializer: StaticDeserializer<V>) -> Self {
        let path = path.into();
        let state = StaticState { value: default_value.clone(), valid: false, stat: None };
        Self { path, default_value, deserializer, state: RwLock::new(state) }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn default_value(&self) -> &V {
        &self.default_value
    }

    pub fn deserializer(&self) -> &StaticDeserializer<V> {
        &self.deserializer
    }

    /// spec §4.6 `fetch`.
    pub fn value(&self) -> V {
        self.state.read().value.clone()
    }

    /// spec §4.6 `fetch_valid`.
    pub fn valid_value(&self) -> Option<V> {
        let st = self.state.read();
        st.valid.then(|| st.value.clone())
    }

    pub fn stat(&self) -> Option<Stat> {
        self.state.read().stat
    }

    /// Node does not exist: entry becomes invalid at the default value.
    /// Returns the previous value for the Notifier's `old_value` field.
    pub fn mark_missing(&self) -> V {
        let mut st = self.state.write();
        let old = st.value.clone();
        st.value = self.default_value.clone();
        st.valid = false;
        st.stat = Some(Stat::missing());
        old
    }

    /// Successful, non-`UseDefault` deserialization.
    pub fn mark_value(&self, value: V, stat: Stat) -> V {
        let mut st = self.state.write();
        let old = st.value.clone();
        st.value = value;
        st.valid = true;
        st.stat = Some(stat);
        old
    }

    /// `UseDefault` sentinel or a caught deserializer error: both collapse
    /// to "default value, invalid" (spec §4.2); the caller distinguishes
    /// them only for logging/notification purposes.
    pub fn mark_invalid(&self, stat: Stat) -> V {
        let mut st = self.state.write();
        let old = st.value.clone();
        st.value = self.default_value.clone();
        st.valid = false;
        st.stat = Some(stat);
        old
    }
}

#[cfg(test)]
#[path = "static_entry_tests.rs"]
mod tests;
