// SPDX-License-Identifier: MIT

//! Node metadata returned by the Client's `stat`/`get` calls (spec §6).

/// Metadata for a coordination-store node, as returned by `Client::stat`
/// and alongside `Client::get`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stat {
    /// Whether the node exists. `false` only appears on a `stat` result;
    /// `Client::get` is never called against a node known not to exist.
    pub exists: bool,
    /// Data version, incremented on every successful write.
    pub version: i32,
    /// Child-list version, incremented on every add/remove of a child.
    pub child_list_version: i32,
    /// Last-modified time, milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    /// Length in bytes of the node's data payload.
    pub data_length: i32,
}

impl Stat {
    /// A `Stat` for a node that does not exist. `version`/`child_list_version`
    /// are `-1` by ZooKeeper convention for nonexistent nodes.
    pub fn missing() -> Self {
        Self { exists: false, version: -1, child_list_version: -1, mtime_ms: 0, data_length: 0 }
    }
}
