// SPDX-License-Identifier: MIT

//! `USE_DEFAULT` and `STATIC` sentinels (spec §6, §9).
//!
//! The spec asks for "identity-unique markers — never a value that
//! could legitimately appear as user data" and suggests "a distinguished
//! type tag" as one valid representation for a target language. Rust's
//! enums give us that for free: a deserializer that wants to force the
//! default returns the `UseDefault` *variant*, not a sentinel value of
//! type `V` that some unlucky caller's `V` might also produce.

/// Result of applying a deserializer to raw node bytes.
///
/// `UseDefault` forces the entry back to its default value with
/// `valid = false`, exactly as if the node did not exist, without
/// actually deleting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeserializeOutcome<V> {
    Value(V),
    UseDefault,
}

impl<V> DeserializeOutcome<V> {
    pub fn into_option(self) -> Option<V> {
        match self {
            DeserializeOutcome::Value(v) => Some(v),
            DeserializeOutcome::UseDefault => None,
        }
    }
}

/// A single slot in a [`crate::Directory`]'s `values` map.
///
/// `Static(entry)` means "resolve this mapped_path via that StaticEntry
/// instead of this directory's own deserializer" (spec §4.4) and is
/// never observable outside the engine — `fetch_directory_values`
/// always resolves it away before returning. Holding the entry directly
/// (rather than a path to re-look-up in some global table) keeps
/// `Directory<V>` self-contained: resolution at snapshot time never
/// needs a second, type-erased lookup.
#[derive(Clone)]
pub enum DirectorySlot<V> {
    Value(V),
    Static(std::sync::Arc<crate::StaticEntry<V>>),
}

/// A deserializer raised an error while parsing node bytes.
///
/// Caught by the engine (spec §7): the entry becomes invalid and the
/// message is attached to the published event, but the update pass
/// itself still counts as successful.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DeserializeError(pub String);
