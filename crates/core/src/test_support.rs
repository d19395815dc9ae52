// SPDX-License-Identifier: MIT

//! Small fixture builders shared by this crate's tests and by downstream
//! crates' tests (gated the same way `zkcache_adapters::fake` is).

use crate::directory::{Directory, DirectoryDeserializer};
use crate::path::PathMapper;
use crate::sentinel::DeserializeOutcome;
use crate::static_entry::{StaticDeserializer, StaticEntry};
use std::sync::Arc;

/// A `StaticEntry<String>` whose deserializer treats the raw bytes as
/// UTF-8 and always succeeds, for tests that only care about
/// value/valid/stat transitions rather than deserialization failure.
pub fn utf8_static_entry(path: impl Into<String>, default_value: impl Into<String>) -> StaticEntry<String> {
    StaticEntry::new(path, default_value.into(), utf8_static_deserializer())
}

pub fn utf8_static_deserializer() -> StaticDeserializer<String> {
    Arc::new(|raw: &[u8], _stat| Ok(DeserializeOutcome::Value(String::from_utf8_lossy(raw).to_string())))
}

/// A `Directory<String>` whose children are mapped as `{base}/{child}`
/// and deserialized as UTF-8.
pub fn utf8_directory(base: impl Into<String>) -> Directory<String> {
    let base = base.into();
    Directory::new(base.clone(), utf8_path_mapper(base), utf8_directory_deserializer())
}

pub fn utf8_path_mapper(base: impl Into<String>) -> PathMapper {
    let base = base.into();
    Arc::new(move |child: &str| format!("{base}/{child}"))
}

pub fn utf8_directory_deserializer() -> DirectoryDeserializer<String> {
    Arc::new(|raw: &[u8]| Ok(DeserializeOutcome::Value(String::from_utf8_lossy(raw).to_string())))
}
