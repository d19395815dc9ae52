// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! zkcache-engine: the WatchEngine update FSM, its registries, and the
//! CacheFacade lifecycle/reader surface built on top of
//! [`zkcache_core`]'s data model and [`zkcache_adapters`]'s Client/Notifier
//! capabilities.

mod any_entry;
mod engine;
mod facade;
mod runtime;

pub use any_entry::{AnyDirectory, AnyStaticEntry, DirectoryHandle, StaticEntryHandle};
pub use engine::WatchEngine;
pub use facade::{open, open_owning, CacheConfig, CacheFacade, CachePhase, OpenError};
pub use runtime::{DirectoryByIdRegistry, DirectoryRegistry, RuntimeRegistry, StaticRegistry};
