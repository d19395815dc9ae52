// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! zkcache-core: data model, sentinels, and error types for the
//! coordination-data cache.
//!
//! This crate holds only pure, synchronous data structures — no I/O, no
//! thread spawning, no knowledge of any particular coordination store.
//! [`zkcache_adapters`](../zkcache_adapters/index.html) supplies the
//! `Client`/`Notifier` capabilities these types are updated through, and
//! [`zkcache_engine`](../zkcache_engine/index.html) drives the state
//! machine that ties them together.

pub mod clock;
pub mod directory;
pub mod error;
pub mod path;
pub mod pending;
pub mod runtime_watch;
pub mod sentinel;
pub mod stat;
pub mod static_entry;
pub mod warm_latch;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use directory::{Directory, DirectoryDeserializer, DirectoryId};
pub use error::{ArgumentError, CacheError, PathError, StateError};
pub use path::{NodePath, PathMapper};
pub use pending::{PendingKind, PendingQueue};
pub use runtime_watch::RuntimeWatch;
pub use sentinel::{DeserializeError, DeserializeOutcome, DirectorySlot};
pub use stat::Stat;
pub use static_entry::{StaticDeserializer, StaticEntry};
pub use warm_latch::WarmLatch;
