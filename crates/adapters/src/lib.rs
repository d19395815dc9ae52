// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! zkcache-adapters: the Client and Notifier capabilities the cache
//! engine is driven by and publishes through, plus real and fake
//! implementations of both.
//!
//! [`zkcache_engine`](../zkcache_engine/index.html) never touches
//! [`zk`] or [`fake`] directly beyond the `Client`/`Notifier` trait
//! objects this crate exposes — swapping `ZkClient` for `FakeClient` in
//! a test is a construction-site decision, not a code-path difference.

pub mod client;
pub mod error;
pub mod notify;
pub mod zk;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{Client, ConnectedHandler, DeferredTask, ExceptionHandler, SessionId, Subscription, WatchEvent, WatchHandler};
pub use error::ClientError;
pub use notify::{NotifyChannel, NotifyPayload, NotifyValue, Notifier, TracingNotifier};
pub use zk::ZkClient;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClient;

#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
