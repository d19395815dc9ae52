// SPDX-License-Identifier: MIT

//! Error kinds for the cache, matching spec §7.
//!
//! Each kind is its own `thiserror` enum rather than one flat error type
//! with a discriminant field — the daemon's `LexerError`/`ParseError`
//! split follows the same rule: errors that callers distinguish by
//! `match` deserve distinct types, not a shared kind field to match on.

use thiserror::Error;

/// Invalid parameters supplied during the registration phase.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("path must not be empty")]
    EmptyPath,

    #[error("warm-up timeout must be greater than zero")]
    NonPositiveTimeout,
}

/// Phase violations and other lifecycle misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("path '{0}' is already registered")]
    DuplicatePath(String),

    #[error("cannot register paths after the cache has started")]
    RegisterAfterStart,

    #[error("cache has already been started")]
    AlreadyStarted,

    #[error("cache is closed")]
    Closed,

    #[error("start() requires a client that is neither connected nor connecting")]
    ClientAlreadyConnecting,

    #[error("reopen() is only valid for a running or closed cache")]
    InvalidReopenPhase,
}

/// A reader looked up a path that was never registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("path '{0}' is not registered")]
pub struct PathError(pub String);

/// An internal invariant was violated — typically a thread-discipline bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("update_* called from outside the client's dispatch thread")]
    WrongThread,

    #[error("runtime watch for '{0}' released by an owner that never acquired it")]
    WatchStillOwned(String),

    #[error("duplicate runtime watch installation for '{0}'")]
    DuplicateRuntimeWatch(String),
}
