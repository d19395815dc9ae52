// SPDX-License-Identifier: MIT

//! `CacheFacade`: lifecycle, registration, and reader surface (spec §4.1,
//! §4.6).

use crate::any_entry::{AnyDirectory, AnyStaticEntry, DirectoryHandle, StaticEntryHandle};
use crate::engine::WatchEngine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use zkcache_adapters::{Client, ClientError, Notifier, TracingNotifier, ZkClient};
use zkcache_core::{
    ArgumentError, CacheError, Clock, Directory, DirectoryDeserializer, NodePath, PathError, PathMapper, StaticDeserializer, StaticEntry,
};

/// Composite error for the cache-owning constructor (spec §4.1), which can
/// fail for any of three independent reasons the rest of the crate keeps
/// as distinct types.
#[derive(Debug, Error, Clone)]
pub enum OpenError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Lifecycle phase (spec §4.1). Static/directory registration is only
/// valid in `Registering`; readers only make sense once `start` has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    Registering,
    Running,
    Closed,
}

/// Parameters for the cache-owning construction mode (spec §4.1): the
/// facade builds its own `ZkClient` from `host`, waits up to
/// `connect_timeout` for the initial connect, then up to `warm_timeout`
/// for the warm latch once registration and `start` have run.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: String,
    pub connect_timeout: Duration,
    pub warm_timeout: Duration,
}

impl CacheConfig {
    fn validate(&self) -> Result<(), ArgumentError> {
        if self.host.trim().is_empty() {
            return Err(ArgumentError::EmptyPath);
        }
        if self.connect_timeout.is_zero() || self.warm_timeout.is_zero() {
            return Err(ArgumentError::NonPositiveTimeout);
        }
        Ok(())
    }
}

/// The cache's public surface: registration during `Registering`,
/// `fetch*`/introspection once `Running`.
pub struct CacheFacade<C: Clock> {
    engine: Arc<WatchEngine<C>>,
    phase: Mutex<CachePhase>,
    owns_client: bool,
}

impl<C: Clock + 'static> CacheFacade<C> {
    /// Non-owning construction: the caller supplies an already-built
    /// (but not yet connected) `Client` and drives `start`/`close`/
    /// `reopen` itself.
    pub fn new(notifier: Arc<dyn Notifier>, clock: C, client: Arc<dyn Client>) -> Self {
        let warm = Arc::new(zkcache_core::WarmLatch::new());
        let engine = WatchEngine::new(notifier, clock, warm, client);
        Self { engine, phase: Mutex::new(CachePhase::Registering), owns_client: false }
    }

    pub fn phase(&self) -> CachePhase {
        *self.phase.lock()
    }

    fn require_registering(&self) -> Result<(), CacheError> {
        match *self.phase.lock() {
            CachePhase::Registering => Ok(()),
            CachePhase::Running => Err(CacheError::RegisterAfterStart),
            CachePhase::Closed => Err(CacheError::Closed),
        }
    }

    /// spec §6: `register_static(path, default, deserializer?)`. The
    /// deserializer is a required closure here rather than optional — Rust's
    /// generic `V` has no runtime-agnostic "parse these bytes" default the
    /// way a duck-typed host language could supply one.
    pub fn register_static<V: Clone + Send + Sync + std::fmt::Debug + 'static>(
        &self,
        path: impl Into<String>,
        default: V,
        deserializer: StaticDeserializer<V>,
    ) -> Result<(), CacheError> {
        self.require_registering()?;
        let path = path.into();
        let entry = Arc::new(StaticEntry::new(path.clone(), default, deserializer));
        let handle: Arc<dyn AnyStaticEntry> = Arc::new(StaticEntryHandle::new(entry));
        if self.engine.insert_static(path.clone(), handle) {
            Ok(())
        } else {
            Err(CacheError::DuplicatePath(path))
        }
    }

    /// spec §6: `register_directory(path, path_mapper, deserializer?)`.
    pub fn register_directory<V: Clone + Send + Sync + 'static>(
        &self,
        path: impl Into<String>,
        path_mapper: PathMapper,
        deserializer: DirectoryDeserializer<V>,
    ) -> Result<(), CacheError> {
        self.require_registering()?;
        let path = path.into();
        let dir = Arc::new(Directory::new(path.clone(), path_mapper, deserializer));
        let handle: Arc<dyn AnyDirectory> = Arc::new(DirectoryHandle::new(dir));
        if self.engine.insert_directory(path.clone(), handle) {
            Ok(())
        } else {
            Err(CacheError::DuplicatePath(path))
        }
    }

    /// spec §4.1 `start`: transitions Registering -> Running, installs
    /// subscriptions, freezes the static/directory tables. Fails if the
    /// client is already connected or connecting, or if called outside
    /// `Registering`.
    pub fn start(self: &Arc<Self>) -> Result<(), CacheError> {
        let mut phase = self.phase.lock();
        match *phase {
            CachePhase::Running => return Err(CacheError::AlreadyStarted),
            CachePhase::Closed => return Err(CacheError::Closed),
            CachePhase::Registering => {}
        }
        if self.engine.client().connected() || self.engine.client().connecting() {
            return Err(CacheError::ClientAlreadyConnecting);
        }
        self.engine.install();
        *phase = CachePhase::Running;
        Ok(())
    }

    /// spec §4.6 `close`.
    pub fn close(&self) {
        let mut phase = self.phase.lock();
        if *phase == CachePhase::Closed {
            return;
        }
        self.engine.teardown();
        if self.owns_client {
            self.engine.client().close();
        }
        *phase = CachePhase::Closed;
    }

    /// spec §4.6 `reopen`. Valid from `Running` (the fork scenario: a
    /// child process re-warming a copy of the parent's still-wired
    /// engine) or `Closed` (subscriptions were torn down by `close` and
    /// need reinstalling).
    pub fn reopen(&self) -> Result<(), CacheError> {
        let phase = *self.phase.lock();
        if phase == CachePhase::Registering {
            return Err(CacheError::InvalidReopenPhase);
        }
        if phase == CachePhase::Closed {
            self.engine.install();
        }
        self.engine.prepare_reopen();
        if self.owns_client {
            self.engine.client().reopen().map_err(|e| {
                tracing::warn!(error = %e, "reopen of owned client failed");
                CacheError::InvalidReopenPhase
            })?;
        }
        *self.phase.lock() = CachePhase::Running;
        Ok(())
    }

    /// spec §4.6 `fetch`.
    pub fn fetch<V: Clone + Send + Sync + std::fmt::Debug + 'static>(&self, path: &str) -> Result<V, PathError> {
        let statics = self.engine.statics().read();
        let handle = statics.get(path).ok_or_else(|| PathError(path.to_string()))?;
        let concrete = handle.as_any().downcast_ref::<StaticEntryHandle<V>>().ok_or_else(|| PathError(path.to_string()))?;
        Ok(concrete.entry.value())
    }

    /// spec §4.6 `fetch_valid`.
    pub fn fetch_valid<V: Clone + Send + Sync + std::fmt::Debug + 'static>(&self, path: &str) -> Result<Option<V>, PathError> {
        let statics = self.engine.statics().read();
        let handle = statics.get(path).ok_or_else(|| PathError(path.to_string()))?;
        let concrete = handle.as_any().downcast_ref::<StaticEntryHandle<V>>().ok_or_else(|| PathError(path.to_string()))?;
        Ok(concrete.entry.valid_value())
    }

    /// spec §4.6 `fetch_directory_values`.
    pub fn fetch_directory_values<V: Clone + Send + Sync + 'static>(&self, path: &str) -> Result<HashMap<NodePath, V>, PathError> {
        let directories = self.engine.directories().read();
        let handle = directories.get(path).ok_or_else(|| PathError(path.to_string()))?;
        let concrete = handle.as_any().downcast_ref::<DirectoryHandle<V>>().ok_or_else(|| PathError(path.to_string()))?;
        Ok(concrete.dir.values_snapshot())
    }

    /// spec §4.6 `wait_for_warm_cache`.
    pub fn wait_for_warm_cache(&self, timeout: Duration) -> bool {
        self.engine.warm().wait_timeout(timeout)
    }

    pub fn is_static_registered(&self, path: &str) -> bool {
        self.engine.is_static_registered(path)
    }

    pub fn is_runtime_watched(&self, path: &str) -> bool {
        self.engine.is_runtime_watched(path)
    }
}

/// Cache-owning construction mode (spec §4.1): builds a `ZkClient` from
/// `config.host`, runs `register` to populate the static/directory
/// tables, starts the engine, and waits for the warm latch.
pub fn open_owning<C, F>(
    config: CacheConfig,
    notifier: Arc<dyn Notifier>,
    clock: C,
    register: F,
) -> Result<Arc<CacheFacade<C>>, OpenError>
where
    C: Clock + 'static,
    F: FnOnce(&CacheFacade<C>) -> Result<(), CacheError>,
{
    config.validate()?;
    let client = ZkClient::connect(config.host.as_str(), config.connect_timeout)?;
    let facade = Arc::new(CacheFacade {
        engine: WatchEngine::new(notifier, clock, Arc::new(zkcache_core::WarmLatch::new()), Arc::new(client)),
        phase: Mutex::new(CachePhase::Registering),
        owns_client: true,
    });
    register(facade.as_ref())?;
    facade.start()?;
    if !facade.wait_for_warm_cache(config.warm_timeout) {
        tracing::warn!(host = %config.host, timeout = ?config.warm_timeout, "cache did not warm within the configured timeout");
    }
    Ok(facade)
}

/// Convenience owning-mode entry point using the default `TracingNotifier`
/// and `SystemClock`, matching the common case of "just connect to a real
/// ensemble and register a handful of paths".
pub fn open(
    config: CacheConfig,
    register: impl FnOnce(&CacheFacade<zkcache_core::SystemClock>) -> Result<(), CacheError>,
) -> Result<Arc<CacheFacade<zkcache_core::SystemClock>>, OpenError> {
    open_owning(config, Arc::new(TracingNotifier::new()), zkcache_core::SystemClock, register)
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
