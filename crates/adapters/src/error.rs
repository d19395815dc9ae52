// SPDX-License-Identifier: MIT

//! Error taxonomy for the Client capability (spec §6's "distinguishing
//! *transient* (retry) and *terminal* (give up this pass) classes").

use thiserror::Error;

/// Errors a `Client` implementation may raise from `stat`/`get`/`children`.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    /// Connection-lost class: the caller should retry in-line, the same
    /// call will either succeed once reconnected or eventually surface as
    /// terminal.
    #[error("transient client error: {0}")]
    Transient(String),

    /// Keeper/marshalling class: this update pass gives up and the path
    /// is enqueued for a later drain.
    #[error("terminal client error: {0}")]
    Terminal(String),
}

impl ClientError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}
