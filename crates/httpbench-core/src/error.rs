//! Process-level error types.
//!
//! Request handling never returns these: a failed write just closes the
//! connection. They cover startup (bind, epoll, config) and thread
//! management, and bubble up to `main`.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Configuration rejected by `ServerConfig::validate`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// socket/bind/listen failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Poller (epoll) setup or registration failed.
    #[error("poller error: {0}")]
    Poller(#[source] io::Error),

    /// Could not spawn a worker or reporter thread.
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked.
    #[error("worker '{0}' panicked")]
    WorkerPanicked(String),

    /// Any other OS error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
