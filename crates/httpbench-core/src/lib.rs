//! # httpbench-core
//!
//! Platform-agnostic core of the HTTP benchmark servers.
//!
//! Every benchmark binary, whatever its I/O model, funnels received bytes
//! into the same `Responder`, which writes a canned `helloworld` response
//! and updates a shared `PerformanceCounters`. No sockets live here; the
//! runtimes in `httpbench-runtime` supply a `Connection`.
//!
//! ## Modules
//!
//! - `request` - header terminator scan, keep-alive and `/shutdown` checks
//! - `response` - the two precomputed responses
//! - `connection` - `Connection` trait and an in-memory implementation
//! - `responder` - the request handler and its keep-alive modes
//! - `counters` - lock-free shared counters
//! - `reporter` - derived metrics for periodic reports
//! - `shutdown` - process-wide stop flag
//! - `config` - server configuration
//! - `error` - error types
//! - `env` - environment variable overrides

pub mod request;
pub mod response;
pub mod connection;
pub mod responder;
pub mod counters;
pub mod reporter;
pub mod shutdown;
pub mod config;
pub mod error;
pub mod env;

// Re-exports for convenience
pub use config::ServerConfig;
pub use connection::{Connection, MemConnection};
pub use counters::{PerformanceCounters, Snapshot};
pub use error::{BenchError, Result};
pub use reporter::Report;
pub use responder::{Action, Responder, ResponderMode};
pub use response::PrecomputedResponse;
pub use shutdown::Shutdown;
