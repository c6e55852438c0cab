//! # httpbench-runtime
//!
//! Serving runtimes for the HTTP benchmark servers.
//!
//! This crate provides:
//! - Listener setup with `SO_REUSEPORT` (`net`)
//! - Epoll reactor, one event loop per worker (`reactor`, Linux only)
//! - Blocking listener, thread per connection or fixed pool (`blocking`, `pool`)
//! - Periodic stats reporter thread (`ticker`)
//! - Signal-driven shutdown (`signal`)
//! - Shared CLI arguments and logger setup (`cli`, `logging`)
//!
//! Every runtime feeds bytes into the `Responder` from `httpbench-core`
//! through a `StreamConn`.

pub mod blocking;
pub mod cli;
pub mod context;
pub mod logging;
pub mod net;
pub mod pool;
pub mod signal;
pub mod stream;
pub mod ticker;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod reactor;
        pub use reactor::{serve_reactor, ReactorServer};
    }
}

// Re-exports
pub use blocking::{serve_blocking, BlockingServer, Dispatch};
pub use cli::ServeArgs;
pub use context::BenchContext;
pub use pool::FixedPool;
pub use signal::shutdown_on_signals;
pub use stream::StreamConn;
pub use ticker::spawn_reporter;
