//! env_logger setup shared by every binary.
//!
//! Filter comes from `HTTPBENCH_LOG` (env_logger syntax), falling back to
//! `info`, or `debug` with `--verbose`.

use httpbench_core::env::ENV_LOG;

/// Install the global logger. A second call is a no-op.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().filter_or(ENV_LOG, default);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
