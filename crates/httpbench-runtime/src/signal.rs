//! Process signals
//!
//! SIGINT and SIGTERM flip the process-wide stop flag; serving loops and
//! the reporter see it on their next bounded wait. SIGPIPE is ignored so a
//! peer that hangs up mid-write surfaces as an `EPIPE` write error.

use httpbench_core::Shutdown;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Flag the handler writes to. Set once, before any handler is installed.
static STOP_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// The `Shutdown` wired to SIGINT/SIGTERM. Same flag on every call.
pub fn shutdown_on_signals() -> httpbench_core::Result<Shutdown> {
    let flag = STOP_FLAG.get_or_init(|| Arc::new(AtomicBool::new(false)));
    install_handlers()?;
    Ok(Shutdown::from_flag(Arc::clone(flag)))
}

// Only touches an atomic.
#[allow(dead_code)]
extern "C" fn on_stop_signal(_: libc::c_int) {
    if let Some(flag) = STOP_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

        static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

        fn install_handlers() -> httpbench_core::Result<()> {
            if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let stop = SigAction::new(
                SigHandler::Handler(on_stop_signal),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );
            let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());

            // SAFETY: the handler only performs an atomic store.
            unsafe {
                sigaction(Signal::SIGINT, &stop).map_err(std::io::Error::from)?;
                sigaction(Signal::SIGTERM, &stop).map_err(std::io::Error::from)?;
                sigaction(Signal::SIGPIPE, &ignore).map_err(std::io::Error::from)?;
            }
            log::debug!("signal: SIGINT/SIGTERM handlers installed, SIGPIPE ignored");
            Ok(())
        }
    } else {
        fn install_handlers() -> httpbench_core::Result<()> {
            log::debug!("signal: handlers not supported on this platform");
            Ok(())
        }
    }
}
