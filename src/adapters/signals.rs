//! SIGINT/SIGTERM handling for timed valve holds.
//!
//! The handler only stores into an atomic flag; the blocking delay polls it
//! and returns early, after which the valve controller closes every valve
//! on the normal code path.  Nothing beyond the flag store runs in signal
//! context.

use core::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the interrupt flag.
pub fn install() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler is async-signal-safe (a single atomic store)
        // and no other code in this process installs handlers for these
        // signals.
        unsafe { sigaction(signal, &action) }?;
    }
    log::debug!("SIGINT/SIGTERM handlers installed");
    Ok(())
}

/// True once SIGINT or SIGTERM has been received.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Forget a previous interrupt.
pub fn clear() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
