//! Cooperative cancellation and SIGINT handling
//!
//! A [`Cancellation`] is shared by every task of a parallel stage. Tasks
//! check it before starting; the first failing task trips it, and so does
//! SIGINT once [`install_sigint_handler`] has run.
//!
//! On a second SIGINT the process exits immediately with
//! [`EXIT_CODE_CANCELLED`].

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::EXIT_CODE_CANCELLED;

/// Shared cancellation flag, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    state: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    cancelled: AtomicBool,
    signals: AtomicU8,
}

/// What a received signal should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop scheduling new work
    Cancel,
    /// Second signal: exit now
    Exit,
    Ignore,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Record a received signal and decide what to do about it.
    pub fn handle_signal(&self) -> SignalAction {
        match self.state.signals.fetch_add(1, Ordering::SeqCst) {
            0 => {
                self.cancel();
                SignalAction::Cancel
            }
            1 => SignalAction::Exit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Trip `cancellation` on SIGINT; exit on the second one.
pub fn install_sigint_handler(cancellation: &Cancellation) -> Result<(), ctrlc::Error> {
    let cancellation = cancellation.clone();
    ctrlc::set_handler(move || match cancellation.handle_signal() {
        SignalAction::Cancel => {
            tracing::warn!("interrupt received, finishing running tasks (press Ctrl-C again to exit now)");
        }
        SignalAction::Exit => std::process::exit(EXIT_CODE_CANCELLED),
        SignalAction::Ignore => {}
    })
}
