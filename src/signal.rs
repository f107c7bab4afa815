//! Cooperative cancellation on Ctrl+C.
//!
//! A single `AtomicBool` is shared by the scanner, the hashing and
//! extraction pools, and the archive pool. Each of them checks the flag
//! between units of work, so the file currently being read or moved always
//! completes. Files already archived stay archived; nothing is rolled back.
//!
//! ```rust,no_run
//! use treeclean::signal::install_handler;
//!
//! let shutdown = install_handler().expect("signal handler");
//! let flag = shutdown.flag();
//! // hand `flag` to Walker, DuplicateResolver, ArchiveMover...
//! # let _ = flag;
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle on the process-wide cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    /// A handle with no cancellation requested, not hooked to any signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or [`request`](Self::request) was called.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation without a signal.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The shared flag, for the components that poll it.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The Ctrl+C hook could not be registered.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// `ctrlc` refused the handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static INSTALLED: Mutex<Option<Shutdown>> = Mutex::new(None);

fn on_interrupt(flag: &AtomicBool) {
    flag.store(true, Ordering::SeqCst);
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\nInterrupted. Finishing the current file...");
    let _ = stderr.flush();
    log::info!("Shutdown signal received");
}

/// Hook Ctrl+C and return the shared handle, with its flag cleared.
///
/// The hook is registered once per process; later calls (several runs in
/// one process, as in tests) hand back the same handle.
///
/// # Errors
///
/// [`SignalError::InstallFailed`] if `ctrlc` rejects the hook, for example
/// because another component in the process already registered one. A
/// later call retries.
pub fn install_handler() -> Result<Shutdown, SignalError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(shutdown) = installed.as_ref() {
        shutdown.clear();
        return Ok(shutdown.clone());
    }

    let shutdown = Shutdown::new();
    let flag = shutdown.flag();
    ctrlc::set_handler(move || on_interrupt(&flag))?;
    log::debug!("Ctrl+C handler installed");
    *installed = Some(shutdown.clone());
    Ok(shutdown)
}
