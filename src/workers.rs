//! Bounded worker pool for per-file units of work.
//!
//! Hashing, identity extraction and archiving all follow the same shape: an
//! immutable slice of independent units, each handled by one worker, with
//! results re-joined by index so completion order never leaks into
//! decisions. Parallelism is capped by a dedicated rayon pool sized to the
//! configured I/O thread count to avoid disk thrashing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::progress::ProgressCallback;

/// Build a rayon pool with `threads` workers (0 lets rayon decide).
///
/// Returns `None` when the pool cannot be created; callers then fall back
/// to the global pool.
#[must_use]
pub fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(e) => {
            log::warn!(
                "Failed to create worker pool ({}), using global pool with {} threads",
                e,
                rayon::current_num_threads()
            );
            None
        }
    }
}

/// Options shared by every parallel phase.
#[derive(Clone, Copy, Default)]
pub struct UnitRunner<'a> {
    /// Worker count for the dedicated pool
    pub threads: usize,
    /// Cooperative cancellation flag checked before each unit
    pub shutdown: Option<&'a AtomicBool>,
    /// Progress observer for the phase
    pub progress: Option<&'a dyn ProgressCallback>,
    /// Phase name reported to the observer
    pub phase: &'a str,
}

impl<'a> UnitRunner<'a> {
    /// Runner for `phase` with `threads` workers.
    #[must_use]
    pub fn new(phase: &'a str, threads: usize) -> Self {
        Self {
            threads,
            shutdown: None,
            progress: None,
            phase,
        }
    }

    /// Check `flag` before starting each unit.
    #[must_use]
    pub fn with_shutdown(mut self, flag: Option<&'a AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Report progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Option<&'a dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Apply `work` to every item in parallel.
    ///
    /// The output is index-aligned with `items`. A slot is `None` when the
    /// unit was never started because shutdown was requested first; a unit
    /// that has started always runs to completion.
    pub fn run<T, R, L, F>(&self, items: &[T], label: L, work: F) -> Vec<Option<R>>
    where
        T: Sync,
        R: Send,
        L: Fn(&T) -> String + Sync,
        F: Fn(&T) -> R + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        if let Some(cb) = self.progress {
            cb.on_phase_start(self.phase, items.len());
        }

        let completed = AtomicUsize::new(0);
        let job = || {
            items
                .par_iter()
                .map(|item| {
                    if self.is_shutdown_requested() {
                        return None;
                    }
                    let result = work(item);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(cb) = self.progress {
                        cb.on_progress(done, &label(item));
                    }
                    Some(result)
                })
                .collect::<Vec<_>>()
        };

        let results = match build_pool(self.threads) {
            Some(pool) => pool.install(job),
            None => job(),
        };

        if let Some(cb) = self.progress {
            cb.on_phase_end(self.phase);
        }
        results
    }
}
