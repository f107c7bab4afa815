//! Progress reporting for long-running phases.
//!
//! Work is reported through the [`ProgressCallback`] trait so the engine never
//! depends on a particular renderer. [`Progress`] draws indicatif bars on
//! stderr; library users can plug their own observer or pass none at all.
//! Notifications are purely advisory and never affect results.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name: directory traversal.
pub const PHASE_SCANNING: &str = "scanning";
/// Phase name: content fingerprinting.
pub const PHASE_HASHING: &str = "hashing";
/// Phase name: logical identity extraction.
pub const PHASE_EXTRACTING: &str = "extracting";
/// Phase name: moving files into the archive root.
pub const PHASE_ARCHIVING: &str = "archiving";
/// Phase name: comparing two trees.
pub const PHASE_DIFFING: &str = "diffing";

/// Callback trait for progress reporting.
///
/// Implementations must be thread-safe: `on_progress` and
/// `on_item_completed` are called from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (see the `PHASE_*` constants)
    /// * `total` - Total number of units, or 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called after each unit of work, with the count completed so far.
    ///
    /// # Arguments
    ///
    /// * `current` - Units completed (1-based)
    /// * `path` - Path that was just processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a unit has been processed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
///
/// Phases run one after another, so a single active bar is tracked.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use treeclean::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// assert!(progress.is_quiet());
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    /// Whether rendering is suppressed.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(phase: &str) -> &'static str {
        match phase {
            PHASE_SCANNING => "Scanning",
            PHASE_HASHING => "Hashing",
            PHASE_EXTRACTING => "Reading identities",
            PHASE_ARCHIVING => "Archiving",
            PHASE_DIFFING => "Comparing",
            _ => "Working",
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style());
            pb
        };
        pb.set_message(Self::label(phase));

        if let Ok(mut active) = self.active.lock() {
            if let Some((_, previous)) = active.take() {
                previous.finish_and_clear();
            }
            *active = Some((phase.to_string(), pb));
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Ok(active) = self.active.lock() {
            if let Some((phase, pb)) = active.as_ref() {
                pb.set_position(current as u64);
                pb.set_message(format!("{}: {}", Self::label(phase), truncate_path(path, 30)));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|(name, _)| name == phase) {
                if let Some((_, pb)) = active.take() {
                    pb.finish_with_message(format!("{} complete", Self::label(phase)));
                }
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        if let Ok(active) = self.active.lock() {
            if let Some((_, pb)) = active.as_ref() {
                pb.set_message(message.to_string());
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
