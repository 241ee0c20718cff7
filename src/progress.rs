// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while episodes are downloaded
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A media transfer is starting
    DownloadStarting {
        episode_id: String,
        episode_title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Byte level progress of the current transfer
    DownloadProgress {
        episode_id: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// Transfer is being finalized (renamed from .partial)
    Finalizing { episode_id: String },

    /// A transfer completed successfully
    DownloadCompleted {
        episode_id: String,
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A transfer failed or was cancelled
    DownloadFailed {
        episode_id: String,
        episode_title: String,
        error: String,
    },

    /// Overall progress of a download-all run, after each episode
    BatchProgress {
        completed: usize,
        total: usize,
        /// `completed / total`, clamped to `[0, 1]`
        fraction: f64,
    },
}

/// Trait for reporting download progress.
///
/// Reporters are called synchronously from the downloading task and must
/// return quickly.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Fraction of `completed` out of `total`, clamped to `[0, 1]`
///
/// An empty batch counts as fully done.
pub fn batch_fraction(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (completed as f64 / total as f64).clamp(0.0, 1.0)
}
