// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::DownloadStatus;

/// Errors raised by invariant-preserving mutations of the domain model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Feed URI must not be empty")]
    EmptyFeedUri,

    #[error("A completed download requires a non-empty local file path")]
    EmptyLocalPath,

    #[error("Invalid download status transition from {from} to {to}")]
    InvalidTransition {
        from: DownloadStatus,
        to: DownloadStatus,
    },
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed: {0}")]
    InvalidFeed(#[from] ModelError),
}

/// Errors that can occur while transferring episode media or artwork
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    FinalizeFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download cancelled")]
    Cancelled,
}

/// Errors that can occur while reading or writing persisted podcast state
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Failed to read podcast store {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write podcast store {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create storage directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize podcast store: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Top-level errors for subscription and download operations
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Podcast not found: {0}")]
    PodcastNotFound(String),

    #[error("Episode {episode_id} not found in podcast {podcast_id}")]
    EpisodeNotFound {
        podcast_id: String,
        episode_id: String,
    },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Download error: {0}")]
    Download(DownloadError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ManagerError {
    /// Whether this error stems from the cooperative cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ManagerError::Cancelled)
    }
}

impl From<DownloadError> for ManagerError {
    fn from(error: DownloadError) -> Self {
        match error {
            DownloadError::Cancelled => ManagerError::Cancelled,
            other => ManagerError::Download(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_download_becomes_cancelled_manager_error() {
        let error: ManagerError = DownloadError::Cancelled.into();
        assert!(error.is_cancelled());
    }

    #[test]
    fn other_download_errors_are_wrapped_unchanged() {
        let error: ManagerError = DownloadError::HttpStatus {
            url: "https://example.com/ep.mp3".to_string(),
            status: 503,
        }
        .into();

        match error {
            ManagerError::Download(DownloadError::HttpStatus { status, .. }) => {
                assert_eq!(status, 503)
            }
            other => panic!("Expected wrapped HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let error = ModelError::InvalidTransition {
            from: DownloadStatus::NotStarted,
            to: DownloadStatus::Completed,
        };
        assert_eq!(
            error.to_string(),
            "Invalid download status transition from NotStarted to Completed"
        );
    }
}
