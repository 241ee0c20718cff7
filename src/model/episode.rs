// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ModelError;

/// Download state of a single episode
///
/// Allowed transitions: `NotStarted -> InProgress -> {Completed, Failed}`,
/// and `Completed`/`Failed` back to `InProgress` on retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl DownloadStatus {
    fn can_transition_to(self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        matches!(
            (self, next),
            (NotStarted | Completed | Failed, InProgress) | (InProgress, Completed | Failed)
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadStatus::NotStarted => "NotStarted",
            DownloadStatus::InProgress => "InProgress",
            DownloadStatus::Completed => "Completed",
            DownloadStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// A single podcast episode and its local download state
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    id: String,
    media_uri: Url,
    pub title: String,
    pub summary: Option<String>,
    pub duration: Option<Duration>,
    pub published_at: Option<DateTime<Utc>>,
    pub episode_number: Option<u32>,
    /// Remote artwork location
    pub artwork_uri: Option<Url>,
    local_file_path: Option<PathBuf>,
    artwork_file_path: Option<PathBuf>,
    download_status: DownloadStatus,
}

impl Episode {
    /// Create a new, not yet downloaded episode
    pub fn new(id: impl Into<String>, media_uri: Url, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            media_uri,
            title: title.into(),
            summary: None,
            duration: None,
            published_at: None,
            episode_number: None,
            artwork_uri: None,
            local_file_path: None,
            artwork_file_path: None,
            download_status: DownloadStatus::NotStarted,
        }
    }

    /// Attach a previously recorded download state
    ///
    /// Used when rehydrating persisted episodes; does not go through the
    /// transition rules. An empty path counts as no path.
    pub fn with_download_state(
        mut self,
        status: DownloadStatus,
        local_file_path: Option<PathBuf>,
    ) -> Self {
        self.download_status = status;
        self.local_file_path = local_file_path.filter(|p| !p.as_os_str().is_empty());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn media_uri(&self) -> &Url {
        &self.media_uri
    }

    pub fn download_status(&self) -> DownloadStatus {
        self.download_status
    }

    pub fn local_file_path(&self) -> Option<&Path> {
        self.local_file_path.as_deref()
    }

    pub fn artwork_file_path(&self) -> Option<&Path> {
        self.artwork_file_path.as_deref()
    }

    pub fn set_artwork_file_path(&mut self, path: Option<PathBuf>) {
        self.artwork_file_path = path.filter(|p| !p.as_os_str().is_empty());
    }

    /// True only for a completed download that has a recorded local file
    pub fn is_downloaded(&self) -> bool {
        self.download_status == DownloadStatus::Completed && self.local_file_path.is_some()
    }

    pub fn mark_in_progress(&mut self) -> Result<(), ModelError> {
        self.transition(DownloadStatus::InProgress)
    }

    pub fn mark_failed(&mut self) -> Result<(), ModelError> {
        self.transition(DownloadStatus::Failed)
    }

    /// Complete the download, recording where the media (and optionally the
    /// artwork) now lives locally
    pub fn mark_completed(
        &mut self,
        local_file_path: PathBuf,
        artwork_file_path: Option<PathBuf>,
    ) -> Result<(), ModelError> {
        if local_file_path.as_os_str().is_empty() {
            return Err(ModelError::EmptyLocalPath);
        }
        self.transition(DownloadStatus::Completed)?;
        self.local_file_path = Some(local_file_path);
        if artwork_file_path.is_some() {
            self.set_artwork_file_path(artwork_file_path);
        }
        Ok(())
    }

    fn transition(&mut self, next: DownloadStatus) -> Result<(), ModelError> {
        if !self.download_status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.download_status,
                to: next,
            });
        }
        self.download_status = next;
        Ok(())
    }

    /// Take over descriptive metadata from a fresher copy of this episode
    ///
    /// Download state is kept unless the incoming copy carries a local path of
    /// its own. The media URI never changes.
    pub(crate) fn absorb(&mut self, incoming: Episode) {
        self.title = incoming.title;
        self.summary = incoming.summary;
        self.duration = incoming.duration;
        self.published_at = incoming.published_at;
        self.artwork_uri = incoming.artwork_uri;
        self.episode_number = incoming.episode_number;

        if incoming.local_file_path.is_some() {
            self.download_status = incoming.download_status;
            self.local_file_path = incoming.local_file_path;
        }
        if incoming.artwork_file_path.is_some() {
            self.artwork_file_path = incoming.artwork_file_path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_episode() -> Episode {
        Episode::new(
            "ep-1",
            Url::parse("https://example.com/ep1.mp3").unwrap(),
            "Episode 1",
        )
    }

    #[test]
    fn new_episode_is_not_started() {
        let episode = make_episode();
        assert_eq!(episode.download_status(), DownloadStatus::NotStarted);
        assert!(!episode.is_downloaded());
        assert!(episode.local_file_path().is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut episode = make_episode();
        episode.mark_in_progress().unwrap();
        assert_eq!(episode.download_status(), DownloadStatus::InProgress);

        episode
            .mark_completed(PathBuf::from("/media/ep1.mp3"), None)
            .unwrap();
        assert_eq!(episode.download_status(), DownloadStatus::Completed);
        assert!(episode.is_downloaded());
        assert_eq!(episode.local_file_path(), Some(Path::new("/media/ep1.mp3")));
    }

    #[test]
    fn failed_and_completed_can_be_retried() {
        let mut episode = make_episode();
        episode.mark_in_progress().unwrap();
        episode.mark_failed().unwrap();
        episode.mark_in_progress().unwrap();
        episode
            .mark_completed(PathBuf::from("/media/ep1.mp3"), None)
            .unwrap();
        episode.mark_in_progress().unwrap();
        assert_eq!(episode.download_status(), DownloadStatus::InProgress);
        assert!(!episode.is_downloaded());
    }

    #[test]
    fn completing_without_progress_is_rejected() {
        let mut episode = make_episode();
        let err = episode
            .mark_completed(PathBuf::from("/media/ep1.mp3"), None)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTransition {
                from: DownloadStatus::NotStarted,
                to: DownloadStatus::Completed,
            }
        );
    }

    #[test]
    fn failing_twice_is_rejected() {
        let mut episode = make_episode();
        assert!(episode.mark_failed().is_err());
        episode.mark_in_progress().unwrap();
        assert!(episode.mark_in_progress().is_err());
    }

    #[test]
    fn completing_with_empty_path_is_rejected() {
        let mut episode = make_episode();
        episode.mark_in_progress().unwrap();
        assert_eq!(
            episode.mark_completed(PathBuf::new(), None),
            Err(ModelError::EmptyLocalPath)
        );
        assert_eq!(episode.download_status(), DownloadStatus::InProgress);
    }

    #[test]
    fn completed_status_without_path_is_not_downloaded() {
        let episode = make_episode().with_download_state(DownloadStatus::Completed, None);
        assert!(!episode.is_downloaded());
    }

    #[test]
    fn absorb_keeps_download_state_without_incoming_path() {
        let mut existing = make_episode().with_download_state(
            DownloadStatus::Completed,
            Some(PathBuf::from("/media/ep1.mp3")),
        );
        let mut incoming = make_episode();
        incoming.title = "Episode 1 (remastered)".to_string();
        incoming.episode_number = Some(1);

        existing.absorb(incoming);

        assert_eq!(existing.title, "Episode 1 (remastered)");
        assert_eq!(existing.episode_number, Some(1));
        assert!(existing.is_downloaded());
        assert_eq!(existing.local_file_path(), Some(Path::new("/media/ep1.mp3")));
    }

    #[test]
    fn absorb_takes_explicit_incoming_state() {
        let mut existing = make_episode();
        let incoming = make_episode().with_download_state(
            DownloadStatus::Completed,
            Some(PathBuf::from("/other/ep1.mp3")),
        );

        existing.absorb(incoming);

        assert!(existing.is_downloaded());
        assert_eq!(existing.local_file_path(), Some(Path::new("/other/ep1.mp3")));
    }

    #[test]
    fn status_serializes_as_variant_name() {
        let json = serde_json::to_string(&DownloadStatus::InProgress).unwrap();
        assert_eq!(json, "\"InProgress\"");
        let back: DownloadStatus = serde_json::from_str("\"Failed\"").unwrap();
        assert_eq!(back, DownloadStatus::Failed);
    }
}
