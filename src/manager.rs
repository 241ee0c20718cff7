// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SharedStorageSettings;
use crate::error::{ManagerError, ModelError};
use crate::feed::FeedSource;
use crate::media::{MediaTransfer, artwork_file_path, episode_file_path};
use crate::model::{DownloadStatus, Episode, Podcast};
use crate::progress::{ProgressEvent, SharedProgressReporter, batch_fraction};
use crate::repository::PodcastRepository;

/// Result of downloading all pending episodes of a podcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Number of episodes downloaded in this run
    pub downloaded: usize,
    /// Number of episodes skipped because they were already completed
    pub skipped: usize,
}

/// Orchestrates subscriptions and downloads
///
/// Combines a feed source, a media transfer and a repository. The manager
/// owns the merge policy and decides when download state changes are
/// persisted. Downloads run strictly one at a time.
pub struct PodcastManager<F, M, R> {
    feeds: F,
    media: M,
    repository: R,
    settings: SharedStorageSettings,
}

impl<F, M, R> PodcastManager<F, M, R>
where
    F: FeedSource,
    M: MediaTransfer,
    R: PodcastRepository,
{
    pub fn new(feeds: F, media: M, repository: R, settings: SharedStorageSettings) -> Self {
        Self {
            feeds,
            media,
            repository,
            settings,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn settings(&self) -> &SharedStorageSettings {
        &self.settings
    }

    /// All subscribed podcasts, most recently updated first
    pub async fn list(&self) -> Result<Vec<Podcast>, ManagerError> {
        Ok(self.repository.list().await?)
    }

    pub async fn get(&self, podcast_id: &str) -> Result<Podcast, ManagerError> {
        validate_id("podcast id", podcast_id)?;
        self.load(podcast_id).await
    }

    /// Subscribe to a feed
    ///
    /// Subscribing to a feed that is already stored merges the fresh feed into
    /// the stored podcast, so recorded downloads survive.
    pub async fn subscribe(
        &self,
        feed_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<Podcast, ManagerError> {
        let feed_uri = feed_uri.trim();
        if feed_uri.is_empty() {
            return Err(ManagerError::Validation(
                "feed URI must not be empty".to_string(),
            ));
        }
        check_cancelled(cancel)?;

        info!(feed_uri, "Subscribing to feed");
        let fresh = self.fetch(feed_uri, cancel).await?;
        let existing = self.repository.get(fresh.id()).await?;
        if existing.is_some() {
            info!(podcast_id = fresh.id(), "Already subscribed, merging feed");
        }

        let mut podcast = reconcile(existing, fresh);
        self.ensure_artwork(&mut podcast, cancel).await;

        check_cancelled(cancel)?;
        self.repository.upsert(&podcast).await?;

        info!(
            podcast_id = podcast.id(),
            title = %podcast.title,
            episodes = podcast.episodes().len(),
            "Subscribed"
        );
        Ok(podcast)
    }

    /// Re-fetch a subscribed podcast's feed and merge it in
    pub async fn refresh(
        &self,
        podcast_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Podcast, ManagerError> {
        validate_id("podcast id", podcast_id)?;
        check_cancelled(cancel)?;

        let existing = self.load(podcast_id).await?;
        debug!(podcast_id, feed_uri = existing.feed_uri(), "Refreshing feed");

        let fresh = self.fetch(existing.feed_uri(), cancel).await?;
        let known = existing.episodes().len();
        let mut podcast = reconcile(Some(existing), fresh);
        self.ensure_artwork(&mut podcast, cancel).await;

        check_cancelled(cancel)?;
        self.repository.upsert(&podcast).await?;

        info!(
            podcast_id,
            new_episodes = podcast.episodes().len().saturating_sub(known),
            "Refreshed"
        );
        Ok(podcast)
    }

    /// Download a single episode
    ///
    /// The episode is persisted as `InProgress` before the transfer starts.
    /// On failure or cancellation it is persisted as `Failed` before the
    /// error is returned.
    pub async fn download_episode(
        &self,
        podcast_id: &str,
        episode_id: &str,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Episode, ManagerError> {
        validate_id("podcast id", podcast_id)?;
        validate_id("episode id", episode_id)?;
        check_cancelled(cancel)?;

        let mut podcast = self.load(podcast_id).await?;
        let target = find_episode_mut(&mut podcast, episode_id)?;
        target.mark_in_progress()?;
        let episode = target.clone();
        self.repository.upsert(&podcast).await?;

        let root = self.settings.storage_root();
        let destination = episode_file_path(&root, &podcast, &episode);
        info!(
            podcast_id,
            episode_id,
            destination = %destination.display(),
            "Downloading episode"
        );

        let result = self
            .media
            .download_episode(&podcast, &episode, &destination, reporter, cancel)
            .await;

        match result {
            Ok(()) => {
                let artwork = match episode.artwork_file_path() {
                    Some(_) => None,
                    None => self.fetch_artwork(&root, &podcast, &episode).await,
                };

                let recorded = self
                    .persist_outcome(podcast_id, episode_id, |stored| {
                        stored.mark_completed(destination.clone(), artwork.clone())
                    })
                    .await?;
                let completed = match recorded {
                    Some(completed) => completed,
                    None => {
                        let mut completed = episode.clone();
                        completed.mark_completed(destination, artwork)?;
                        completed
                    }
                };

                info!(podcast_id, episode_id, "Episode downloaded");
                Ok(completed)
            }
            Err(e) => {
                if let Err(persist_error) = self
                    .persist_outcome(podcast_id, episode_id, Episode::mark_failed)
                    .await
                {
                    error!(
                        podcast_id,
                        episode_id, "Failed to persist failed download state: {}", persist_error
                    );
                }

                reporter.report(ProgressEvent::DownloadFailed {
                    episode_id: episode_id.to_string(),
                    episode_title: episode.title.clone(),
                    error: e.to_string(),
                });
                warn!(podcast_id, episode_id, "Episode download failed: {}", e);

                Err(e.into())
            }
        }
    }

    /// Download every episode of a podcast that is not completed yet
    ///
    /// Episodes are processed one after another from a snapshot taken at the
    /// start. `chunk_size` only groups episodes for logging. Cancellation is
    /// checked between episodes; the first error ends the run.
    ///
    /// Episodes still marked `InProgress` are left alone; run
    /// [`recover_interrupted`](Self::recover_interrupted) to make them
    /// retryable.
    pub async fn download_all_episodes(
        &self,
        podcast_id: &str,
        chunk_size: usize,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<DownloadSummary, ManagerError> {
        if chunk_size == 0 {
            return Err(ManagerError::Validation(
                "chunk size must be positive".to_string(),
            ));
        }
        validate_id("podcast id", podcast_id)?;
        check_cancelled(cancel)?;

        let podcast = self.load(podcast_id).await?;
        let (done, pending): (Vec<&Episode>, Vec<&Episode>) = podcast
            .episodes()
            .iter()
            .partition(|e| e.download_status() == DownloadStatus::Completed);
        let pending: Vec<String> = pending
            .iter()
            .filter(|e| {
                let in_progress = e.download_status() == DownloadStatus::InProgress;
                if in_progress {
                    warn!(
                        podcast_id,
                        episode_id = e.id(),
                        "Skipping episode that is still marked in progress"
                    );
                }
                !in_progress
            })
            .map(|e| e.id().to_string())
            .collect();

        let total = pending.len();
        let mut summary = DownloadSummary {
            downloaded: 0,
            skipped: done.len(),
        };

        info!(
            podcast_id,
            pending = total,
            skipped = summary.skipped,
            chunk_size,
            "Downloading all episodes"
        );

        if total == 0 {
            reporter.report(ProgressEvent::BatchProgress {
                completed: 0,
                total: 0,
                fraction: batch_fraction(0, 0),
            });
            return Ok(summary);
        }

        let chunk_count = total.div_ceil(chunk_size);
        for (index, chunk) in pending.chunks(chunk_size).enumerate() {
            debug!(
                podcast_id,
                chunk = index + 1,
                chunks = chunk_count,
                "Processing chunk"
            );

            for episode_id in chunk {
                check_cancelled(cancel)?;
                self.download_episode(podcast_id, episode_id, reporter, cancel)
                    .await?;

                summary.downloaded += 1;
                reporter.report(ProgressEvent::BatchProgress {
                    completed: summary.downloaded,
                    total,
                    fraction: batch_fraction(summary.downloaded, total),
                });
            }
        }

        Ok(summary)
    }

    /// Unsubscribe; removing an unknown podcast is not an error
    ///
    /// Downloaded files are left on disk.
    pub async fn remove(&self, podcast_id: &str) -> Result<(), ManagerError> {
        validate_id("podcast id", podcast_id)?;
        self.repository.remove(podcast_id).await?;
        info!(podcast_id, "Removed podcast");
        Ok(())
    }

    /// Mark episodes left `InProgress` by an interrupted run as `Failed`
    ///
    /// Returns the number of episodes that were reset.
    pub async fn recover_interrupted(&self) -> Result<usize, ManagerError> {
        let mut recovered = 0;

        for mut podcast in self.repository.list().await? {
            let interrupted: Vec<String> = podcast
                .episodes()
                .iter()
                .filter(|e| e.download_status() == DownloadStatus::InProgress)
                .map(|e| e.id().to_string())
                .collect();

            if interrupted.is_empty() {
                continue;
            }

            for episode_id in &interrupted {
                find_episode_mut(&mut podcast, episode_id)?.mark_failed()?;
            }
            self.repository.upsert(&podcast).await?;

            warn!(
                podcast_id = podcast.id(),
                episodes = interrupted.len(),
                "Marked interrupted downloads as failed"
            );
            recovered += interrupted.len();
        }

        Ok(recovered)
    }

    async fn load(&self, podcast_id: &str) -> Result<Podcast, ManagerError> {
        self.repository
            .get(podcast_id)
            .await?
            .ok_or_else(|| ManagerError::PodcastNotFound(podcast_id.to_string()))
    }

    /// Apply a download outcome to the currently stored copy of an episode
    ///
    /// The podcast is re-read so that changes persisted while the transfer
    /// ran are kept. Returns `None` without writing when the podcast or the
    /// episode no longer exists.
    async fn persist_outcome(
        &self,
        podcast_id: &str,
        episode_id: &str,
        apply: impl FnOnce(&mut Episode) -> Result<(), ModelError> + Send,
    ) -> Result<Option<Episode>, ManagerError> {
        let Some(mut podcast) = self.repository.get(podcast_id).await? else {
            warn!(
                podcast_id,
                episode_id, "Podcast was removed during download, result not recorded"
            );
            return Ok(None);
        };
        let Some(target) = podcast.episode_mut(episode_id) else {
            warn!(
                podcast_id,
                episode_id, "Episode was removed during download, result not recorded"
            );
            return Ok(None);
        };

        apply(target)?;
        let updated = target.clone();
        self.repository.upsert(&podcast).await?;
        Ok(Some(updated))
    }

    async fn fetch(
        &self,
        feed_uri: &str,
        cancel: &CancellationToken,
    ) -> Result<Podcast, ManagerError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ManagerError::Cancelled),
            result = self.feeds.fetch_podcast(feed_uri) => Ok(result?),
        }
    }

    /// Fetch artwork for every episode without a cached artwork file
    ///
    /// Failures only cost the artwork; they are logged and skipped.
    async fn ensure_artwork(&self, podcast: &mut Podcast, cancel: &CancellationToken) {
        let root = self.settings.storage_root();

        let mut missing = Vec::new();
        for episode in podcast.episodes() {
            let cached = match episode.artwork_file_path() {
                Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
                None => false,
            };
            if !cached {
                missing.push(episode.clone());
            }
        }

        for episode in missing {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(path) = self.fetch_artwork(&root, podcast, &episode).await
                && let Some(target) = podcast.episode_mut(episode.id())
            {
                target.set_artwork_file_path(Some(path));
            }
        }
    }

    async fn fetch_artwork(
        &self,
        root: &Path,
        podcast: &Podcast,
        episode: &Episode,
    ) -> Option<PathBuf> {
        let destination = artwork_file_path(root, podcast, episode);
        match self
            .media
            .download_artwork(podcast, episode, &destination)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    podcast_id = podcast.id(),
                    episode_id = episode.id(),
                    "Failed to fetch artwork: {}",
                    e
                );
                None
            }
        }
    }
}

/// Combine a stored podcast with a freshly fetched snapshot of its feed
fn reconcile(existing: Option<Podcast>, fresh: Podcast) -> Podcast {
    match existing {
        None => fresh,
        Some(mut podcast) => {
            podcast.update_metadata(&fresh);
            podcast.merge_episodes(fresh.into_episodes());
            podcast
        }
    }
}

fn find_episode_mut<'a>(
    podcast: &'a mut Podcast,
    episode_id: &str,
) -> Result<&'a mut Episode, ManagerError> {
    let podcast_id = podcast.id().to_string();
    podcast
        .episode_mut(episode_id)
        .ok_or_else(|| ManagerError::EpisodeNotFound {
            podcast_id,
            episode_id: episode_id.to_string(),
        })
}

fn validate_id(what: &str, id: &str) -> Result<(), ManagerError> {
    if id.trim().is_empty() {
        return Err(ManagerError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ManagerError> {
    if cancel.is_cancelled() {
        return Err(ManagerError::Cancelled);
    }
    Ok(())
}
