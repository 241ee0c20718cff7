// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod paths;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;
use crate::model::{Episode, Podcast};
use crate::progress::SharedProgressReporter;

pub use download::HttpMediaTransfer;
pub use paths::{
    artwork_file_path, episode_file_path, episode_file_stem, podcast_dir, podcast_dir_name,
};

/// Moves episode bytes onto local storage
///
/// Implementations never touch the episode's download state; the caller
/// decides the destination and records the outcome.
#[async_trait]
pub trait MediaTransfer: Send + Sync {
    /// Transfer the episode media to `destination`
    ///
    /// Must return [`DownloadError::Cancelled`] when `cancel` fires before the
    /// transfer finished, and must not leave a file at `destination` unless
    /// it succeeded.
    async fn download_episode(
        &self,
        podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError>;

    /// Store the episode artwork at `destination`; `None` when there is no
    /// artwork to fetch
    async fn download_artwork(
        &self,
        podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
    ) -> Result<Option<PathBuf>, DownloadError>;
}

#[async_trait]
impl<T: MediaTransfer + ?Sized> MediaTransfer for Arc<T> {
    async fn download_episode(
        &self,
        podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        (**self)
            .download_episode(podcast, episode, destination, reporter, cancel)
            .await
    }

    async fn download_artwork(
        &self,
        podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
    ) -> Result<Option<PathBuf>, DownloadError> {
        (**self).download_artwork(podcast, episode, destination).await
    }
}
