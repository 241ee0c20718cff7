// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-disk shape of `podcasts.json`.
//!
//! Every field is optional on read so that partially written or older files
//! still load; missing values are treated as unset.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::paths::{from_portable_path, to_portable_path};
use crate::model::{
    DownloadStatus, Episode, Podcast, format_clock_duration, parse_clock_duration,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PodcastStoreDocument {
    pub podcasts: Vec<PodcastRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PodcastRecord {
    pub id: Option<String>,
    pub feed_uri: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_uri: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub episodes: Option<Vec<EpisodeRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EpisodeRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub artwork_uri: Option<String>,
    pub media_uri: Option<String>,
    pub duration: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub download_status: Option<DownloadStatus>,
    pub local_file_path: Option<String>,
    pub episode_number: Option<u32>,
    pub artwork_file_path: Option<String>,
}

impl PodcastStoreDocument {
    /// Build the document for a full set of podcasts, relativizing local
    /// paths against `root`
    pub fn from_podcasts<'a>(podcasts: impl IntoIterator<Item = &'a Podcast>, root: &Path) -> Self {
        Self {
            podcasts: podcasts
                .into_iter()
                .map(|p| PodcastRecord::from_podcast(p, root))
                .collect(),
        }
    }

    /// Convert back into podcasts, rehydrating relative paths against `root`
    ///
    /// Records without an id or feed URI cannot be addressed and are skipped.
    pub fn into_podcasts(self, root: &Path) -> Vec<Podcast> {
        self.podcasts
            .into_iter()
            .filter_map(|record| record.into_podcast(root))
            .collect()
    }
}

impl PodcastRecord {
    pub fn from_podcast(podcast: &Podcast, root: &Path) -> Self {
        Self {
            id: Some(podcast.id().to_string()),
            feed_uri: Some(podcast.feed_uri().to_string()),
            title: Some(podcast.title.clone()),
            description: podcast.description.clone(),
            artwork_uri: podcast.artwork_uri.as_ref().map(|u| u.to_string()),
            last_updated: Some(podcast.last_updated),
            episodes: Some(
                podcast
                    .episodes()
                    .iter()
                    .map(|e| EpisodeRecord::from_episode(e, root))
                    .collect(),
            ),
        }
    }

    fn into_podcast(self, root: &Path) -> Option<Podcast> {
        let feed_uri = self.feed_uri.filter(|f| !f.trim().is_empty())?;
        let mut podcast = match Podcast::new(&feed_uri) {
            Ok(podcast) => podcast,
            Err(e) => {
                warn!(feed_uri = %feed_uri, "Skipping stored podcast: {}", e);
                return None;
            }
        };

        if let Some(stored_id) = self.id.as_deref()
            && stored_id != podcast.id()
        {
            warn!(
                stored_id,
                derived_id = podcast.id(),
                "Stored podcast id does not match its feed URI, using derived id"
            );
        }

        podcast.title = self.title.unwrap_or_default();
        podcast.description = self.description;
        podcast.artwork_uri = self.artwork_uri.as_deref().and_then(|u| Url::parse(u).ok());
        if let Some(last_updated) = self.last_updated {
            podcast.last_updated = last_updated;
        }

        let episodes = self
            .episodes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| record.into_episode(root));
        podcast.merge_episodes(episodes);

        Some(podcast)
    }
}

impl EpisodeRecord {
    pub fn from_episode(episode: &Episode, root: &Path) -> Self {
        Self {
            id: Some(episode.id().to_string()),
            title: Some(episode.title.clone()),
            summary: episode.summary.clone(),
            artwork_uri: episode.artwork_uri.as_ref().map(|u| u.to_string()),
            media_uri: Some(episode.media_uri().to_string()),
            duration: episode.duration.map(format_clock_duration),
            published_at: episode.published_at,
            download_status: Some(episode.download_status()),
            local_file_path: episode
                .local_file_path()
                .map(|p| to_portable_path(p, root)),
            episode_number: episode.episode_number,
            artwork_file_path: episode
                .artwork_file_path()
                .map(|p| to_portable_path(p, root)),
        }
    }

    fn into_episode(self, root: &Path) -> Option<Episode> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        let media_uri = match self.media_uri.as_deref().map(Url::parse) {
            Some(Ok(url)) => url,
            _ => {
                warn!(episode_id = %id, "Skipping stored episode without a valid media URI");
                return None;
            }
        };

        let local_file_path = self
            .local_file_path
            .as_deref()
            .and_then(|p| from_portable_path(p, root));

        let mut episode = Episode::new(id, media_uri, self.title.unwrap_or_default())
            .with_download_state(self.download_status.unwrap_or_default(), local_file_path);
        episode.summary = self.summary;
        episode.duration = self.duration.as_deref().and_then(parse_clock_duration);
        episode.published_at = self.published_at;
        episode.episode_number = self.episode_number;
        episode.artwork_uri = self.artwork_uri.as_deref().and_then(|u| Url::parse(u).ok());
        episode.set_artwork_file_path(
            self.artwork_file_path
                .as_deref()
                .and_then(|p| from_portable_path(p, root)),
        );

        Some(episode)
    }
}
