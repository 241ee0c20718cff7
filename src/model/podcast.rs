// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use url::Url;

use super::episode::{DownloadStatus, Episode};
use super::id::create_id;
use crate::error::ModelError;

/// A subscribed podcast together with all episodes seen in its feed
///
/// Episodes are unique by id and kept ordered newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Podcast {
    id: String,
    feed_uri: String,
    pub title: String,
    pub description: Option<String>,
    pub artwork_uri: Option<Url>,
    pub last_updated: DateTime<Utc>,
    episodes: Vec<Episode>,
}

impl Podcast {
    /// Create an empty podcast for a feed URI; the id is derived from the URI
    pub fn new(feed_uri: &str) -> Result<Self, ModelError> {
        let feed_uri = feed_uri.trim();
        if feed_uri.is_empty() {
            return Err(ModelError::EmptyFeedUri);
        }

        Ok(Self {
            id: create_id(feed_uri),
            feed_uri: feed_uri.to_string(),
            title: String::new(),
            description: None,
            artwork_uri: None,
            last_updated: Utc::now(),
            episodes: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn feed_uri(&self) -> &str {
        &self.feed_uri
    }

    /// Read-only view of the episodes, newest first
    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    /// Consume the podcast, handing out its episodes
    pub fn into_episodes(self) -> Vec<Episode> {
        self.episodes
    }

    pub fn episode(&self, episode_id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id() == episode_id)
    }

    pub fn episode_mut(&mut self, episode_id: &str) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|e| e.id() == episode_id)
    }

    /// Overwrite the podcast-level metadata with that of a fresher snapshot
    pub fn update_metadata(&mut self, fresh: &Podcast) {
        self.title = fresh.title.clone();
        self.description = fresh.description.clone();
        self.artwork_uri = fresh.artwork_uri.clone();
        self.last_updated = fresh.last_updated;
    }

    /// Merge a batch of episodes into this podcast
    ///
    /// Unknown ids are appended. Known ids get their descriptive fields
    /// replaced while keeping the recorded download state, unless the incoming
    /// episode brings its own local path. Afterwards the episodes are sorted by
    /// publish date, newest first; undated episodes sort last. Ties keep their
    /// current relative order.
    pub fn merge_episodes(&mut self, incoming: impl IntoIterator<Item = Episode>) {
        for episode in incoming {
            match self.episode_mut(episode.id()) {
                Some(existing) => existing.absorb(episode),
                None => self.episodes.push(episode),
            }
        }
        self.episodes.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }

    /// Number of episodes currently in the given state
    pub fn count_with_status(&self, status: DownloadStatus) -> usize {
        self.episodes
            .iter()
            .filter(|e| e.download_status() == status)
            .count()
    }
}
