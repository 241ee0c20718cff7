// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod document;
mod json;
mod memory;
mod paths;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::Podcast;

pub use document::{EpisodeRecord, PodcastRecord, PodcastStoreDocument};
pub use json::JsonPodcastRepository;
pub use memory::InMemoryPodcastRepository;
pub use paths::{from_portable_path, to_portable_path};

/// Storage for subscribed podcasts
///
/// Every podcast handed in or out is an independent copy: mutating a
/// returned podcast has no effect until it is passed to [`upsert`].
///
/// [`upsert`]: PodcastRepository::upsert
#[async_trait]
pub trait PodcastRepository: Send + Sync {
    /// All podcasts, most recently updated first
    async fn list(&self) -> Result<Vec<Podcast>, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Podcast>, RepositoryError>;

    /// Insert or replace the podcast with the same id
    async fn upsert(&self, podcast: &Podcast) -> Result<(), RepositoryError>;

    /// Remove a podcast; removing an unknown id is not an error
    async fn remove(&self, id: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<R: PodcastRepository + ?Sized> PodcastRepository for Arc<R> {
    async fn list(&self) -> Result<Vec<Podcast>, RepositoryError> {
        (**self).list().await
    }

    async fn get(&self, id: &str) -> Result<Option<Podcast>, RepositoryError> {
        (**self).get(id).await
    }

    async fn upsert(&self, podcast: &Podcast) -> Result<(), RepositoryError> {
        (**self).upsert(podcast).await
    }

    async fn remove(&self, id: &str) -> Result<(), RepositoryError> {
        (**self).remove(id).await
    }
}

/// Sort podcasts most recently updated first
fn sort_by_last_updated(podcasts: &mut [Podcast]) {
    podcasts.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
}
