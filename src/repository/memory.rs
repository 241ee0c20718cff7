// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{PodcastRepository, sort_by_last_updated};
use crate::error::RepositoryError;
use crate::model::Podcast;

/// Repository keeping podcasts in memory only
#[derive(Debug, Default)]
pub struct InMemoryPodcastRepository {
    podcasts: Mutex<HashMap<String, Podcast>>,
}

impl InMemoryPodcastRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PodcastRepository for InMemoryPodcastRepository {
    async fn list(&self) -> Result<Vec<Podcast>, RepositoryError> {
        let mut podcasts: Vec<Podcast> = self.podcasts.lock().await.values().cloned().collect();
        sort_by_last_updated(&mut podcasts);
        Ok(podcasts)
    }

    async fn get(&self, id: &str) -> Result<Option<Podcast>, RepositoryError> {
        Ok(self.podcasts.lock().await.get(id).cloned())
    }

    async fn upsert(&self, podcast: &Podcast) -> Result<(), RepositoryError> {
        self.podcasts
            .lock()
            .await
            .insert(podcast.id().to_string(), podcast.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RepositoryError> {
        self.podcasts.lock().await.remove(id);
        Ok(())
    }
}
