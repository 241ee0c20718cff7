// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::document::PodcastStoreDocument;
use super::{PodcastRepository, sort_by_last_updated};
use crate::config::{SharedStorageSettings, StorageSettings};
use crate::error::RepositoryError;
use crate::model::Podcast;

/// Podcasts loaded from the store file of one particular storage root
#[derive(Debug)]
struct LoadedStore {
    root: PathBuf,
    podcasts: HashMap<String, Podcast>,
}

impl LoadedStore {
    fn empty(root: PathBuf) -> Self {
        Self {
            root,
            podcasts: HashMap::new(),
        }
    }
}

/// Repository persisting all podcasts to `podcasts.json` below the storage
/// root
///
/// All access goes through a single async mutex, so reads never observe a
/// half-applied write and concurrent writers queue up. The file is loaded
/// lazily and reloaded whenever the configured storage root changes. Each
/// write replaces the whole file.
#[derive(Debug)]
pub struct JsonPodcastRepository {
    settings: SharedStorageSettings,
    state: Mutex<Option<LoadedStore>>,
}

impl JsonPodcastRepository {
    pub fn new(settings: SharedStorageSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(None),
        }
    }

    /// Make sure the store for the current storage root is loaded
    async fn loaded<'a>(
        &self,
        state: &'a mut Option<LoadedStore>,
    ) -> Result<&'a mut LoadedStore, RepositoryError> {
        let root = self.settings.storage_root();
        if state.as_ref().is_none_or(|store| store.root != root) {
            *state = Some(load_store(root.clone()).await?);
        }
        Ok(state.get_or_insert_with(|| LoadedStore::empty(root)))
    }
}

#[async_trait]
impl PodcastRepository for JsonPodcastRepository {
    async fn list(&self) -> Result<Vec<Podcast>, RepositoryError> {
        let mut state = self.state.lock().await;
        let store = self.loaded(&mut state).await?;

        let mut podcasts: Vec<Podcast> = store.podcasts.values().cloned().collect();
        sort_by_last_updated(&mut podcasts);
        Ok(podcasts)
    }

    async fn get(&self, id: &str) -> Result<Option<Podcast>, RepositoryError> {
        let mut state = self.state.lock().await;
        let store = self.loaded(&mut state).await?;
        Ok(store.podcasts.get(id).cloned())
    }

    async fn upsert(&self, podcast: &Podcast) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let store = self.loaded(&mut state).await?;

        let mut next = store.podcasts.clone();
        next.insert(podcast.id().to_string(), podcast.clone());
        write_store(&store.root, &next).await?;
        store.podcasts = next;

        debug!(podcast_id = podcast.id(), "Stored podcast");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let store = self.loaded(&mut state).await?;

        if !store.podcasts.contains_key(id) {
            return Ok(());
        }

        let mut next = store.podcasts.clone();
        next.remove(id);
        write_store(&store.root, &next).await?;
        store.podcasts = next;

        debug!(podcast_id = id, "Removed podcast");
        Ok(())
    }
}

/// Read the store file for `root`
///
/// A missing file yields an empty store. A file that fails to parse is moved
/// aside and also yields an empty store.
async fn load_store(root: PathBuf) -> Result<LoadedStore, RepositoryError> {
    let path = StorageSettings::store_path(&root);

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No podcast store yet, starting empty");
            return Ok(LoadedStore::empty(root));
        }
        Err(e) => return Err(RepositoryError::ReadFailed { path, source: e }),
    };

    let document: PodcastStoreDocument = match serde_json::from_slice(&content) {
        Ok(document) => document,
        Err(e) => {
            error!(
                path = %path.display(),
                "Podcast store is corrupt, starting with an empty store: {}", e
            );
            set_aside_corrupt_store(&path).await;
            return Ok(LoadedStore::empty(root));
        }
    };

    let podcasts = document
        .into_podcasts(&root)
        .into_iter()
        .map(|podcast| (podcast.id().to_string(), podcast))
        .collect::<HashMap<_, _>>();

    debug!(
        path = %path.display(),
        podcasts = podcasts.len(),
        "Loaded podcast store"
    );

    Ok(LoadedStore { root, podcasts })
}

async fn set_aside_corrupt_store(path: &Path) {
    let backup = path.with_extension("json.corrupt");
    if let Err(e) = tokio::fs::rename(path, &backup).await {
        warn!(
            path = %path.display(),
            "Failed to move corrupt podcast store aside: {}", e
        );
    }
}

/// Serialize the complete podcast map into the store file for `root`
///
/// Writes to a temporary file first and renames it over the store, so the
/// store file is always either the old or the new version.
async fn write_store(
    root: &Path,
    podcasts: &HashMap<String, Podcast>,
) -> Result<(), RepositoryError> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| RepositoryError::CreateDirectoryFailed {
            path: root.to_path_buf(),
            source: e,
        })?;

    let mut ordered: Vec<&Podcast> = podcasts.values().collect();
    ordered.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.id().cmp(b.id()))
    });

    let document = PodcastStoreDocument::from_podcasts(ordered, root);
    let json = serde_json::to_vec_pretty(&document)?;

    let path = StorageSettings::store_path(root);
    let partial_path = path.with_extension("json.partial");

    tokio::fs::write(&partial_path, json)
        .await
        .map_err(|e| RepositoryError::WriteFailed {
            path: partial_path.clone(),
            source: e,
        })?;

    tokio::fs::rename(&partial_path, &path)
        .await
        .map_err(|e| RepositoryError::WriteFailed { path, source: e })
}
