// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Name of the podcast store file directly below the storage root
pub const STORE_FILENAME: &str = "podcasts.json";

/// Directory name used below the platform data directory
const APP_DIR_NAME: &str = "podkeep";

/// Environment variable overriding the storage root
pub const STORAGE_ROOT_ENV: &str = "PODKEEP_ROOT";

/// Default storage root: the platform data directory, or the working
/// directory if the platform has none
pub fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
}

/// Runtime storage configuration shared between the repository and the
/// manager
///
/// The storage root can be changed while the application runs; consumers
/// always read the current value.
#[derive(Debug)]
pub struct StorageSettings {
    root: RwLock<PathBuf>,
}

/// A shared reference to the storage settings
pub type SharedStorageSettings = Arc<StorageSettings>;

impl StorageSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: RwLock::new(root.into()),
        }
    }

    /// Create settings wrapped in an Arc
    pub fn shared(root: impl Into<PathBuf>) -> SharedStorageSettings {
        Arc::new(Self::new(root))
    }

    pub fn storage_root(&self) -> PathBuf {
        self.root
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_storage_root(&self, root: impl Into<PathBuf>) {
        let mut guard = self
            .root
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = root.into();
    }

    /// Path of the podcast store file for a given root
    pub fn store_path(root: &Path) -> PathBuf {
        root.join(STORE_FILENAME)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self::new(default_storage_root())
    }
}
