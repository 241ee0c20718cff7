pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod manager;
pub mod media;
pub mod model;
pub mod progress;
pub mod repository;

// Re-export main types for convenience
pub use config::{SharedStorageSettings, StorageSettings, default_storage_root};
pub use error::{DownloadError, FeedError, ManagerError, ModelError, RepositoryError};
pub use feed::{FeedSource, RssFeedSource, is_url, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use manager::{DownloadSummary, PodcastManager};
pub use media::{HttpMediaTransfer, MediaTransfer, episode_file_path};
pub use model::{DownloadStatus, Episode, Podcast, create_id};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use repository::{InMemoryPodcastRepository, JsonPodcastRepository, PodcastRepository};
