// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios: a feed read from a local RSS file, a media transfer
//! that writes real files and the JSON store below a temporary root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use podkeep::{
    DownloadError, DownloadStatus, Episode, JsonPodcastRepository, ManagerError, NoopReporter,
    Podcast, PodcastManager, PodcastRepository, ProgressEvent, ProgressReporter, ReqwestClient,
    RssFeedSource, SharedProgressReporter, StorageSettings,
};
use podkeep::config::SharedStorageSettings;
use podkeep::media::MediaTransfer;

const FEED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Scenario Show</title>
    <description>Three episodes</description>
    <itunes:image href="https://example.com/cover.jpg"/>
    <item>
      <title>First</title>
      <guid>first</guid>
      <pubDate>Mon, 01 Jan 2024 08:00:00 +0000</pubDate>
      <enclosure url="https://example.com/1.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Second</title>
      <guid>second</guid>
      <pubDate>Tue, 02 Jan 2024 08:00:00 +0000</pubDate>
      <enclosure url="https://example.com/2.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Third</title>
      <guid>third</guid>
      <pubDate>Wed, 03 Jan 2024 08:00:00 +0000</pubDate>
      <enclosure url="https://example.com/3.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

const FOURTH_ITEM: &str = r#"
    <item>
      <title>Fourth</title>
      <guid>fourth</guid>
      <pubDate>Thu, 04 Jan 2024 08:00:00 +0000</pubDate>
      <enclosure url="https://example.com/4.mp3" type="audio/mpeg"/>
    </item>
  </channel>"#;

/// Writes a few bytes for every transfer instead of touching the network
#[derive(Default)]
struct FileWritingMedia {
    failing: HashSet<String>,
    cancelling: HashSet<String>,
    transfers: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaTransfer for FileWritingMedia {
    async fn download_episode(
        &self,
        _podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        self.transfers.lock().unwrap().push(episode.id().to_string());

        if self.cancelling.contains(episode.id()) {
            cancel.cancel();
            return Err(DownloadError::Cancelled);
        }
        if self.failing.contains(episode.id()) {
            return Err(DownloadError::HttpStatus {
                url: episode.media_uri().to_string(),
                status: 503,
            });
        }

        write_file(destination, b"audio").await;
        reporter.report(ProgressEvent::DownloadCompleted {
            episode_id: episode.id().to_string(),
            episode_title: episode.title.clone(),
            bytes_downloaded: 5,
        });
        Ok(())
    }

    async fn download_artwork(
        &self,
        _podcast: &Podcast,
        _episode: &Episode,
        destination: &Path,
    ) -> Result<Option<PathBuf>, DownloadError> {
        write_file(destination, b"image").await;
        Ok(Some(destination.to_path_buf()))
    }
}

async fn write_file(path: &Path, contents: &[u8]) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, contents).await.unwrap();
}

#[derive(Default)]
struct BatchRecorder {
    fractions: Mutex<Vec<f64>>,
}

impl ProgressReporter for BatchRecorder {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::BatchProgress { fraction, .. } = event {
            self.fractions.lock().unwrap().push(fraction);
        }
    }
}

type Manager = PodcastManager<
    RssFeedSource<ReqwestClient>,
    Arc<FileWritingMedia>,
    Arc<JsonPodcastRepository>,
>;

struct Fixture {
    _dir: TempDir,
    feed_path: PathBuf,
    root: PathBuf,
    settings: SharedStorageSettings,
    media: Arc<FileWritingMedia>,
    repository: Arc<JsonPodcastRepository>,
    manager: Manager,
}

impl Fixture {
    fn new() -> Self {
        Self::with_media(FileWritingMedia::default())
    }

    fn with_media(media: FileWritingMedia) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let feed_path = dir.path().join("feed.xml");
        std::fs::write(&feed_path, FEED_XML).unwrap();

        let root = dir.path().join("library");
        let settings = StorageSettings::shared(&root);
        let media = Arc::new(media);
        let repository = Arc::new(JsonPodcastRepository::new(settings.clone()));
        let manager = PodcastManager::new(
            RssFeedSource::new(ReqwestClient::new()),
            media.clone(),
            repository.clone(),
            settings.clone(),
        );

        Self {
            _dir: dir,
            feed_path,
            root,
            settings,
            media,
            repository,
            manager,
        }
    }

    fn feed_uri(&self) -> String {
        self.feed_path.display().to_string()
    }

    async fn subscribe(&self) -> Podcast {
        self.manager
            .subscribe(&self.feed_uri(), &CancellationToken::new())
            .await
            .unwrap()
    }

    async fn download(&self, podcast_id: &str, episode_id: &str) -> Result<Episode, ManagerError> {
        self.manager
            .download_episode(
                podcast_id,
                episode_id,
                &NoopReporter::shared(),
                &CancellationToken::new(),
            )
            .await
    }
}

fn status_of(podcast: &Podcast, episode_id: &str) -> DownloadStatus {
    podcast.episode(episode_id).unwrap().download_status()
}

#[tokio::test]
async fn subscribing_stores_every_episode_with_artwork() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;

    assert_eq!(podcast.title, "Scenario Show");
    let ids: Vec<&str> = podcast.episodes().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["third", "second", "first"]);

    for episode in podcast.episodes() {
        assert_eq!(episode.download_status(), DownloadStatus::NotStarted);
        let artwork = episode.artwork_file_path().unwrap();
        assert!(artwork.starts_with(&fixture.root));
        assert!(artwork.exists());
    }

    assert!(StorageSettings::store_path(&fixture.root).exists());
    assert_eq!(fixture.manager.list().await.unwrap(), vec![podcast]);
}

#[tokio::test]
async fn downloading_one_episode_leaves_the_others_untouched() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;

    let episode = fixture.download(podcast.id(), "second").await.unwrap();
    let media_path = episode.local_file_path().unwrap();
    assert!(media_path.exists());
    assert!(media_path.starts_with(fixture.root.join("Scenario-Show")));

    let stored = fixture.manager.get(podcast.id()).await.unwrap();
    assert_eq!(status_of(&stored, "first"), DownloadStatus::NotStarted);
    assert_eq!(status_of(&stored, "second"), DownloadStatus::Completed);
    assert_eq!(status_of(&stored, "third"), DownloadStatus::NotStarted);
}

#[tokio::test]
async fn refreshing_keeps_completed_downloads() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;
    let downloaded = fixture.download(podcast.id(), "first").await.unwrap();

    let grown = FEED_XML.replace("\n  </channel>", FOURTH_ITEM);
    std::fs::write(&fixture.feed_path, grown).unwrap();

    let refreshed = fixture
        .manager
        .refresh(podcast.id(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(refreshed.episodes().len(), 4);
    assert_eq!(refreshed.episodes()[0].id(), "fourth");
    let first = refreshed.episode("first").unwrap();
    assert!(first.is_downloaded());
    assert_eq!(first.local_file_path(), downloaded.local_file_path());
}

#[tokio::test]
async fn failed_download_is_recorded_before_the_error_returns() {
    let fixture = Fixture::with_media(FileWritingMedia {
        failing: HashSet::from(["third".to_string()]),
        ..Default::default()
    });
    let podcast = fixture.subscribe().await;

    let err = fixture.download(podcast.id(), "third").await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Download(DownloadError::HttpStatus { status: 503, .. })
    ));

    // Read straight from the store to see what was persisted
    let stored = fixture.repository.get(podcast.id()).await.unwrap().unwrap();
    let episode = stored.episode("third").unwrap();
    assert_eq!(episode.download_status(), DownloadStatus::Failed);
    assert!(episode.local_file_path().is_none());
}

#[tokio::test]
async fn download_all_skips_completed_and_finishes_at_one() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;
    fixture.download(podcast.id(), "third").await.unwrap();

    let recorder = Arc::new(BatchRecorder::default());
    let reporter: SharedProgressReporter = recorder.clone();
    let summary = fixture
        .manager
        .download_all_episodes(podcast.id(), 1, &reporter, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(*recorder.fractions.lock().unwrap(), vec![0.5, 1.0]);

    let transfers = fixture.media.transfers.lock().unwrap().clone();
    assert_eq!(transfers, vec!["third", "second", "first"]);

    let stored = fixture.manager.get(podcast.id()).await.unwrap();
    assert!(stored.episodes().iter().all(Episode::is_downloaded));
}

#[tokio::test]
async fn cancelling_a_download_marks_it_failed() {
    let fixture = Fixture::with_media(FileWritingMedia {
        cancelling: HashSet::from(["second".to_string()]),
        ..Default::default()
    });
    let podcast = fixture.subscribe().await;

    let err = fixture
        .manager
        .download_all_episodes(
            podcast.id(),
            3,
            &NoopReporter::shared(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let stored = fixture.manager.get(podcast.id()).await.unwrap();
    assert_eq!(status_of(&stored, "third"), DownloadStatus::Completed);
    assert_eq!(status_of(&stored, "second"), DownloadStatus::Failed);
    assert_eq!(status_of(&stored, "first"), DownloadStatus::NotStarted);
}

#[tokio::test]
async fn removing_unknown_podcast_changes_nothing() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;

    fixture.manager.remove("does-not-exist").await.unwrap();
    assert_eq!(fixture.manager.list().await.unwrap().len(), 1);

    fixture.manager.remove(podcast.id()).await.unwrap();
    assert!(fixture.manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_follows_a_relocated_root() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;
    fixture.download(podcast.id(), "first").await.unwrap();

    let moved = fixture.root.with_file_name("moved-library");
    std::fs::rename(&fixture.root, &moved).unwrap();

    // A fresh repository over the moved root resolves paths below it
    let reopened = JsonPodcastRepository::new(StorageSettings::shared(&moved));
    let stored = reopened.get(podcast.id()).await.unwrap().unwrap();
    let episode = stored.episode("first").unwrap();
    let media_path = episode.local_file_path().unwrap();
    assert!(media_path.starts_with(&moved));
    assert!(media_path.exists());
    assert!(episode.artwork_file_path().unwrap().exists());

    // The running manager picks the store up once its root is changed
    fixture.settings.set_storage_root(&moved);
    let listed = fixture.manager.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(
        listed[0]
            .episode("first")
            .unwrap()
            .local_file_path()
            .unwrap()
            .starts_with(&moved)
    );
}

#[tokio::test]
async fn interrupted_downloads_are_recovered_on_restart() {
    let fixture = Fixture::new();
    let podcast = fixture.subscribe().await;

    let mut crashed = fixture.repository.get(podcast.id()).await.unwrap().unwrap();
    crashed.episode_mut("second").unwrap().mark_in_progress().unwrap();
    fixture.repository.upsert(&crashed).await.unwrap();

    let restarted = JsonPodcastRepository::new(fixture.settings.clone());
    let manager = PodcastManager::new(
        RssFeedSource::new(ReqwestClient::new()),
        fixture.media.clone(),
        restarted,
        fixture.settings.clone(),
    );

    assert_eq!(manager.recover_interrupted().await.unwrap(), 1);
    let stored = manager.get(podcast.id()).await.unwrap();
    assert_eq!(status_of(&stored, "second"), DownloadStatus::Failed);

    // A failed episode can be downloaded again
    let episode = manager
        .download_episode(
            podcast.id(),
            "second",
            &NoopReporter::shared(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(episode.is_downloaded());
}
