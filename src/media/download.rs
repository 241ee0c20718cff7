// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::MediaTransfer;
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::model::{Episode, Podcast};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Media transfer over HTTP
///
/// Episodes are streamed into a `.partial` file next to the destination and
/// renamed into place once complete. Interrupted transfers leave nothing
/// behind; there is no resuming.
#[derive(Debug, Clone)]
pub struct HttpMediaTransfer<C> {
    client: C,
}

impl<C: HttpClient> HttpMediaTransfer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn stream_to_file(
        &self,
        episode: &Episode,
        partial_path: &Path,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let url = episode.media_uri().as_str();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get_stream(url) => response,
        };
        let response = response.map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

        if response.status >= 400 {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        reporter.report(ProgressEvent::DownloadStarting {
            episode_id: episode.id().to_string(),
            episode_title: episode.title.clone(),
            content_length: response.content_length,
        });

        let mut file =
            File::create(partial_path)
                .await
                .map_err(|e| DownloadError::FileCreateFailed {
                    path: partial_path.to_path_buf(),
                    source: e,
                })?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.body;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };

            let Some(chunk_result) = next else {
                break;
            };

            let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: partial_path.to_path_buf(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            reporter.report(ProgressEvent::DownloadProgress {
                episode_id: episode.id().to_string(),
                bytes_downloaded,
                total_bytes: response.content_length,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.to_path_buf(),
                source: e,
            })?;

        Ok(bytes_downloaded)
    }
}

#[async_trait]
impl<C: HttpClient> MediaTransfer for HttpMediaTransfer<C> {
    async fn download_episode(
        &self,
        _podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
        reporter: &SharedProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        ensure_parent_dir(destination).await?;
        let partial_path = partial_path_for(destination);

        let bytes_downloaded = match self
            .stream_to_file(episode, &partial_path, reporter, cancel)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&partial_path).await;
                return Err(e);
            }
        };

        reporter.report(ProgressEvent::Finalizing {
            episode_id: episode.id().to_string(),
        });

        if let Err(e) = tokio::fs::rename(&partial_path, destination).await {
            remove_partial(&partial_path).await;
            return Err(DownloadError::FinalizeFailed {
                from: partial_path,
                to: destination.to_path_buf(),
                source: e,
            });
        }

        reporter.report(ProgressEvent::DownloadCompleted {
            episode_id: episode.id().to_string(),
            episode_title: episode.title.clone(),
            bytes_downloaded,
        });

        Ok(())
    }

    async fn download_artwork(
        &self,
        podcast: &Podcast,
        episode: &Episode,
        destination: &Path,
    ) -> Result<Option<PathBuf>, DownloadError> {
        let Some(url) = episode.artwork_uri.as_ref().or(podcast.artwork_uri.as_ref()) else {
            return Ok(None);
        };
        let url = url.as_str();

        let response = self
            .client
            .get_bytes(url)
            .await
            .map_err(|e| DownloadError::HttpFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        ensure_parent_dir(destination).await?;
        tokio::fs::write(destination, &response.body)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;

        debug!(path = %destination.display(), "Stored artwork");
        Ok(Some(destination.to_path_buf()))
    }
}

fn partial_path_for(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

async fn ensure_parent_dir(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: parent.to_path_buf(),
            source: e,
        })
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove partial download: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpBody, HttpResponse};
    use crate::progress::{NoopReporter, ProgressReporter};
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use url::Url;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
        /// Yield one chunk, then never finish
        stall: bool,
    }

    impl MockHttpClient {
        fn ok(data: &[u8]) -> Self {
            Self {
                response_data: data.to_vec(),
                status: 200,
                stall: false,
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<HttpBody, reqwest::Error> {
            Ok(HttpBody {
                status: self.status,
                body: Bytes::from(self.response_data.clone()),
            })
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let first =
                futures::stream::once(async move { Ok::<_, reqwest::Error>(Bytes::from(data)) });
            let stream: ByteStream = if self.stall {
                Box::pin(first.chain(futures::stream::pending()))
            } else {
                Box::pin(first)
            };

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn make_podcast() -> Podcast {
        let mut podcast = Podcast::new("https://example.com/feed.xml").unwrap();
        podcast.title = "Test Podcast".to_string();
        podcast
    }

    fn make_episode() -> Episode {
        Episode::new(
            "test-guid",
            Url::parse("https://example.com/episode.mp3").unwrap(),
            "Test Episode",
        )
    }

    #[tokio::test]
    async fn download_writes_file_and_reports_progress() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("show").join("episode.mp3");
        let transfer = HttpMediaTransfer::new(MockHttpClient::ok(b"test audio content"));
        let recorder = Arc::new(RecordingReporter::default());
        let reporter: SharedProgressReporter = recorder.clone();

        transfer
            .download_episode(
                &make_podcast(),
                &make_episode(),
                &destination,
                &reporter,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"test audio content");
        assert!(!partial_path_for(&destination).exists());

        let events = recorder.events.lock().unwrap();
        assert!(matches!(events.first(), Some(ProgressEvent::DownloadStarting { .. })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::DownloadCompleted {
                bytes_downloaded: 18,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn download_fails_on_http_error() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("episode.mp3");
        let transfer = HttpMediaTransfer::new(MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
            stall: false,
        });

        let result = transfer
            .download_episode(
                &make_podcast(),
                &make_episode(),
                &destination,
                &NoopReporter::shared(),
                &CancellationToken::new(),
            )
            .await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("episode.mp3");
        let transfer = HttpMediaTransfer::new(MockHttpClient::ok(b"audio"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transfer
            .download_episode(
                &make_podcast(),
                &make_episode(),
                &destination,
                &NoopReporter::shared(),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn cancellation_mid_stream_removes_partial_file() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("episode.mp3");
        let transfer = HttpMediaTransfer::new(MockHttpClient {
            response_data: b"first chunk".to_vec(),
            status: 200,
            stall: true,
        });
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            let partial = partial_path_for(&destination);
            tokio::spawn(async move {
                while !partial.exists() {
                    tokio::task::yield_now().await;
                }
                cancel.cancel();
            })
        };

        let result = transfer
            .download_episode(
                &make_podcast(),
                &make_episode(),
                &destination,
                &NoopReporter::shared(),
                &cancel,
            )
            .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert!(!destination.exists());
        assert!(!partial_path_for(&destination).exists());
    }

    #[tokio::test]
    async fn artwork_is_written_to_destination() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("show").join("episode.jpg");
        let transfer = HttpMediaTransfer::new(MockHttpClient::ok(b"jpeg bytes"));
        let mut episode = make_episode();
        episode.artwork_uri = Some(Url::parse("https://example.com/cover.jpg").unwrap());

        let path = transfer
            .download_artwork(&make_podcast(), &episode, &destination)
            .await
            .unwrap();

        assert_eq!(path, Some(destination.clone()));
        assert_eq!(std::fs::read(&destination).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn artwork_falls_back_to_podcast_image() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("episode.jpg");
        let transfer = HttpMediaTransfer::new(MockHttpClient::ok(b"png bytes"));
        let mut podcast = make_podcast();
        podcast.artwork_uri = Some(Url::parse("https://example.com/show.png").unwrap());

        let path = transfer
            .download_artwork(&podcast, &make_episode(), &destination)
            .await
            .unwrap();
        assert!(path.is_some());
    }

    #[tokio::test]
    async fn no_artwork_uri_yields_none() {
        let dir = tempdir().unwrap();
        let transfer = HttpMediaTransfer::new(MockHttpClient::ok(b""));

        let path = transfer
            .download_artwork(&make_podcast(), &make_episode(), &dir.path().join("a.jpg"))
            .await
            .unwrap();
        assert!(path.is_none());
    }
}
