// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::FeedSource;
use super::parse::parse_feed;
use crate::error::FeedError;
use crate::http::HttpClient;
use crate::model::Podcast;

/// Feed source reading RSS from http(s) URLs or local files
#[derive(Debug, Clone)]
pub struct RssFeedSource<C> {
    client: C,
}

impl<C: HttpClient> RssFeedSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FeedError> {
        let response = self
            .client
            .get_bytes(url)
            .await
            .map_err(|e| FeedError::FetchFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for RssFeedSource<C> {
    async fn fetch_podcast(&self, feed_uri: &str) -> Result<Podcast, FeedError> {
        let feed_uri = feed_uri.trim();
        let bytes = if is_url(feed_uri) {
            debug!(url = feed_uri, "Fetching feed");
            self.fetch_bytes(feed_uri).await?
        } else {
            debug!(path = feed_uri, "Reading feed file");
            read_feed_file(Path::new(feed_uri)).await?
        };

        parse_feed(&bytes, feed_uri)
    }
}

async fn read_feed_file(path: &Path) -> Result<Bytes, FeedError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| FeedError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
