// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod parse;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FeedError;
use crate::model::Podcast;

pub use fetch::{RssFeedSource, is_url};
pub use parse::parse_feed;

/// Produces a fully populated podcast, episodes included, for a feed URI
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_podcast(&self, feed_uri: &str) -> Result<Podcast, FeedError>;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn fetch_podcast(&self, feed_uri: &str) -> Result<Podcast, FeedError> {
        (**self).fetch_podcast(feed_uri).await
    }
}
