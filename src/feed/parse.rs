// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use url::Url;

use crate::error::FeedError;
use crate::model::{Episode, Podcast, episode_id, parse_clock_duration};

/// Parse RSS feed XML bytes into a Podcast
///
/// Items without an enclosure are skipped. The podcast's `last_updated` is
/// taken from the channel, falling back to the newest episode and finally to
/// the current time.
pub fn parse_feed(xml_bytes: &[u8], feed_uri: &str) -> Result<Podcast, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;
    let mut podcast = Podcast::new(feed_uri)?;

    let episodes: Vec<Episode> = channel
        .items()
        .iter()
        .filter_map(|item| {
            let episode = parse_episode(item, podcast.feed_uri());
            if episode.is_none() {
                debug!(title = item.title(), "Skipping feed item without usable enclosure");
            }
            episode
        })
        .collect();

    podcast.title = decode_text(channel.title());
    podcast.description = Some(channel.description().trim().to_string()).filter(|s| !s.is_empty());
    podcast.artwork_uri = channel
        .image()
        .and_then(|img| Url::parse(img.url()).ok())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .and_then(|url| Url::parse(url).ok())
        });

    let channel_date = channel
        .last_build_date()
        .or(channel.pub_date())
        .and_then(parse_date);
    let newest_episode = episodes.iter().filter_map(|e| e.published_at).max();
    podcast.last_updated = channel_date.or(newest_episode).unwrap_or_else(Utc::now);

    podcast.merge_episodes(episodes);
    Ok(podcast)
}

fn parse_episode(item: &rss::Item, feed_uri: &str) -> Option<Episode> {
    let enclosure = item.enclosure()?;
    let media_uri = Url::parse(enclosure.url()).ok()?;

    let title = item
        .title()
        .map(decode_text)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let id = episode_id(
        feed_uri,
        item.guid().map(|g| g.value()),
        media_uri.as_str(),
    );

    let itunes = item.itunes_ext();

    let mut episode = Episode::new(id, media_uri, title);
    episode.summary = item
        .description()
        .or_else(|| itunes.and_then(|ext| ext.summary()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    episode.published_at = item.pub_date().and_then(parse_date);
    episode.duration = itunes
        .and_then(|ext| ext.duration())
        .and_then(parse_clock_duration);
    episode.episode_number = itunes.and_then(|ext| ext.episode().and_then(|e| e.trim().parse().ok()));
    episode.artwork_uri = itunes
        .and_then(|ext| ext.image())
        .and_then(|url| Url::parse(url).ok());

    Some(episode)
}

fn decode_text(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}

fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(date_str.trim())
        .or_else(|_| parse_relaxed_date(date_str.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    let mut last_error = None;
    for format in formats {
        match DateTime::parse_from_str(date_str, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => DateTime::parse_from_rfc3339(date_str),
    }
}
