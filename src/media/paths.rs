// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Where downloaded media and artwork live below the storage root.
//!
//! Everything here is a pure function of the podcast and episode, so
//! resolving the same episode twice always yields the same path.

use std::path::{Path, PathBuf};

use url::Url;

use crate::model::{Episode, Podcast};

/// Maximum length for the title portion of a filename
const MAX_TITLE_LENGTH: usize = 100;

/// Directory holding all files of one podcast
pub fn podcast_dir(root: &Path, podcast: &Podcast) -> PathBuf {
    root.join(podcast_dir_name(podcast))
}

/// Local path of an episode's media file
pub fn episode_file_path(root: &Path, podcast: &Podcast, episode: &Episode) -> PathBuf {
    podcast_dir(root, podcast).join(format!(
        "{}.{}",
        episode_file_stem(episode),
        audio_extension(episode.media_uri())
    ))
}

/// Local path of an episode's artwork image
///
/// The extension follows the episode artwork, then the podcast artwork.
pub fn artwork_file_path(root: &Path, podcast: &Podcast, episode: &Episode) -> PathBuf {
    let extension = episode
        .artwork_uri
        .as_ref()
        .or(podcast.artwork_uri.as_ref())
        .map(image_extension)
        .unwrap_or("jpg");

    podcast_dir(root, podcast).join(format!("{}.{}", episode_file_stem(episode), extension))
}

/// Directory name for a podcast: its sanitized title, or its id when the
/// title has nothing usable
pub fn podcast_dir_name(podcast: &Podcast) -> String {
    let name = sanitize_filename::sanitize(sanitize_title(&podcast.title));
    if name.is_empty() {
        podcast.id().to_string()
    } else {
        name
    }
}

/// Generate a filename stem (without extension) for an episode
///
/// Format: "[NNN-]YYYY-MM-DD-sanitized-title" or "[NNN-]undated-sanitized-title".
/// Falls back to the episode id when the title sanitizes to nothing.
pub fn episode_file_stem(episode: &Episode) -> String {
    let number_prefix = episode
        .episode_number
        .map(|n| format!("{:03}-", n))
        .unwrap_or_default();

    let date_prefix = episode
        .published_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let sanitized_title = match sanitize_title(&episode.title) {
        title if title.is_empty() => sanitize_title(episode.id()),
        title => title,
    };

    format!("{}{}-{}", number_prefix, date_prefix, sanitized_title)
}

/// Check if a character is allowed in filenames (whitelist approach)
fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

/// Audio extension from the media URL path, defaulting to "mp3"
fn audio_extension(url: &Url) -> &'static str {
    match url_extension(url).as_deref() {
        Some("mp3") => "mp3",
        Some("m4a") => "m4a",
        Some("mp4") => "mp4",
        Some("aac") => "aac",
        Some("ogg") => "ogg",
        Some("opus") => "opus",
        Some("wav") => "wav",
        Some("flac") => "flac",
        _ => "mp3",
    }
}

/// Image extension from the artwork URL path, defaulting to "jpg"
fn image_extension(url: &Url) -> &'static str {
    match url_extension(url).as_deref() {
        Some("png") => "png",
        Some("webp") => "webp",
        Some("gif") => "gif",
        _ => "jpg",
    }
}

fn url_extension(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|filename| filename.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
}

/// Sanitize a title for use in a filename using whitelist approach
fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if is_valid_filename_char(c) { c } else { '-' })
        .collect();

    let collapsed = collapse_separators(&sanitized);

    let trimmed = collapsed.trim_matches(|c: char| c == '-' || c == '.' || c.is_whitespace());

    if trimmed.len() > MAX_TITLE_LENGTH {
        truncate_at_boundary(trimmed, MAX_TITLE_LENGTH)
    } else {
        trimmed.to_string()
    }
}

/// Collapse multiple spaces and dashes into single dashes
fn collapse_separators(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '-' || c.is_whitespace() {
            if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

/// Truncate string at a word boundary
fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let truncated: String = s.chars().take(max_len).collect();
    if let Some(pos) = truncated.rfind('-')
        && pos > max_len / 2
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('-').to_string()
}
