// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod duration;
mod episode;
mod id;
mod podcast;

pub use duration::{format_clock_duration, parse_clock_duration};
pub use episode::{DownloadStatus, Episode};
pub use id::{create_id, episode_id};
pub use podcast::Podcast;
