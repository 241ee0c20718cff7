// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Component, Path, PathBuf};

/// Convert a local path into its persisted form
///
/// Paths below `root` become root-relative with `/` separators; anything
/// else is kept verbatim.
pub fn to_portable_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        _ => path.to_string_lossy().into_owned(),
    }
}

/// Rehydrate a persisted path against the current root
///
/// Absolute paths are returned unchanged, relative ones are joined onto
/// `root`. Empty values mean "no path".
pub fn from_portable_path(stored: &str, root: &Path) -> Option<PathBuf> {
    let stored = stored.trim();
    if stored.is_empty() {
        return None;
    }

    let candidate = Path::new(stored);
    if candidate.is_absolute() {
        return Some(candidate.to_path_buf());
    }

    let mut path = root.to_path_buf();
    for part in stored.split(['/', '\\']).filter(|p| !p.is_empty()) {
        path.push(part);
    }
    Some(path)
}
