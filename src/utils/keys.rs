//! Helpers for treating a flat key space as a path hierarchy.

use std::path::{Component, Path, PathBuf};

pub const DELIMITER: char = '/';

/// Append the delimiter to a non-empty prefix that lacks one
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(DELIMITER) {
        prefix.to_string()
    } else {
        format!("{prefix}{DELIMITER}")
    }
}

pub fn join_prefix_key(prefix: &str, key: &str) -> String {
    format!("{}{}", normalize_prefix(prefix), key)
}

/// Last non-empty segment of a key or local path: `a/b/c.txt` -> `c.txt`, `a/b/` -> `b`
pub fn display_name(key: &str) -> String {
    key.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Split the final segment of a key into stem and extension (extension keeps its dot).
///
/// Dotfiles such as `.env` have no extension, matching how file managers treat them.
pub fn split_name(key: &str) -> (&str, &str) {
    let segment_start = key.rfind(DELIMITER).map(|idx| idx + 1).unwrap_or(0);
    match key[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => key.split_at(segment_start + dot),
        _ => (key, ""),
    }
}

/// Path of `key` relative to `prefix`, or `None` when it lies outside
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}

/// Reject absolute paths and `..` so a remote key can never escape a local directory
pub fn sanitize_relative_path(relative_path: &str) -> Option<PathBuf> {
    let candidate = Path::new(relative_path);
    if candidate.is_absolute() {
        return None;
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(candidate.to_path_buf())
}

/// Local path for a key fragment below a downloaded folder.
///
/// Empty and `.` segments are dropped so `a//b.txt` lands at `a/b.txt`. `None` when
/// nothing is left or a segment would escape the destination.
pub fn local_relative_path(relative_key: &str) -> Option<PathBuf> {
    let segments: Vec<&str> = relative_key
        .split(DELIMITER)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        return None;
    }
    sanitize_relative_path(&segments.join("/"))
}

/// Relative local path rendered as a key fragment with `/` separators
pub fn normalize_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|part| match part {
            Component::Normal(value) => Some(value.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    pub prefix: String,
}

/// One crumb per segment of `prefix`, each carrying the prefix up to and including itself
pub fn breadcrumbs(prefix: &str) -> Vec<Breadcrumb> {
    let segments: Vec<&str> = prefix.split(DELIMITER).filter(|s| !s.is_empty()).collect();
    (0..segments.len())
        .map(|idx| Breadcrumb {
            label: segments[idx].to_string(),
            prefix: segments[..=idx]
                .iter()
                .map(|s| format!("{s}{DELIMITER}"))
                .collect(),
        })
        .collect()
}
