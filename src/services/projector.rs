use crate::models::Entry;
use crate::services::storage::RawObject;
use crate::utils::keys::DELIMITER;
use std::cmp::Ordering;
use std::collections::HashSet;

/// How the listing that produced the raw results was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// One level, folders arrive as common prefixes
    Delimited,
    /// Everything below the prefix, no delimiter; zero-byte `.../` markers are dropped
    Recursive,
}

/// Folds common prefixes and content keys of a listing into display entries
pub struct FolderProjector;

impl FolderProjector {
    pub fn project(
        prefix: &str,
        common_prefixes: &[String],
        objects: &[RawObject],
        mode: ProjectionMode,
    ) -> Vec<Entry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(common_prefixes.len() + objects.len());

        for folder_key in common_prefixes {
            if !seen.insert(folder_key.as_str()) {
                continue;
            }
            let trimmed = folder_key.strip_suffix(DELIMITER).unwrap_or(folder_key);
            let name = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
            entries.push(Entry::folder(name, folder_key.as_str()));
        }

        for object in objects {
            if object.key == prefix || !seen.insert(object.key.as_str()) {
                continue;
            }
            if mode == ProjectionMode::Recursive && is_folder_marker(object) {
                continue;
            }
            let name = object.key.strip_prefix(prefix).unwrap_or(&object.key);
            entries.push(Entry::file(
                name,
                object.key.as_str(),
                object.size,
                object.last_modified,
            ));
        }

        sort_entries(&mut entries);
        entries
    }
}

pub fn is_folder_marker(object: &RawObject) -> bool {
    object.size == 0 && object.key.ends_with(DELIMITER)
}

/// Folders first, then ordinal by name; key breaks ties so the order is total
pub fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_folder
        .cmp(&a.is_folder)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.key.cmp(&b.key))
}

pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(compare_entries);
}

/// Case-insensitive substring match on the display name
pub fn filter_entries(entries: &[Entry], term: &str) -> Vec<Entry> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}
