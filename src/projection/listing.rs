//! Directory listings for every directory node kind.
//!
//! Listings are pure functions of catalog records and config lists, so
//! ordering is stable and deterministic for a given snapshot. `.` and `..`
//! are added by the FUSE layer.

use super::node::{ABOUT_FILE, HELP_FILE, IMAGE_FILE, M3U_FILE, TRACKS_JSON_FILE};
use crate::catalog::{Channel, Track};
use crate::common::sanitize::{sanitize, title_stem};
use crate::common::tags::tags_or_untagged;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
        }
    }

    fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }
}

/// Tracks in display order: position 0 is the oldest.
pub fn reversed(tracks: &[Track]) -> impl Iterator<Item = &Track> {
    tracks.iter().rev()
}

pub fn root_entries() -> Vec<DirEntry> {
    vec![
        DirEntry::file(HELP_FILE),
        DirEntry::dir("channels"),
        DirEntry::dir("favorites"),
        DirEntry::dir("downloads"),
    ]
}

/// `/channels`: one directory per channel, ordered as delivered.
pub fn channels_entries(channels: &[Channel]) -> Vec<DirEntry> {
    channels
        .iter()
        .map(|channel| DirEntry::dir(channel.slug.clone()))
        .collect()
}

pub fn channel_entries() -> Vec<DirEntry> {
    vec![
        DirEntry::file(ABOUT_FILE),
        DirEntry::file(IMAGE_FILE),
        DirEntry::file(M3U_FILE),
        DirEntry::dir("tracks"),
        DirEntry::dir("tags"),
    ]
}

/// `/channels/{slug}/tracks`: `tracks.json`, then one `.txt` per track in
/// display order. Collided stems are listed as-is.
pub fn tracks_entries(tracks: &[Track]) -> Vec<DirEntry> {
    let mut entries = vec![DirEntry::file(TRACKS_JSON_FILE)];
    entries.extend(
        reversed(tracks).map(|track| DirEntry::file(format!("{}.txt", track_stem(track)))),
    );
    entries
}

/// `/channels/{slug}/tags`: the sorted union of derived tag sets, with
/// `untagged` present iff some track has an empty set. Tag names are
/// sanitized so the virtual tree matches the on-disk tag tree.
pub fn tags_entries(tracks: &[Track]) -> Vec<DirEntry> {
    let mut names: Vec<String> = Vec::new();
    for track in tracks {
        for tag in tags_or_untagged(track) {
            let name = sanitize(&tag);
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names.sort();
    names.into_iter().map(DirEntry::dir).collect()
}

/// `/channels/{slug}/tags/{tag}`: display-order track files restricted to
/// tracks carrying the tag.
pub fn tag_entries(tracks: &[Track], tag: &str) -> Vec<DirEntry> {
    reversed(tracks)
        .filter(|track| track_has_tag(track, tag))
        .map(|track| DirEntry::file(format!("{}.txt", track_stem(track))))
        .collect()
}

/// `/favorites` and `/downloads`: config-listed slugs as directories.
pub fn list_entries(slugs: &[String]) -> Vec<DirEntry> {
    slugs.iter().map(DirEntry::dir).collect()
}

/// Listing/lookup stem for a track.
pub fn track_stem(track: &Track) -> String {
    title_stem(track.title.as_deref())
}

/// Membership test against the sanitized derived-or-`untagged` set.
pub fn track_has_tag(track: &Track, tag: &str) -> bool {
    tags_or_untagged(track)
        .iter()
        .any(|candidate| sanitize(candidate) == tag)
}
