//! Stem-to-record resolution.

use super::listing::{track_has_tag, track_stem};
use crate::catalog::Track;

/// Resolve a listing stem back to its track: first match in display order
/// (position 0 is the oldest). Collided stems resolve to that first match.
pub fn resolve<'a>(tracks: &'a [Track], stem: &str) -> Option<&'a Track> {
    tracks.iter().rev().find(|track| track_stem(track) == stem)
}

/// Resolve within a tag directory: same first-match rule, restricted to
/// tracks carrying the tag.
pub fn resolve_in_tag<'a>(tracks: &'a [Track], tag: &str, stem: &str) -> Option<&'a Track> {
    tracks
        .iter()
        .rev()
        .filter(|track| track_has_tag(track, tag))
        .find(|track| track_stem(track) == stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: Option<&str>, description: Option<&str>) -> Track {
        Track {
            id: Some(id.to_string()),
            title: title.map(String::from),
            description: description.map(String::from),
            ..Track::default()
        }
    }

    #[test]
    fn resolves_by_sanitized_stem() {
        // Catalog order: newest first.
        let tracks = vec![track("new", Some("B Side"), None), track("old", Some("A Side"), None)];
        assert_eq!(
            resolve(&tracks, "a-side").unwrap().id.as_deref(),
            Some("old")
        );
        assert!(resolve(&tracks, "missing").is_none());
    }

    #[test]
    fn collisions_resolve_to_the_oldest_match() {
        let tracks = vec![
            track("new", Some("Same Title"), None),
            track("old", Some("Same  Title"), None),
        ];
        assert_eq!(
            resolve(&tracks, "same-title").unwrap().id.as_deref(),
            Some("old")
        );
    }

    #[test]
    fn untitled_tracks_resolve_under_the_fallback_stem() {
        let tracks = vec![track("only", None, None)];
        assert_eq!(
            resolve(&tracks, "untitled").unwrap().id.as_deref(),
            Some("only")
        );
    }

    #[test]
    fn tag_scoped_resolution_respects_membership() {
        let tracks = vec![
            track("tagged", Some("Song"), Some("#jazz")),
            track("plain", Some("Song"), None),
        ];
        // Display order puts "plain" first, but it is not under #jazz.
        assert_eq!(
            resolve_in_tag(&tracks, "jazz", "song").unwrap().id.as_deref(),
            Some("tagged")
        );
        assert_eq!(
            resolve_in_tag(&tracks, "untagged", "song")
                .unwrap()
                .id
                .as_deref(),
            Some("plain")
        );
        assert!(resolve_in_tag(&tracks, "rock", "song").is_none());
    }
}
