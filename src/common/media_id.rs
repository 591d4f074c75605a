//! External media id extraction.
//!
//! YouTube video ids are 11 characters of `[A-Za-z0-9_-]` following one of
//! a few well-known URL markers. The id disambiguates download filenames
//! and drives resume detection, so extraction must agree between runs.

const MARKERS: [&str; 4] = ["watch?v=", "youtu.be/", "embed/", "v/"];
const ID_LEN: usize = 11;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Extract an 11-character YouTube video id from a URL, if present.
pub fn youtube_id(url: &str) -> Option<String> {
    for marker in MARKERS {
        let mut search_from = 0;
        while let Some(pos) = url[search_from..].find(marker) {
            let start = search_from + pos + marker.len();
            let candidate: String = url[start..].chars().take(ID_LEN).collect();
            if candidate.chars().count() == ID_LEN && candidate.chars().all(is_id_char) {
                return Some(candidate);
            }
            search_from = start;
            if search_from >= url.len() {
                break;
            }
        }
    }
    None
}

/// Bracketed filename suffix for a track: the catalog id when present,
/// otherwise the extracted YouTube id.
pub fn bracket_id(track_id: Option<&str>, url: &str) -> Option<String> {
    match track_id {
        Some(id) if !id.is_empty() => Some(id.to_string()),
        _ => youtube_id(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_common_url_shapes() {
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_id("https://www.youtube.com/v/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn rejects_short_or_invalid_ids() {
        assert!(youtube_id("https://www.youtube.com/watch?v=short").is_none());
        assert!(youtube_id("https://soundcloud.com/artist/track").is_none());
        assert!(youtube_id("").is_none());
    }

    #[test]
    fn trailing_parameters_do_not_leak_into_the_id() {
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn bracket_id_prefers_the_catalog_id() {
        assert_eq!(
            bracket_id(Some("track-7"), "https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("track-7")
        );
        assert_eq!(
            bracket_id(None, "https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            bracket_id(Some(""), "https://example.com/a"),
            None
        );
    }
}
