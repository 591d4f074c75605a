//! Title-to-filename sanitization.
//!
//! Every track stem in the projection, the tag trees, and the download
//! layout comes from [`sanitize`]; listing entries and lookup keys must
//! agree, so the function is pure and total.

const FALLBACK: &str = "untitled";
const MAX_LEN: usize = 50;

fn is_forbidden(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '?' | '"' | '*' | '<' | '>' | '|')
}

/// Sanitize a track title (or tag) into a filesystem-safe stem.
///
/// Forbidden characters become hyphens, dots are dropped, runs of
/// whitespace-or-hyphen collapse to a single hyphen, the result is
/// trimmed, lowercased, and truncated to 50 code points. Empty input (and
/// input that sanitizes to nothing) yields `untitled`.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LEN));
    let mut pending_hyphen = false;
    for c in s.chars() {
        if c == '.' {
            continue;
        }
        let c = if is_forbidden(c) { '-' } else { c };
        if c == '-' || c.is_whitespace() {
            pending_hyphen = !out.is_empty();
            continue;
        }
        if pending_hyphen {
            out.push('-');
            pending_hyphen = false;
        }
        for lc in c.to_lowercase() {
            out.push(lc);
        }
    }
    let mut out: String = out.chars().take(MAX_LEN).collect();
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        FALLBACK.to_string()
    } else {
        out
    }
}

/// Stem for a track title that may be absent.
pub fn title_stem(title: Option<&str>) -> String {
    match title {
        Some(t) => sanitize(t),
        None => FALLBACK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_fall_back() {
        assert_eq!(sanitize(""), "untitled");
        assert_eq!(sanitize("   "), "untitled");
        assert_eq!(sanitize("..."), "untitled");
        assert_eq!(sanitize("---"), "untitled");
        assert_eq!(title_stem(None), "untitled");
    }

    #[test]
    fn forbidden_characters_become_hyphens() {
        assert_eq!(sanitize("a/b\\c:d"), "a-b-c-d");
        assert_eq!(sanitize("what? \"why\" *how*"), "what-why-how");
        assert_eq!(sanitize("<tag>|pipe"), "tag-pipe");
    }

    #[test]
    fn dots_are_removed_without_replacement() {
        assert_eq!(sanitize("feat. someone"), "feat-someone");
        assert_eq!(sanitize("v1.2.3"), "v123");
    }

    #[test]
    fn whitespace_and_hyphen_runs_collapse() {
        assert_eq!(sanitize("Artist - Song Title"), "artist-song-title");
        assert_eq!(sanitize("a  \t b"), "a-b");
        assert_eq!(sanitize("a -- b"), "a-b");
    }

    #[test]
    fn trims_and_lowercases() {
        assert_eq!(sanitize("  Hello World  "), "hello-world");
        assert_eq!(sanitize("-leading and trailing-"), "leading-and-trailing");
        assert_eq!(sanitize("Track!@#$%^&*()"), "track!@#$%^&-()");
    }

    #[test]
    fn non_ascii_letters_pass_through() {
        assert_eq!(sanitize("Tëst Tráck"), "tëst-tráck");
        assert_eq!(sanitize("Привет Мир"), "привет-мир");
        assert_eq!(sanitize("日本語のタイトル"), "日本語のタイトル");
    }

    #[test]
    fn truncates_to_fifty_code_points() {
        let long = "x".repeat(200);
        assert_eq!(sanitize(&long).chars().count(), 50);
        // Truncation must not leave a trailing hyphen.
        let mut tricky = "y".repeat(49);
        tricky.push_str("- tail");
        let out = sanitize(&tricky);
        assert!(!out.ends_with('-'));
        assert!(out.chars().count() <= 50);
    }

    #[test]
    fn idempotent_and_clean() {
        for input in [
            "Artist - Song Title",
            "  Mixed -- Runs .dots. ",
            "Tëst Tráck",
            "a/b\\c",
            "",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
            assert!(!once.starts_with('-'));
            assert!(!once.ends_with('-'));
            assert!(!once.contains("--"));
            assert!(!once.contains('.'));
            assert!(!once.chars().any(super::is_forbidden));
        }
    }
}
