//! Derived tag sets.
//!
//! A track's tags are the union of `#hashtags` scanned out of its
//! description and its explicit tag list, lowercased and deduplicated in
//! first-seen order. Tracks with an empty derived set live under the
//! synthetic `untagged` tag in the tag trees.

use crate::catalog::Track;

/// Synthetic tag for tracks with no derived tags.
pub const UNTAGGED: &str = "untagged";

fn is_hashtag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Extract `#[A-Za-z0-9_]+` hashtag stems from free text, lowercased, in
/// order of appearance.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '#' {
            continue;
        }
        let mut stem = String::new();
        while let Some(&(_, nc)) = chars.peek() {
            if is_hashtag_char(nc) {
                stem.push(nc.to_ascii_lowercase());
                chars.next();
            } else {
                break;
            }
        }
        if !stem.is_empty() {
            out.push(stem);
        }
    }
    out
}

/// Derived tag set for a track: description hashtags, then explicit tags,
/// lowercased, deduplicated, first-seen order. Empty when neither source
/// contributes.
pub fn derive_tags(track: &Track) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    };
    if let Some(desc) = track.description.as_deref() {
        for tag in extract_hashtags(desc) {
            push(tag);
        }
    }
    if let Some(explicit) = track.tags.as_ref() {
        for tag in explicit {
            push(tag.trim().to_lowercase());
        }
    }
    out
}

/// Derived tags with the `untagged` fallback applied, for tag-tree
/// membership tests.
pub fn tags_or_untagged(track: &Track) -> Vec<String> {
    let tags = derive_tags(track);
    if tags.is_empty() {
        vec![UNTAGGED.to_string()]
    } else {
        tags
    }
}
