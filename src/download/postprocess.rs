//! Per-track post-processing: ID3 tags, timestamp stamping, tag links.
//!
//! All three steps are best-effort; a failure is logged by the caller and
//! the track still counts as downloaded.

use crate::catalog::Track;
use crate::common::date::{parse_date, system_time_or_now};
use crate::common::sanitize::sanitize;
use crate::common::tags::tags_or_untagged;
use crate::common::{Error, Result};
use chrono::Datelike;
use filetime::FileTime;
use id3::frame::{Comment, ExtendedText};
use id3::{Tag, TagLike, Version};
use std::fs;
use std::path::Path;

/// Split a combined `Artist - Title` string. The first ` - ` segment is
/// the artist, the remainder the title; without a separator there is no
/// artist.
pub fn parse_artist_title(combined: &str) -> (Option<&str>, &str) {
    match combined.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            (Some(artist.trim()), title.trim())
        }
        _ => (None, combined.trim()),
    }
}

/// Write the ID3 tag set for a downloaded track. `index` is the track's
/// position in the job's iteration order.
pub fn write_id3(path: &Path, track: &Track, index: usize) -> Result<()> {
    let (artist, title) = parse_artist_title(track.title_or_untitled());
    let mut tag = Tag::new();
    tag.set_title(title);
    tag.set_artist(artist.unwrap_or("Unknown Artist"));
    tag.set_track((index + 1) as u32);
    if let Some(description) = track.description.as_deref().filter(|d| !d.is_empty()) {
        tag.add_frame(Comment {
            lang: "eng".to_string(),
            description: String::new(),
            text: description.to_string(),
        });
    }
    if let Some(created) = parse_date(track.created_at.as_deref()) {
        tag.set_year(created.year());
    }
    if let Some(discogs) = track.discogs_url.as_deref().filter(|d| !d.is_empty()) {
        tag.add_frame(ExtendedText {
            description: "DISCOGS_URL".to_string(),
            value: discogs.to_string(),
        });
    }
    tag.add_frame(ExtendedText {
        description: "SOURCE_URL".to_string(),
        value: track.url.clone(),
    });
    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| Error::PostProcessFailed(format!("id3 {}: {e}", path.display())))
}

/// Stamp the file with the record's times: `mtime = created_at`,
/// `atime = updated_at`, wall clock when a slot is absent or malformed.
pub fn stamp_times(path: &Path, track: &Track) -> Result<()> {
    let mtime = system_time_or_now(parse_date(track.created_at.as_deref()));
    let atime = system_time_or_now(parse_date(track.updated_at.as_deref()));
    filetime::set_file_times(
        path,
        FileTime::from_system_time(atime),
        FileTime::from_system_time(mtime),
    )
    .map_err(|e| Error::PostProcessFailed(format!("utimes {}: {e}", path.display())))
}

/// Cross-link the downloaded file into `tags/{tag}/` as relative symlinks.
/// Pre-existing links with the same name are replaced.
pub fn link_tags(channel_dir: &Path, filename: &str, track: &Track) -> Result<()> {
    for tag in tags_or_untagged(track) {
        let tag_dir = channel_dir.join("tags").join(sanitize(&tag));
        fs::create_dir_all(&tag_dir)
            .map_err(|e| Error::PostProcessFailed(format!("{}: {e}", tag_dir.display())))?;
        let link = tag_dir.join(filename);
        match fs::remove_file(&link) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::PostProcessFailed(format!("{}: {e}", link.display())));
            }
        }
        let target = Path::new("../../tracks").join(filename);
        std::os::unix::fs::symlink(&target, &link)
            .map_err(|e| Error::PostProcessFailed(format!("{}: {e}", link.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn track() -> Track {
        Track {
            id: Some("t1".into()),
            title: Some("Some Artist - Some Song".into()),
            url: "https://youtu.be/dQw4w9WgXcQ".into(),
            description: Some("warm #dub".into()),
            discogs_url: Some("https://www.discogs.com/release/99".into()),
            created_at: Some("2019-08-04T10:00:00Z".into()),
            updated_at: Some("2021-02-03T09:00:00Z".into()),
            tags: None,
        }
    }

    #[test]
    fn artist_title_heuristic() {
        assert_eq!(
            parse_artist_title("Orbital - Halcyon"),
            (Some("Orbital"), "Halcyon")
        );
        assert_eq!(
            parse_artist_title("Aphex Twin - Xtal - Live"),
            (Some("Aphex Twin"), "Xtal - Live")
        );
        assert_eq!(parse_artist_title("Standalone"), (None, "Standalone"));
        assert_eq!(parse_artist_title(" - odd"), (None, "- odd"));
    }

    #[test]
    fn id3_tags_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("some-artist-some-song [t1].mp3");
        fs::write(&path, b"").unwrap();

        write_id3(&path, &track(), 2).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Some Song"));
        assert_eq!(tag.artist(), Some("Some Artist"));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.year(), Some(2019));
        let texts: Vec<&ExtendedText> = tag.extended_texts().collect();
        assert!(texts
            .iter()
            .any(|t| t.description == "SOURCE_URL" && t.value == "https://youtu.be/dQw4w9WgXcQ"));
        assert!(texts
            .iter()
            .any(|t| t.description == "DISCOGS_URL"));
        assert!(tag.comments().any(|c| c.lang == "eng" && c.text == "warm #dub"));
    }

    #[test]
    fn stamping_sets_record_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.mp3");
        fs::write(&path, b"audio").unwrap();

        stamp_times(&path, &track()).unwrap();

        let meta = fs::metadata(&path).unwrap();
        let mtime = meta.modified().unwrap();
        let created = UNIX_EPOCH + Duration::from_secs(1564912800);
        assert_eq!(mtime, created);
    }

    #[test]
    fn stamping_a_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = stamp_times(&dir.path().join("gone.mp3"), &track()).unwrap_err();
        assert!(matches!(err, Error::PostProcessFailed(_)));
    }

    #[test]
    fn tag_links_are_relative_and_replaceable() {
        let dir = tempfile::tempdir().unwrap();
        let channel_dir = dir.path().join("oskar");
        fs::create_dir_all(channel_dir.join("tracks")).unwrap();
        let filename = "some-artist-some-song [t1].mp3";
        fs::write(channel_dir.join("tracks").join(filename), b"audio").unwrap();

        link_tags(&channel_dir, filename, &track()).unwrap();
        // Re-linking replaces the existing symlink.
        link_tags(&channel_dir, filename, &track()).unwrap();

        let link = channel_dir.join("tags").join("dub").join(filename);
        let target = fs::read_link(&link).unwrap();
        assert_eq!(target, Path::new("../../tracks").join(filename));
        assert!(fs::metadata(&link).unwrap().is_file());
    }

    #[test]
    fn untagged_tracks_link_under_untagged() {
        let dir = tempfile::tempdir().unwrap();
        let channel_dir = dir.path().join("oskar");
        fs::create_dir_all(channel_dir.join("tracks")).unwrap();
        fs::write(channel_dir.join("tracks").join("plain.mp3"), b"x").unwrap();

        let plain = Track {
            url: "https://example.com".into(),
            ..Track::default()
        };
        link_tags(&channel_dir, "plain.mp3", &plain).unwrap();
        assert!(channel_dir.join("tags").join("untagged").join("plain.mp3").exists());
    }
}
