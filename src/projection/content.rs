//! Content producers for the synthetic files.
//!
//! Every producer is a pure function of catalog records; the attribute
//! producer reports `stat.size` as the byte length of the same output, so
//! the two always agree.

use crate::catalog::{Channel, Track};
use crate::common::date::{format_date, format_datetime, parse_date};
use crate::common::tags::derive_tags;
use crate::common::{Error, Result};
use bytes::Bytes;

/// Static navigation help at `/HELP.txt`.
pub fn help_text() -> Bytes {
    Bytes::from_static(
        b"radio4000 filesystem\n\
          ====================\n\
          \n\
          Browse channels under /channels. Each channel directory contains:\n\
          \n\
          \x20 ABOUT.txt     description and stats\n\
          \x20 image.url     cover image location\n\
          \x20 tracks.m3u    playlist for media players\n\
          \x20 tracks/       one text file per track, plus tracks.json\n\
          \x20 tags/         tracks grouped by tag\n\
          \n\
          /favorites and /downloads mirror /channels for the slugs listed\n\
          in favorites.txt and downloads.txt.\n\
          \n\
          To download a channel's audio, write its slug to the control\n\
          file:\n\
          \n\
          \x20 echo some-channel > downloads/enqueue\n\
          \n\
          Settings live in ~/.config/radio4000/settings.json.\n",
    )
}

/// `ABOUT.txt` for a channel.
pub fn about_text(channel: &Channel, track_count: usize) -> Bytes {
    let name = match channel.name.as_deref() {
        Some(n) if !n.is_empty() => n,
        _ => channel.slug.as_str(),
    };
    let mut out = String::new();
    out.push_str(name);
    out.push('\n');
    out.push_str(&"=".repeat(name.chars().count()));
    out.push_str("\n\n");
    match channel.description.as_deref() {
        Some(d) if !d.is_empty() => out.push_str(d),
        _ => out.push_str("No description available."),
    }
    out.push_str("\n\n");
    out.push_str(&format!("Tracks: {track_count}\n"));
    match parse_date(channel.created_at.as_deref()) {
        Some(created) => out.push_str(&format!("Created: {}\n", format_date(created))),
        None => out.push_str("Created: unknown\n"),
    }
    if let Some(url) = channel.url.as_deref().filter(|u| !u.is_empty()) {
        out.push_str(&format!("\nWebsite: {url}\n"));
    }
    out.push_str(
        "\nQuick access:\n\
         \x20 tracks/       track listing\n\
         \x20 tracks.m3u    playlist for media players\n\
         \x20 tags/         tracks grouped by tag\n",
    );
    Bytes::from(out)
}

/// `image.url`: the image URL, or the public storage object URL for a
/// storage-relative key, or nothing.
pub fn image_url(channel: &Channel, storage_base: &str) -> Bytes {
    match channel.image.as_deref() {
        Some(image) if image.starts_with("http") => Bytes::from(format!("{image}\n")),
        Some(image) if !image.is_empty() => {
            let base = storage_base.trim_end_matches('/');
            Bytes::from(format!(
                "{base}/storage/v1/object/public/channels/{image}\n"
            ))
        }
        _ => Bytes::new(),
    }
}

/// `tracks.m3u`: extended M3U over tracks in catalog order.
pub fn tracks_m3u(tracks: &[Track]) -> Bytes {
    let mut out = String::from("#EXTM3U\n");
    for track in tracks {
        out.push_str(&format!("#EXTINF:-1,{}\n", track.title_or_untitled()));
        out.push_str(&track.url);
        out.push('\n');
    }
    Bytes::from(out)
}

/// `tracks.json`: the reversed-order track array, 2-space indented.
pub fn tracks_json(tracks_oldest_first: &[&Track]) -> Result<Bytes> {
    let json = serde_json::to_string_pretty(tracks_oldest_first)
        .map_err(|e| Error::Internal(format!("tracks.json: {e}")))?;
    Ok(Bytes::from(json))
}

/// The per-track text file, used under `tracks/` and the tag directories.
pub fn track_text(track: &Track) -> Bytes {
    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", track.title_or_untitled()));
    out.push_str(&format!("URL: {}\n", track.url));

    if let Some(description) = track.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str("\nDescription:\n");
        out.push_str(description);
        out.push('\n');
    }

    if let Some(discogs) = track.discogs_url.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("\nDiscogs: {discogs}\n"));
    }

    let added = parse_date(track.created_at.as_deref());
    let updated = parse_date(track.updated_at.as_deref());
    if added.is_some() || updated.is_some() {
        out.push('\n');
    }
    if let Some(added) = added {
        out.push_str(&format!("Added: {}\n", format_datetime(added)));
    }
    if let Some(updated) = updated {
        out.push_str(&format!("Updated: {}\n", format_datetime(updated)));
    }

    let tags = derive_tags(track);
    if !tags.is_empty() {
        out.push_str("\nTags:");
        for tag in &tags {
            out.push_str(&format!(" #{tag}"));
        }
        out.push('\n');
    }
    Bytes::from(out)
}
