//! The per-channel download job.
//!
//! Fetches the channel's tracks, diffs them against the on-disk layout,
//! drives the downloader for whatever is missing, post-processes each
//! file, and emits the channel playlist. Failures are confined to the
//! track they hit; the job keeps going.

use super::postprocess;
use super::process::{self, Outcome, OutputScan};
use crate::app::App;
use crate::catalog::Track;
use crate::common::media_id::bracket_id;
use crate::common::sanitize::title_stem;
use crate::common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Filesystem-settle retry when verifying a fresh download.
const VERIFY_RETRY: Duration = Duration::from_millis(200);

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "opus", "m4a", "webm"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum TrackOutcome {
    Downloaded(PathBuf),
    Skipped(PathBuf),
    Cancelled,
}

/// Run the download job for one channel slug.
pub async fn run(app: &App, slug: &str) -> Result<JobReport> {
    let tracks = app.catalog.tracks(slug).await?;
    let mut report = JobReport::default();
    if tracks.is_empty() {
        tracing::info!(slug = %slug, "no tracks, nothing to download");
        return Ok(report);
    }

    let channel_dir = app.config.download_root.join(slug);
    let tracks_dir = channel_dir.join("tracks");
    fs::create_dir_all(&tracks_dir).await?;

    let mut existing = dir_names(&tracks_dir).await?;

    // Catalog order, newest first: dedup stays consistent with whatever a
    // previous run left on disk.
    for (index, track) in tracks.iter().enumerate() {
        if app.downloads.is_shutting_down() {
            tracing::info!(slug = %slug, "shutdown requested, abandoning job");
            break;
        }
        let stem = title_stem(track.title.as_deref());
        if is_present(&existing, track, &stem) {
            report.skipped += 1;
            continue;
        }
        match download_track(app, track, &stem, &tracks_dir).await {
            Ok(TrackOutcome::Downloaded(path)) => {
                report.downloaded += 1;
                if let Some(name) = file_name(&path) {
                    existing.push(name);
                }
                post_process(app, track, index, &channel_dir, &path);
            }
            Ok(TrackOutcome::Skipped(path)) => {
                report.skipped += 1;
                if let Some(name) = file_name(&path) {
                    if !existing.contains(&name) {
                        existing.push(name);
                    }
                }
                post_process(app, track, index, &channel_dir, &path);
            }
            Ok(TrackOutcome::Cancelled) => break,
            Err(e @ Error::DownloaderMissing(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    slug = %slug,
                    track = track.title_or_untitled(),
                    error = %e,
                    "track failed"
                );
                report.failed += 1;
            }
        }
    }

    write_playlist(&channel_dir, &tracks, &dir_names(&tracks_dir).await?).await?;

    if app.config.settings.features.rsync_enabled {
        if let Some(sync_dir) = app.config.settings.paths.sync_dir.clone() {
            run_rsync(&channel_dir, &sync_dir.join(slug)).await;
        }
    }

    Ok(report)
}

/// Downloader argument list for one track.
pub fn build_args(ytdlp: &crate::config::YtdlpSettings, template: &Path, url: &str) -> Vec<String> {
    let mut args = vec!["--format".to_string(), ytdlp.format.clone()];
    if ytdlp.extract_audio {
        args.push("--extract-audio".to_string());
        args.push("--audio-format".to_string());
        args.push(ytdlp.audio_format.clone());
        args.push("--audio-quality".to_string());
        args.push(ytdlp.audio_quality.clone());
    }
    args.push("--output".to_string());
    args.push(template.to_string_lossy().into_owned());
    args.push("--no-playlist".to_string());
    args.push("--newline".to_string());
    if ytdlp.add_metadata {
        args.push("--add-metadata".to_string());
    }
    if ytdlp.embed_thumbnail {
        args.push("--embed-thumbnail".to_string());
    }
    if ytdlp.write_thumbnail {
        args.push("--write-thumbnail".to_string());
    }
    if let Some(cookies) = &ytdlp.cookies_file {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    } else if let Some(browser) = &ytdlp.cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.clone());
    }
    args.push(url.to_string());
    args
}

/// Output template: `{stem} [{id}].%(ext)s`, bracket omitted when the
/// track has no usable id.
pub fn output_template(tracks_dir: &Path, stem: &str, track: &Track) -> PathBuf {
    match bracket_id(track.id.as_deref(), &track.url) {
        Some(id) => tracks_dir.join(format!("{stem} [{id}].%(ext)s")),
        None => tracks_dir.join(format!("{stem}.%(ext)s")),
    }
}

/// A track is already on disk when any existing filename starts with its
/// stem or carries its bracketed id.
pub fn is_present(existing: &[String], track: &Track, stem: &str) -> bool {
    let id_marker = track
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| format!("[{id}]"));
    let yt_marker = crate::common::media_id::youtube_id(&track.url).map(|id| format!("[{id}]"));
    existing.iter().any(|name| {
        name.starts_with(stem)
            || id_marker.as_deref().is_some_and(|m| name.contains(m))
            || yt_marker.as_deref().is_some_and(|m| name.contains(m))
    })
}

async fn download_track(
    app: &App,
    track: &Track,
    stem: &str,
    tracks_dir: &Path,
) -> Result<TrackOutcome> {
    let template = output_template(tracks_dir, stem, track);
    let args = build_args(&app.config.settings.ytdlp, &template, &track.url);
    let program = app.config.settings.downloader.command();
    tracing::debug!(track = track.title_or_untitled(), %program, "invoking downloader");

    match process::run_downloader(program, &args, &app.downloads).await? {
        Outcome::Completed(scan) => {
            let path = verify_download(&scan, tracks_dir, stem).await.ok_or_else(|| {
                Error::TrackFailed(format!("no file produced for {stem}"))
            })?;
            Ok(TrackOutcome::Downloaded(path))
        }
        Outcome::AlreadyDownloaded(scan) => {
            let candidate = scan
                .already_path
                .clone()
                .filter(|p| p.exists())
                .or_else(|| newest_match_sync(tracks_dir, stem));
            match candidate {
                Some(path) => Ok(TrackOutcome::Skipped(path)),
                None => Err(Error::TrackFailed(format!(
                    "already downloaded but no file matches {stem}"
                ))),
            }
        }
        Outcome::Cancelled => Ok(TrackOutcome::Cancelled),
    }
}

/// Verify the downloaded file exists, absorbing a filesystem-settle race
/// with one delayed retry. Post-extraction renames are absorbed by falling
/// back to the newest stem match.
async fn verify_download(scan: &OutputScan, tracks_dir: &Path, stem: &str) -> Option<PathBuf> {
    if let Some(destination) = &scan.destination {
        if destination.exists() {
            return Some(destination.clone());
        }
    }
    if let Some(path) = newest_match_sync(tracks_dir, stem) {
        return Some(path);
    }
    tokio::time::sleep(VERIFY_RETRY).await;
    if let Some(destination) = &scan.destination {
        if destination.exists() {
            return Some(destination.clone());
        }
    }
    newest_match_sync(tracks_dir, stem)
}

/// Most recently modified file in `dir` whose name starts with `stem`.
fn newest_match_sync(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(stem) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
        if best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            best = Some((modified, entry.path()));
        }
    }
    best.map(|(_, path)| path)
}

fn post_process(app: &App, track: &Track, index: usize, channel_dir: &Path, path: &Path) {
    if let Err(e) = postprocess::write_id3(path, track, index) {
        tracing::warn!(error = %e, "id3 write failed");
    }
    if let Err(e) = postprocess::stamp_times(path, track) {
        tracing::warn!(error = %e, "timestamp stamping failed");
    }
    if app.config.settings.features.organize_by_tags {
        if let Err(e) = postprocess::link_tags(channel_dir, &file_name(path).unwrap_or_default(), track) {
            tracing::warn!(error = %e, "tag linking failed");
        }
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn has_audio_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// `playlist.m3u`: extended M3U over the actual downloaded audio files,
/// one entry per track in catalog order.
pub fn playlist_content(tracks: &[Track], existing: &[String]) -> String {
    let audio: Vec<&String> = existing
        .iter()
        .filter(|name| has_audio_extension(name))
        .collect();
    let mut out = String::from("#EXTM3U\n");
    for track in tracks {
        let stem = title_stem(track.title.as_deref());
        if let Some(name) = audio.iter().find(|name| name.contains(&stem)) {
            out.push_str(&format!("#EXTINF:-1,{}\n", track.title_or_untitled()));
            out.push_str(name);
            out.push('\n');
        }
    }
    out
}

async fn write_playlist(channel_dir: &Path, tracks: &[Track], existing: &[String]) -> Result<()> {
    let playlist = playlist_content(tracks, existing);
    fs::write(channel_dir.join("playlist.m3u"), playlist).await?;
    Ok(())
}

async fn run_rsync(src: &Path, dst: &Path) {
    let src_arg = format!("{}/", src.display());
    let dst_arg = format!("{}/", dst.display());
    tracing::info!(src = %src_arg, dst = %dst_arg, "rsync sync");
    let result = tokio::process::Command::new("rsync")
        .args(["-avz", "--progress", "--delete", &src_arg, &dst_arg])
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(%status, "rsync exited nonzero"),
        Err(e) => tracing::warn!(error = %e, "rsync failed to start"),
    }
}
