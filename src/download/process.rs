//! Downloader subprocess supervision.
//!
//! The downloader runs in its own process group so teardown reaches its
//! helpers (audio extraction and the like). Output is captured and scraped
//! for the `[download]` markers; the patterns live in [`OutputScan`] so a
//! `youtube-dl`-flavored downloader needs no changes elsewhere.

use super::queue::DownloadState;
use crate::common::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const TERM_WAIT: Duration = Duration::from_millis(500);

const DESTINATION_MARKER: &str = "[download] Destination: ";
const ALREADY_MARKER: &str = " has already been downloaded";

/// What the scraped downloader output said.
#[derive(Debug, Default, Clone)]
pub struct OutputScan {
    /// Path from a `[download] Destination:` line.
    pub destination: Option<PathBuf>,
    /// Path from a `[download] ... has already been downloaded` line, when
    /// the line carried one.
    pub already_path: Option<PathBuf>,
    /// Whether the already-downloaded condition was observed at all.
    pub already_downloaded: bool,
}

impl OutputScan {
    pub fn observe(&mut self, line: &str) {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(DESTINATION_MARKER) {
            let rest = rest.trim();
            if !rest.is_empty() {
                self.destination = Some(PathBuf::from(rest));
            }
        } else if let Some(rest) = line.strip_prefix("[download] ") {
            if let Some(idx) = rest.find(ALREADY_MARKER) {
                self.already_downloaded = true;
                let path = rest[..idx].trim();
                if !path.is_empty() {
                    self.already_path = Some(PathBuf::from(path));
                }
            }
        }
    }

    fn observe_all(&mut self, lines: &[String]) {
        for line in lines {
            self.observe(line);
        }
    }
}

/// How a downloader run ended, short of an error.
#[derive(Debug)]
pub enum Outcome {
    /// Exit 0, fresh download.
    Completed(OutputScan),
    /// The already-downloaded condition was observed.
    AlreadyDownloaded(OutputScan),
    /// Terminated by shutdown; resolves with no file.
    Cancelled,
}

async fn collect_lines<R>(reader: R) -> Vec<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push(line);
    }
    collected
}

/// Spawn the downloader and wait for it, scraping output. The child's pid
/// is published on `state` while it runs so shutdown can reach it.
pub async fn run_downloader(
    program: &str,
    args: &[String],
    state: &DownloadState,
) -> Result<Outcome> {
    if state.is_shutting_down() {
        return Ok(Outcome::Cancelled);
    }
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // New process group, so group signals reach downloader helpers.
    unsafe {
        command.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::DownloaderMissing(program.to_string())
        } else {
            Error::Io(e)
        }
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("downloader stdout not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Internal("downloader stderr not piped".to_string()))?;
    state.set_current_pid(child.id());
    let (stdout_lines, stderr_lines, status) = tokio::join!(
        collect_lines(stdout),
        collect_lines(stderr),
        child.wait(),
    );
    state.set_current_pid(None);
    let status = status?;

    let mut scan = OutputScan::default();
    scan.observe_all(&stdout_lines);
    scan.observe_all(&stderr_lines);

    if scan.already_downloaded {
        return Ok(Outcome::AlreadyDownloaded(scan));
    }
    if status.success() {
        return Ok(Outcome::Completed(scan));
    }
    if state.is_shutting_down() {
        return Ok(Outcome::Cancelled);
    }
    let stderr_text = stderr_lines.join("\n");
    let stdout_text = stdout_lines.join("\n");
    let message = if !stderr_text.trim().is_empty() {
        stderr_text.trim().to_string()
    } else if !stdout_text.trim().is_empty() {
        stdout_text.trim().to_string()
    } else {
        format!("downloader exited with {status}")
    };
    Err(Error::TrackFailed(message))
}

fn signal_group(pid: u32, signal: i32) {
    let group = -(pid as i32);
    let rc = unsafe { libc::kill(group, signal) };
    if rc != 0 {
        unsafe {
            libc::kill(pid as i32, signal);
        }
    }
}

fn alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// SIGTERM the process group, wait, escalate to SIGKILL if the leader is
/// still up. Falls back to signaling the leader when group delivery fails.
pub async fn terminate_group(pid: u32) {
    signal_group(pid, libc::SIGTERM);
    tokio::time::sleep(TERM_WAIT).await;
    if alive(pid) {
        signal_group(pid, libc::SIGKILL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_destination_lines() {
        let mut scan = OutputScan::default();
        scan.observe("[youtube] dQw4w9WgXcQ: Downloading webpage");
        scan.observe("[download] Destination: /music/oskar/tracks/song [t1].webm");
        assert_eq!(
            scan.destination.as_deref(),
            Some(std::path::Path::new("/music/oskar/tracks/song [t1].webm"))
        );
        assert!(!scan.already_downloaded);
    }

    #[test]
    fn scrapes_the_already_downloaded_condition() {
        let mut scan = OutputScan::default();
        scan.observe("[download] /music/oskar/tracks/song [t1].mp3 has already been downloaded");
        assert!(scan.already_downloaded);
        assert_eq!(
            scan.already_path.as_deref(),
            Some(std::path::Path::new("/music/oskar/tracks/song [t1].mp3"))
        );
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let mut scan = OutputScan::default();
        scan.observe("[ExtractAudio] Destination: /x/y.mp3");
        scan.observe("100% of 3.4MiB in 00:02");
        assert!(scan.destination.is_none());
        assert!(!scan.already_downloaded);
    }

    #[tokio::test]
    async fn successful_run_scrapes_stdout() {
        let state = DownloadState::new();
        let outcome = run_downloader(
            "sh",
            &[
                "-c".to_string(),
                "echo '[download] Destination: /tmp/out.webm'".to_string(),
            ],
            &state,
        )
        .await
        .unwrap();
        match outcome {
            Outcome::Completed(scan) => {
                assert_eq!(
                    scan.destination.as_deref(),
                    Some(std::path::Path::new("/tmp/out.webm"))
                );
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(state.current_pid(), None);
    }

    #[tokio::test]
    async fn nonzero_exit_with_marker_counts_as_already_downloaded() {
        let state = DownloadState::new();
        let outcome = run_downloader(
            "sh",
            &[
                "-c".to_string(),
                "echo '[download] /tmp/x.mp3 has already been downloaded'; exit 1".to_string(),
            ],
            &state,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, Outcome::AlreadyDownloaded(_)));
    }

    #[tokio::test]
    async fn failure_propagates_trimmed_stderr() {
        let state = DownloadState::new();
        let err = run_downloader(
            "sh",
            &[
                "-c".to_string(),
                "echo 'Unsupported URL' >&2; exit 1".to_string(),
            ],
            &state,
        )
        .await
        .unwrap_err();
        match err {
            Error::TrackFailed(message) => assert_eq!(message, "Unsupported URL"),
            other => panic!("expected TrackFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_distinct_error() {
        let state = DownloadState::new();
        let err = run_downloader("definitely-not-a-downloader-3720", &[], &state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DownloaderMissing(_)));
    }
}
