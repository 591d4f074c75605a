//! The download queue: a process-wide FIFO of channel slugs with a single
//! worker task.
//!
//! Enqueue deduplicates and preserves the first position. The worker picks
//! the head, runs the job, pauses ~1 s to let the system settle, then picks
//! the next; shutdown raises a flag, drains the queue, and tears down any
//! in-flight subprocess.

use super::{job, process};
use crate::app::App;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const SETTLE_PAUSE: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct DownloadState {
    queue: Mutex<VecDeque<String>>,
    wake: Notify,
    shutting_down: AtomicBool,
    current_pid: Mutex<Option<u32>>,
}

impl DownloadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a slug. Returns false when the slug is already queued (its
    /// prior position is preserved) or shutdown has begun.
    pub fn enqueue(&self, slug: &str) -> bool {
        if slug.is_empty() || self.is_shutting_down() {
            return false;
        }
        let mut queue = self.queue.lock().unwrap();
        if queue.iter().any(|queued| queued == slug) {
            return false;
        }
        queue.push_back(slug.to_string());
        drop(queue);
        self.wake.notify_one();
        true
    }

    pub fn pop(&self) -> Option<String> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub(super) fn set_current_pid(&self, pid: Option<u32>) {
        *self.current_pid.lock().unwrap() = pid;
    }

    pub fn current_pid(&self) -> Option<u32> {
        *self.current_pid.lock().unwrap()
    }

    /// Raise the shutdown flag and drain the queue. Returns the slugs that
    /// were still pending.
    pub fn begin_shutdown(&self) -> Vec<String> {
        self.shutting_down.store(true, Ordering::SeqCst);
        let drained: Vec<String> = self.queue.lock().unwrap().drain(..).collect();
        self.wake.notify_one();
        drained
    }

    async fn wait_for_work(&self) {
        self.wake.notified().await;
    }
}

/// The single worker task. Spawned once at mount time; outlives individual
/// VFS callbacks and exits when shutdown is requested.
pub async fn run_worker(app: Arc<App>) {
    let state = app.downloads.clone();
    loop {
        if state.is_shutting_down() {
            break;
        }
        let Some(slug) = state.pop() else {
            state.wait_for_work().await;
            continue;
        };
        tracing::info!(slug = %slug, "starting download job");
        match job::run(&app, &slug).await {
            Ok(report) => tracing::info!(
                slug = %slug,
                downloaded = report.downloaded,
                skipped = report.skipped,
                failed = report.failed,
                "download job finished"
            ),
            Err(e) => tracing::error!(slug = %slug, error = %e, "download job failed"),
        }
        if !state.is_shutting_down() {
            tokio::time::sleep(SETTLE_PAUSE).await;
        }
    }
    tracing::debug!("download worker stopped");
}

/// Cooperative shutdown: drain the queue, tear down the in-flight child's
/// process group, and give it a moment to clean up.
pub async fn stop(state: &DownloadState) {
    let drained = state.begin_shutdown();
    if !drained.is_empty() {
        tracing::info!(pending = drained.len(), "cleared download queue");
    }
    if let Some(pid) = state.current_pid() {
        tracing::info!(pid, "terminating in-flight downloader");
        process::terminate_group(pid).await;
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
