//! The application root: one value owning the catalog handle, the
//! resolved configuration, the projection, and the download state, passed
//! explicitly to the FUSE layer and the worker.

use crate::catalog::Catalog;
use crate::common::Result;
use crate::config::Config;
use crate::download::{queue, DownloadState};
use crate::projection::Projection;
use std::sync::Arc;

pub struct App {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub projection: Projection,
    pub downloads: Arc<DownloadState>,
}

impl App {
    pub fn new(config: Config, catalog: Arc<dyn Catalog>, storage_base: &str) -> Arc<Self> {
        let lists = Arc::new(config.clone());
        let projection = Projection::new(catalog.clone(), lists, storage_base);
        Arc::new(Self {
            config,
            catalog,
            projection,
            downloads: Arc::new(DownloadState::new()),
        })
    }

    /// Enqueue a channel slug for download. Idempotent while queued.
    pub fn enqueue(&self, slug: &str) {
        if self.downloads.enqueue(slug) {
            tracing::info!(slug = %slug, "queued for download");
        } else {
            tracing::debug!(slug = %slug, "not queued (duplicate or shutting down)");
        }
    }

    /// Enqueue every slug in the downloads list, as `mount` does at
    /// startup.
    pub fn enqueue_download_list(&self) -> Result<()> {
        for slug in self.config.downloads()? {
            self.enqueue(&slug);
        }
        Ok(())
    }

    /// Cooperative shutdown of the download pipeline.
    pub async fn stop_downloads(&self) {
        queue::stop(&self.downloads).await;
    }
}
