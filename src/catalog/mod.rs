//! Catalog records and the remote catalog seam.
//!
//! The projection and the download pipeline both read the catalog through
//! the [`Catalog`] trait; the production implementation is the Supabase
//! REST client in [`client`], tests substitute an in-memory catalog.

pub mod client;

pub use client::SupabaseCatalog;

use crate::common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A curated track collection, identified by a URL-safe slug.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: Option<String>,
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Image URL, or a storage-relative object key.
    #[serde(default)]
    pub image: Option<String>,
    /// External website URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A single media entry belonging to one channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Upstream media URL (YouTube, SoundCloud, ...).
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub discogs_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl Track {
    /// Display title, with the fallback the projection and playlists use.
    pub fn title_or_untitled(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled",
        }
    }
}

/// Read access to the remote music catalog.
///
/// `tracks` returns records in catalog order, newest first; the projection
/// reverses them so position 0 is the oldest.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn channels(&self) -> Result<Vec<Channel>>;

    async fn channel(&self, slug: &str) -> Result<Option<Channel>>;

    async fn tracks(&self, channel_slug: &str) -> Result<Vec<Track>>;
}
