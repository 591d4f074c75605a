//! The read-only filesystem projection.
//!
//! [`Projection`] answers the three questions the FUSE layer asks — stat,
//! list, read — for any virtual path, against the catalog snapshot it
//! observes at call time. It owns no state beyond its collaborator
//! handles; every materialization is a function of the current catalog
//! response.

pub mod attr;
pub mod content;
pub mod listing;
pub mod node;
pub mod resolver;

use crate::catalog::{Catalog, Channel, Track};
use crate::common::{Error, Result};
use crate::config::SlugLists;
use attr::{aggregate_times, channel_times, track_times, Stat};
use bytes::Bytes;
use listing::DirEntry;
use node::Node;
use std::sync::Arc;

pub struct Projection {
    catalog: Arc<dyn Catalog>,
    lists: Arc<dyn SlugLists>,
    storage_base: String,
}

impl Projection {
    pub fn new(catalog: Arc<dyn Catalog>, lists: Arc<dyn SlugLists>, storage_base: &str) -> Self {
        Self {
            catalog,
            lists,
            storage_base: storage_base.trim_end_matches('/').to_string(),
        }
    }

    /// True for the one path whose writes are meaningful.
    pub fn is_control(path: &str) -> bool {
        Node::parse(path) == Some(Node::Control)
    }

    fn not_found(path: &str) -> Error {
        Error::NotFound(path.to_string())
    }

    async fn channel(&self, slug: &str) -> Result<Channel> {
        self.catalog
            .channel(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("/channels/{slug}")))
    }

    async fn tracks(&self, slug: &str) -> Result<Vec<Track>> {
        self.catalog.tracks(slug).await
    }

    pub async fn getattr(&self, path: &str) -> Result<Stat> {
        let node = Node::parse(path).ok_or_else(|| Self::not_found(path))?;
        match node {
            Node::Root
            | Node::ChannelsDir
            | Node::FavoritesDir
            | Node::DownloadsDir
            | Node::AliasChannelDir { .. } => Ok(Stat::directory_now()),
            Node::Help => Ok(Stat::file(
                content::help_text().len() as u64,
                crate::common::date::stat_times(None, None),
            )),
            Node::Control => Ok(Stat::control()),
            Node::ChannelDir(slug) => {
                let channel = self.channel(&slug).await?;
                Ok(Stat::directory(channel_times(&channel)))
            }
            Node::About(slug) => {
                let channel = self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                let body = content::about_text(&channel, tracks.len());
                Ok(Stat::file(body.len() as u64, channel_times(&channel)))
            }
            Node::ImageUrl(slug) => {
                let channel = self.channel(&slug).await?;
                let body = content::image_url(&channel, &self.storage_base);
                Ok(Stat::file(body.len() as u64, channel_times(&channel)))
            }
            Node::TracksM3u(slug) => {
                let channel = self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                let body = content::tracks_m3u(&tracks);
                Ok(Stat::file(body.len() as u64, channel_times(&channel)))
            }
            Node::TracksJson(slug) => {
                let channel = self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                let display: Vec<&Track> = listing::reversed(&tracks).collect();
                let body = content::tracks_json(&display)?;
                Ok(Stat::file(body.len() as u64, channel_times(&channel)))
            }
            Node::TracksDir(slug) | Node::TagsDir(slug) => {
                let tracks = self.tracks(&slug).await?;
                Ok(Stat::directory(aggregate_times(&tracks)))
            }
            Node::TagDir { channel, tag } => {
                let tracks = self.tracks(&channel).await?;
                let matching: Vec<&Track> = tracks
                    .iter()
                    .filter(|t| listing::track_has_tag(t, &tag))
                    .collect();
                if matching.is_empty() {
                    return Err(Self::not_found(path));
                }
                Ok(Stat::directory(aggregate_times(matching)))
            }
            Node::TrackText { channel, stem } => {
                let tracks = self.tracks(&channel).await?;
                let track = resolver::resolve(&tracks, &stem)
                    .ok_or_else(|| Self::not_found(path))?;
                let body = content::track_text(track);
                Ok(Stat::file(body.len() as u64, track_times(track)))
            }
            Node::TagTrackText { channel, tag, stem } => {
                let tracks = self.tracks(&channel).await?;
                let track = resolver::resolve_in_tag(&tracks, &tag, &stem)
                    .ok_or_else(|| Self::not_found(path))?;
                let body = content::track_text(track);
                Ok(Stat::file(body.len() as u64, track_times(track)))
            }
        }
    }

    pub async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let node = Node::parse(path).ok_or_else(|| Self::not_found(path))?;
        match node {
            Node::Root => Ok(listing::root_entries()),
            Node::ChannelsDir => {
                let channels = self.catalog.channels().await?;
                Ok(listing::channels_entries(&channels))
            }
            Node::ChannelDir(slug) | Node::AliasChannelDir { slug, .. } => {
                // Channel must exist before we synthesize its fixed entries.
                self.channel(&slug).await?;
                Ok(listing::channel_entries())
            }
            Node::TracksDir(slug) => {
                let tracks = self.tracks(&slug).await?;
                Ok(listing::tracks_entries(&tracks))
            }
            Node::TagsDir(slug) => {
                let tracks = self.tracks(&slug).await?;
                Ok(listing::tags_entries(&tracks))
            }
            Node::TagDir { channel, tag } => {
                let tracks = self.tracks(&channel).await?;
                let entries = listing::tag_entries(&tracks, &tag);
                if entries.is_empty() {
                    return Err(Self::not_found(path));
                }
                Ok(entries)
            }
            Node::FavoritesDir => Ok(listing::list_entries(&self.lists.favorites()?)),
            Node::DownloadsDir => Ok(listing::list_entries(&self.lists.downloads()?)),
            _ => Err(Self::not_found(path)),
        }
    }

    pub async fn read(&self, path: &str) -> Result<Bytes> {
        let node = Node::parse(path).ok_or_else(|| Self::not_found(path))?;
        match node {
            Node::Help => Ok(content::help_text()),
            Node::Control => Ok(Bytes::new()),
            Node::About(slug) => {
                let channel = self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                Ok(content::about_text(&channel, tracks.len()))
            }
            Node::ImageUrl(slug) => {
                let channel = self.channel(&slug).await?;
                Ok(content::image_url(&channel, &self.storage_base))
            }
            Node::TracksM3u(slug) => {
                self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                Ok(content::tracks_m3u(&tracks))
            }
            Node::TracksJson(slug) => {
                self.channel(&slug).await?;
                let tracks = self.tracks(&slug).await?;
                let display: Vec<&Track> = listing::reversed(&tracks).collect();
                content::tracks_json(&display)
            }
            Node::TrackText { channel, stem } => {
                let tracks = self.tracks(&channel).await?;
                let track = resolver::resolve(&tracks, &stem)
                    .ok_or_else(|| Self::not_found(path))?;
                Ok(content::track_text(track))
            }
            Node::TagTrackText { channel, tag, stem } => {
                let tracks = self.tracks(&channel).await?;
                let track = resolver::resolve_in_tag(&tracks, &tag, &stem)
                    .ok_or_else(|| Self::not_found(path))?;
                Ok(content::track_text(track))
            }
            _ => Err(Self::not_found(path)),
        }
    }
}
