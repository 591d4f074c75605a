//! Supabase REST client for the Radio4000 catalog.

use super::{Catalog, Channel, Track};
use crate::common::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_COLUMNS: &str = "id,slug,name,description,image,url,created_at,updated_at";
const TRACK_COLUMNS: &str = "id,title,url,description,discogs_url,created_at,updated_at,tags";

pub struct SupabaseCatalog {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseCatalog {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Base URL of the backing service, used to resolve storage-relative
    /// image keys.
    pub fn storage_base(&self) -> &str {
        &self.base_url
    }

    /// One REST read. Query values go through reqwest's serializer, so
    /// slugs with reserved characters cannot corrupt the request.
    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        tracing::debug!(%url, "catalog request");
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::Catalog(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Catalog(format!("{status}: {}", body.trim())));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Catalog(format!("bad response body: {e}")))
    }
}

#[async_trait]
impl Catalog for SupabaseCatalog {
    async fn channels(&self) -> Result<Vec<Channel>> {
        self.get_rows(
            "channels",
            &[("select", CHANNEL_COLUMNS), ("order", "slug.asc")],
        )
        .await
    }

    async fn channel(&self, slug: &str) -> Result<Option<Channel>> {
        let slug_filter = format!("eq.{slug}");
        let rows: Vec<Channel> = self
            .get_rows(
                "channels",
                &[
                    ("select", CHANNEL_COLUMNS),
                    ("slug", slug_filter.as_str()),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn tracks(&self, channel_slug: &str) -> Result<Vec<Track>> {
        // The channel_tracks view joins tracks to their channel slug; the
        // catalog contract is newest first.
        let slug_filter = format!("eq.{channel_slug}");
        self.get_rows(
            "channel_tracks",
            &[
                ("select", TRACK_COLUMNS),
                ("slug", slug_filter.as_str()),
                ("order", "created_at.desc"),
            ],
        )
        .await
    }
}
