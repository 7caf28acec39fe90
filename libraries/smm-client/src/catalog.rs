//! Song selection and metadata listing.

use crate::client::{ensure_success, resource_url, send_with_retry};
use crate::error::{ClientError, Result};
use crate::types::{parse_listing, SongRequest};
use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

/// Catalog client for an smm server.
pub struct CatalogClient<'a> {
    http: &'a Client,
    base_url: &'a Url,
}

impl<'a> CatalogClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a Url) -> Self {
        Self { http, base_url }
    }

    /// Ask the server for the next songs of a category.
    ///
    /// `GET /download?category=C&count=N[&seed=S]`; the body lists song
    /// paths relative to the category root, one per `\r\n`-terminated line.
    pub async fn select_songs(&self, request: &SongRequest) -> Result<Vec<String>> {
        let mut url = resource_url(self.base_url, "download")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("category", &request.category)
                .append_pair("count", &request.count.to_string());
            if let Some(seed) = request.seed {
                query.append_pair("seed", &seed.to_string());
            }
        }

        debug!(url = %url, category = %request.category, "Selecting new songs");

        let songs = match self.get_listing("download", url).await {
            Ok(songs) => songs,
            Err(e) => {
                error!(category = %request.category, error = %e, "Song selection failed");
                return Err(e);
            }
        };

        info!(
            category = %request.category,
            count = songs.len(),
            "Server selected songs"
        );

        Ok(songs)
    }

    /// List the metadata files (album art, liner notes) of a song directory.
    ///
    /// `GET /<resource_path>/meta`; the body lists server resource paths.
    pub async fn meta_list(&self, resource_path: &str) -> Result<Vec<String>> {
        let mut url = resource_url(self.base_url, resource_path)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .push("meta");

        debug!(url = %url, "Listing metadata");

        self.get_listing(resource_path, url).await.map_err(|e| {
            error!(resource = %resource_path, error = %e, "Metadata listing failed");
            e
        })
    }

    async fn get_listing(&self, resource: &str, url: Url) -> Result<Vec<String>> {
        let response = send_with_retry(resource, || self.http.get(url.clone())).await?;
        let response = ensure_success(resource, response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::network(resource, e))?;

        Ok(parse_listing(&body))
    }
}
