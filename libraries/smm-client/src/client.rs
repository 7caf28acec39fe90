//! Main smm server client.

use crate::catalog::CatalogClient;
use crate::download::DownloadClient;
use crate::error::{ClientError, Result};
use crate::notes::NoteClient;
use crate::types::ServerConfig;
use reqwest::{Client, RequestBuilder, Response};
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

/// Client for an smm server.
///
/// The protocol is plain unauthenticated HTTP. Every request gets exactly
/// one automatic retry when the connection cannot be established; there is
/// no further backoff, batch-level retry belongs to the caller.
///
/// # Example
///
/// ```ignore
/// use smm_client::{ServerConfig, SmmClient, SongRequest};
///
/// let client = SmmClient::new(ServerConfig::from_address("192.168.1.10"))?;
/// let songs = client
///     .catalog()
///     .select_songs(&SongRequest::new("vocal", 20))
///     .await?;
/// println!("Server offered {} songs", songs.len());
/// ```
#[derive(Debug, Clone)]
pub struct SmmClient {
    http: Client,
    base_url: Url,
}

impl SmmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let base_url =
            Url::parse(&url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(url));
        }

        // No overall timeout: a long download runs to completion or failure.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(format!("smm-client/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InvalidUrl(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    /// Get the server base URL.
    pub fn url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Song selection and metadata listing.
    pub fn catalog(&self) -> CatalogClient<'_> {
        CatalogClient::new(&self.http, &self.base_url)
    }

    /// File downloads.
    pub fn download(&self) -> DownloadClient<'_> {
        DownloadClient::new(&self.http, &self.base_url)
    }

    /// Note uploads.
    pub fn notes(&self) -> NoteClient<'_> {
        NoteClient::new(&self.http, &self.base_url)
    }
}

/// Build the URL of a server resource given as a `/`-separated relative path.
///
/// Each segment is percent-encoded; empty segments (leading, trailing or
/// doubled slashes) are dropped.
pub(crate) fn resource_url(base: &Url, resource: &str) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(base.to_string()))?;
        segments
            .pop_if_empty()
            .extend(resource.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}

/// Send a request, retrying once if the connection could not be made.
///
/// `build` is called again for the retry since a sent request is consumed.
/// Only failures to establish the connection (refused, unreachable, connect
/// timeout) are retried. A connection that drops after it was established,
/// or a response that breaks off mid-body, is not retried here.
pub(crate) async fn send_with_retry<F>(resource: &str, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    retry_once(resource, || build().send(), is_connection_failure)
        .await
        .map_err(|e| ClientError::network(resource, e))
}

fn is_connection_failure(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Run `attempt`, and run it exactly once more if its error is `retryable`.
async fn retry_once<T, E, F, Fut>(
    resource: &str,
    mut attempt: F,
    retryable: impl Fn(&E) -> bool,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) if retryable(&e) => {
            warn!(resource = %resource, error = %e, "Connection failed, retrying once");
            attempt().await
        }
        Err(e) => Err(e),
    }
}

/// Turn a non-success response into a `Server` error.
pub(crate) async fn ensure_success(resource: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    debug!(resource = %resource, status = status.as_u16(), "Server rejected request");
    Err(ClientError::Server {
        resource: resource.to_string(),
        status: status.as_u16(),
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            message
        },
    })
}
