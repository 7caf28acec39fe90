//! File downloads with byte-count verification.

use crate::client::{ensure_success, resource_url, send_with_retry};
use crate::error::{ClientError, Result};
use crate::types::FetchReport;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::Client;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};
use url::Url;

/// Download client for an smm server.
pub struct DownloadClient<'a> {
    http: &'a Client,
    base_url: &'a Url,
}

impl<'a> DownloadClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a Url) -> Self {
        Self { http, base_url }
    }

    /// Fetch a server resource into `dest_path`.
    ///
    /// The destination file is created (truncated) before the request is
    /// sent. The server must declare a `Content-Length`; when the body turns
    /// out shorter or longer, the mismatch is logged and the partial file is
    /// kept: the call still succeeds and a later retry re-fetches it.
    ///
    /// # Arguments
    /// * `resource` - Server path of the file, e.g. `Artist/Album/01.mp3`
    /// * `dest_path` - Where to save the file; its directory must exist
    pub async fn fetch_file(&self, resource: &str, dest_path: &Path) -> Result<FetchReport> {
        let url = resource_url(self.base_url, resource)?;

        let mut file = File::create(dest_path).await.map_err(|e| {
            error!(dest = %dest_path.display(), error = %e, "Cannot create file");
            ClientError::Io(e)
        })?;

        debug!(url = %url, dest = %dest_path.display(), "Downloading file");

        let response = send_with_retry(resource, || self.http.get(url.clone())).await;
        let response = match response {
            Ok(response) => ensure_success(resource, response).await,
            Err(e) => Err(e),
        }
        .map_err(|e| {
            error!(resource = %resource, error = %e, "File request failed");
            e
        })?;

        let expected = declared_length(resource, response.headers()).map_err(|e| {
            error!(resource = %resource, error = %e, "Programmer error: bad Content-Length");
            e
        })?;

        write_verified(resource, response.bytes_stream(), &mut file, expected)
            .await
            .map_err(|e| {
                error!(resource = %resource, error = %e, "Download failed");
                e
            })
    }
}

/// Parse the declared body length from the response headers.
pub(crate) fn declared_length(resource: &str, headers: &HeaderMap) -> Result<u64> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| ClientError::protocol(resource, "missing Content-Length header"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            ClientError::protocol(
                resource,
                format!("non-numeric Content-Length header: {:?}", value),
            )
        })
}

/// Stream a body to `out` and compare the byte count with `expected`.
///
/// A short or long body is not an error; it is logged and reported. A body
/// that breaks off after the headers arrived (the connection closed before
/// `Content-Length` bytes came) counts as short. Other stream errors are
/// `Network` errors.
pub(crate) async fn write_verified<S, W>(
    resource: &str,
    mut stream: S,
    out: &mut W,
    expected: u64,
) -> Result<FetchReport>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            // The body ended early or broke off; keep what arrived
            Err(e) if e.is_body() || e.is_decode() => {
                warn!(resource = %resource, error = %e, "Body ended early");
                break;
            }
            Err(e) => return Err(ClientError::network(resource, e)),
        };
        out.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }

    out.flush().await?;

    let report = FetchReport {
        bytes_written,
        expected,
    };

    if report.is_complete() {
        debug!(resource = %resource, size = bytes_written, "File downloaded");
    } else {
        let mismatch = ClientError::DataIntegrity {
            resource: resource.to_string(),
            expected,
            actual: bytes_written,
        };
        error!(error = %mismatch, "Downloaded size does not match Content-Length");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use reqwest::header::HeaderValue;

    fn body(chunks: Vec<&'static [u8]>) -> impl Stream<Item = reqwest::Result<Bytes>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            declared_length("a.mp3", &headers),
            Err(ClientError::Protocol { .. })
        ));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("abc"));
        assert!(matches!(
            declared_length("a.mp3", &headers),
            Err(ClientError::Protocol { .. })
        ));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1234"));
        assert_eq!(declared_length("a.mp3", &headers).unwrap(), 1234);
    }

    #[tokio::test]
    async fn test_write_verified_complete() {
        let mut out = Vec::new();
        let report = write_verified("a.mp3", body(vec![b"hello ", b"world"]), &mut out, 11)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_short_body_is_kept_and_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("song.mp3");
        let mut file = File::create(&dest).await.unwrap();

        let chunk: &'static [u8] = &[7u8; 90];
        let report = write_verified("Artist/song.mp3", body(vec![chunk]), &mut file, 100)
            .await
            .unwrap();
        drop(file);

        assert_eq!(report.bytes_written, 90);
        assert_eq!(report.expected, 100);
        assert!(!report.is_complete());

        // Partial file stays on disk
        let on_disk = std::fs::read(&dest).unwrap();
        assert_eq!(on_disk.len(), 90);
    }
}
