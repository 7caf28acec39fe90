//! Note uploads.

use crate::client::{resource_url, send_with_retry};
use crate::error::{ClientError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

/// Note upload client for an smm server.
pub struct NoteClient<'a> {
    http: &'a Client,
    base_url: &'a Url,
}

impl<'a> NoteClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a Url) -> Self {
        Self { http, base_url }
    }

    /// Server resource that receives the notes of a category.
    pub fn note_resource(category: &str) -> String {
        format!("remote_cache/{}.note", category)
    }

    /// Upload the full text of a category's note buffer.
    ///
    /// `PUT /remote_cache/<category>.note`; only HTTP 200 counts as success.
    pub async fn put_note(&self, category: &str, text: &str) -> Result<()> {
        let resource = Self::note_resource(category);
        let url = resource_url(self.base_url, &resource)?;

        debug!(url = %url, bytes = text.len(), "Uploading notes");

        let response = send_with_retry(&resource, || {
            self.http
                .put(url.clone())
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text.to_string())
        })
        .await?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(category = %category, "Notes uploaded");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::Server {
                resource,
                status: status.as_u16(),
                message: if error_text.is_empty() {
                    status.canonical_reason().unwrap_or_default().to_string()
                } else {
                    error_text
                },
            })
        }
    }
}
