//! Stephe's Music Manager client
//!
//! HTTP client for the download protocol of an smm server.
//!
//! # Features
//!
//! - **Song selection**: ask the server which songs of a category to fetch next
//! - **Metadata listing**: discover album art and liner notes of a song directory
//! - **Download**: stream a file to disk, verified against `Content-Length`
//! - **Notes**: upload a category's note buffer
//!
//! The server speaks plain HTTP on port 8080 without authentication.
//!
//! # Example
//!
//! ```ignore
//! use smm_client::{ServerConfig, SmmClient, SongRequest};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SmmClient::new(ServerConfig::from_address("192.168.1.10"))?;
//!
//!     let songs = client
//!         .catalog()
//!         .select_songs(&SongRequest::new("vocal", 5))
//!         .await?;
//!
//!     for song in &songs {
//!         let report = client.download().fetch_file(song, Path::new("/tmp/song.mp3")).await?;
//!         println!("{}: {} bytes", song, report.bytes_written);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod catalog;
mod client;
mod download;
mod error;
mod notes;
mod types;

// Re-export main types
pub use client::SmmClient;
pub use error::{ClientError, Result};
pub use types::{FetchReport, ServerConfig, SongRequest, DEFAULT_CONNECT_TIMEOUT, SMM_PORT};

// Re-export sub-clients for direct use if needed
pub use catalog::CatalogClient;
pub use download::DownloadClient;
pub use notes::NoteClient;
