//! Types for smm server requests and responses.

use std::time::Duration;

/// Port the smm server always listens on.
pub const SMM_PORT: u16 = 8080;

/// Default connect timeout; long enough that callers never retry on their own.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Configuration for connecting to an smm server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "http://192.168.1.10:8080")
    pub url: String,
    /// Connect timeout for every request
    pub connect_timeout: Duration,
}

impl ServerConfig {
    /// Create a config from a full base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a config from a bare server address; the port is fixed.
    pub fn from_address(address: &str) -> Self {
        Self::new(format!("http://{}:{}", address.trim(), SMM_PORT))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Parameters of a song selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    pub category: String,
    pub count: u32,
    /// Fixed server-side random seed; `None` lets the server randomize.
    pub seed: Option<u32>,
}

impl SongRequest {
    pub fn new(category: impl Into<String>, count: u32) -> Self {
        Self {
            category: category.into(),
            count,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }
}

/// Outcome of streaming one resource to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Bytes written to the destination file
    pub bytes_written: u64,
    /// Length declared by the server's `Content-Length` header
    pub expected: u64,
}

impl FetchReport {
    /// True when the file on disk has exactly the declared length.
    pub fn is_complete(&self) -> bool {
        self.bytes_written == self.expected
    }
}

/// Split a `\r\n`-delimited listing body into paths.
///
/// An empty body is an empty listing; blank lines (including the one after
/// a trailing terminator) are dropped.
pub(crate) fn parse_listing(body: &str) -> Vec<String> {
    body.lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_address_uses_fixed_port() {
        let config = ServerConfig::from_address("192.168.1.10");
        assert_eq!(config.url, "http://192.168.1.10:8080");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_parse_listing() {
        assert!(parse_listing("").is_empty());
        assert_eq!(
            parse_listing("a/1.mp3\r\nb/2.mp3\r\n"),
            vec!["a/1.mp3".to_string(), "b/2.mp3".to_string()]
        );
        assert_eq!(parse_listing("only.mp3"), vec!["only.mp3".to_string()]);
    }

    #[test]
    fn test_fetch_report_completeness() {
        let full = FetchReport {
            bytes_written: 100,
            expected: 100,
        };
        let short = FetchReport {
            bytes_written: 90,
            expected: 100,
        };
        assert!(full.is_complete());
        assert!(!short.is_complete());
    }
}
