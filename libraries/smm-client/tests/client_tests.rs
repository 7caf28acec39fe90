//! Tests for the smm client library.
//!
//! These tests use mock servers to verify client behavior without
//! requiring a real smm server.

use smm_client::{ClientError, ServerConfig, SmmClient, SongRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> SmmClient {
    SmmClient::new(ServerConfig::new(server.uri())).unwrap()
}

// =============================================================================
// Song Selection Tests
// =============================================================================

mod song_selection {
    use super::*;

    #[tokio::test]
    async fn test_select_songs_with_seed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/download"))
            .and(query_param("category", "vocal"))
            .and(query_param("count", "3"))
            .and(query_param("seed", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "Artist A/Album/01 One.mp3\r\nArtist B/Album/02 Two.mp3\r\nArtist C/03 Three.mp3",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let songs = client
            .catalog()
            .select_songs(&SongRequest::new("vocal", 3).with_seed(Some(42)))
            .await
            .unwrap();

        assert_eq!(
            songs,
            vec![
                "Artist A/Album/01 One.mp3",
                "Artist B/Album/02 Two.mp3",
                "Artist C/03 Three.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_select_songs_without_seed_omits_parameter() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a/1.mp3\r\n"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let songs = client
            .catalog()
            .select_songs(&SongRequest::new("instrumental", 1))
            .await
            .unwrap();
        assert_eq!(songs, vec!["a/1.mp3"]);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let keys: Vec<String> = requests[0]
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        assert_eq!(keys, vec!["category", "count"]);
    }

    #[tokio::test]
    async fn test_empty_body_means_no_songs() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let songs = client
            .catalog()
            .select_songs(&SongRequest::new("vocal", 10))
            .await
            .unwrap();

        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_recoverable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database locked"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let err = client
            .catalog()
            .select_songs(&SongRequest::new("vocal", 10))
            .await
            .unwrap_err();

        match &err {
            ClientError::Server {
                status, message, ..
            } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "database locked");
            }
            e => panic!("Expected Server error, got: {:?}", e),
        }
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let config = ServerConfig::new("http://127.0.0.1:1")
            .with_connect_timeout(Duration::from_secs(2));
        let client = SmmClient::new(config).unwrap();

        let err = client
            .catalog()
            .select_songs(&SongRequest::new("vocal", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Network { .. }), "got {:?}", err);
        assert!(err.is_recoverable());
    }
}

// =============================================================================
// Metadata Listing Tests
// =============================================================================

mod meta_listing {
    use super::*;

    #[tokio::test]
    async fn test_meta_list_appends_meta_segment() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Artist/Album/meta"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Artist/Album/AlbumArt.jpg\r\nArtist/Album/liner_notes.pdf\r\n"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let files = client.catalog().meta_list("Artist/Album/").await.unwrap();

        assert_eq!(
            files,
            vec!["Artist/Album/AlbumArt.jpg", "Artist/Album/liner_notes.pdf"]
        );
    }

    #[tokio::test]
    async fn test_meta_list_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Artist/meta"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let files = client.catalog().meta_list("Artist").await.unwrap();

        assert!(files.is_empty());
    }
}

// =============================================================================
// Download Tests
// =============================================================================

mod download {
    use super::*;

    #[tokio::test]
    async fn test_fetch_file_writes_body() {
        let mock_server = MockServer::start().await;
        let content = vec![0xABu8; 4096];

        Mock::given(method("GET"))
            .and(path("/Artist/Album/01_Song.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("01_Song.mp3");

        let client = client_for(&mock_server).await;
        let report = client
            .download()
            .fetch_file("Artist/Album/01_Song.mp3", &dest)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.bytes_written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap(), content);
    }

    #[tokio::test]
    async fn test_fetch_file_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing.mp3");

        let client = client_for(&mock_server).await;
        let err = client
            .download()
            .fetch_file("missing.mp3", &dest)
            .await
            .unwrap_err();

        match err {
            ClientError::Server { status, .. } => assert_eq!(status, 404),
            e => panic!("Expected Server error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_file_cannot_create_destination() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .expect(0)
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("no_such_dir").join("song.mp3");

        let client = client_for(&mock_server).await;
        let err = client
            .download()
            .fetch_file("song.mp3", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Io(_)));
    }

    /// Serve `response` verbatim on every connection, counting connections.
    async fn raw_server(response: Vec<u8>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = response.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), connections)
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_partial_file() {
        let mut response =
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(&[7u8; 90]);
        let (url, connections) = raw_server(response).await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("song.mp3");

        let client = SmmClient::new(ServerConfig::new(url)).unwrap();
        let report = client
            .download()
            .fetch_file("a/song.mp3", &dest)
            .await
            .unwrap();

        assert_eq!(report.bytes_written, 90);
        assert_eq!(report.expected, 100);
        assert!(!report.is_complete());
        assert_eq!(std::fs::read(&dest).unwrap().len(), 90);
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}

// =============================================================================
// Note Upload Tests
// =============================================================================

mod notes {
    use super::*;

    #[tokio::test]
    async fn test_put_note_success() {
        let mock_server = MockServer::start().await;
        let text = "\"vocal/a/1.mp3\" too loud\r\n\"vocal/b/2.mp3\" great\r\n";

        Mock::given(method("PUT"))
            .and(path("/remote_cache/vocal.note"))
            .and(body_string(text))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        client.notes().put_note("vocal", text).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_note_requires_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/remote_cache/vocal.note"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let err = client.notes().put_note("vocal", "x\r\n").await.unwrap_err();

        match err {
            ClientError::Server { status, .. } => assert_eq!(status, 204),
            e => panic!("Expected Server error, got: {:?}", e),
        }
    }
}
