//! Read-only HTTP and HTTPS driver.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use url::Url;

use forager_common::{Error, ResponseBody, Result};

use crate::driver::{ByteStream, Driver, ReadOptions};

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("Forager/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client without touching the network.
pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into [`Error::Response`].
///
/// The body is decoded as JSON when the server says it is JSON, and kept as
/// text otherwise.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("Failed to read error body: {}", e)))?;

    let body = if is_json {
        serde_json::from_str(&text)
            .map(ResponseBody::Json)
            .unwrap_or(ResponseBody::Text(text))
    } else {
        ResponseBody::Text(text)
    };

    Err(Error::Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

/// Convert a response body into a [`ByteStream`].
pub(crate) fn body_stream(response: Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Network(format!("Stream read error: {}", e)))),
    )
}

/// HTTP(S) driver.
///
/// The protocol-relative path is the URL without its scheme, so
/// `https://example.com/a.json` reaches this driver as `example.com/a.json`.
pub struct HttpDriver {
    scheme: String,
    http: Client,
}

impl HttpDriver {
    /// Create a driver for `scheme` ("http" or "https").
    pub fn new(scheme: impl Into<String>) -> Result<Self> {
        Ok(Self {
            scheme: scheme.into(),
            http: build_client()?,
        })
    }

    /// Rebuild the absolute URL for a protocol-relative path.
    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}://{}", self.scheme, path);
        Url::parse(&raw).map_err(|e| Error::InvalidInput(format!("Invalid URL {}: {}", raw, e)))
    }

    /// Issue a GET, adding a `Range` header when asked to.
    async fn get(&self, path: &str, options: ReadOptions) -> Result<Response> {
        let mut request = self.http.get(self.url(path)?);
        if let Some(range) = options.range {
            request = request.header(header::RANGE, range.to_header_value()?);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Request failed: {}", e)))?;

        ensure_success(response).await
    }
}

#[async_trait]
impl Driver for HttpDriver {
    fn protocol(&self) -> &str {
        &self.scheme
    }

    async fn read(&self, path: &str, options: ReadOptions) -> Result<Vec<u8>> {
        let response = self.get(path, options).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read response: {}", e)))
    }

    async fn create_read_stream(&self, path: &str, options: ReadOptions) -> Result<ByteStream> {
        let response = self.get(path, options).await?;
        Ok(body_stream(response))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Canned response served by [`serve`].
    pub(crate) struct Canned {
        pub status: &'static str,
        pub content_type: &'static str,
        pub body: &'static [u8],
    }

    /// Serve `canned` to every connection, recording each raw request head.
    pub(crate) async fn serve(canned: Canned) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&head).to_string());

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    canned.status,
                    canned.content_type,
                    canned.body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(canned.body).await;
                let _ = socket.shutdown().await;
            }
        });

        (addr, requests)
    }

    #[tokio::test]
    async fn test_http_read() {
        let (addr, _) = serve(Canned {
            status: "200 OK",
            content_type: "text/plain",
            body: b"asdf",
        })
        .await;

        let driver = HttpDriver::new("http").unwrap();
        let data = driver
            .read(&format!("{}/key.txt", addr), ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(data, b"asdf");
    }

    #[tokio::test]
    async fn test_http_read_sends_range_header() {
        let (addr, requests) = serve(Canned {
            status: "206 Partial Content",
            content_type: "application/octet-stream",
            body: b"bcde",
        })
        .await;

        let driver = HttpDriver::new("http").unwrap();
        let data = driver
            .read(&format!("{}/data.bin", addr), ReadOptions::range(1..5))
            .await
            .unwrap();
        assert_eq!(data, b"bcde");

        let head = requests.lock().unwrap()[0].to_ascii_lowercase();
        assert!(head.contains("range: bytes=1-4"), "request was {}", head);
    }

    #[tokio::test]
    async fn test_http_rejects_empty_range_before_sending() {
        let driver = HttpDriver::new("http").unwrap();
        let result = driver
            .read("127.0.0.1:9/none", ReadOptions::range(3..3))
            .await;
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[tokio::test]
    async fn test_http_error_with_json_body() {
        let (addr, _) = serve(Canned {
            status: "404 Not Found",
            content_type: "application/json",
            body: br#"{"message":"missing"}"#,
        })
        .await;

        let driver = HttpDriver::new("http").unwrap();
        let err = driver
            .read(&format!("{}/missing", addr), ReadOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::Response { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, ResponseBody::Json(serde_json::json!({ "message": "missing" })));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_with_text_body() {
        let (addr, _) = serve(Canned {
            status: "500 Internal Server Error",
            content_type: "text/plain",
            body: b"boom",
        })
        .await;

        let driver = HttpDriver::new("http").unwrap();
        let err = driver
            .read(&format!("{}/x", addr), ReadOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::Response { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, ResponseBody::Text("boom".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_stream() {
        let (addr, _) = serve(Canned {
            status: "200 OK",
            content_type: "text/plain",
            body: b"streamed",
        })
        .await;

        let driver = HttpDriver::new("http").unwrap();
        let stream = driver
            .create_read_stream(&format!("{}/s", addr), ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(util::drain(stream).await.unwrap(), b"streamed");
    }

    #[tokio::test]
    async fn test_http_unsupported_operations() {
        let driver = HttpDriver::new("https").unwrap();
        let err = driver.write("example.com/x", vec![1]).await.unwrap_err();
        assert_eq!(err.to_string(), "https: write not supported");
        let err = driver.list("example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "https: list not supported");
    }
}
