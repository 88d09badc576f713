//! Dropbox API client.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use forager_common::{Error, Result};

use crate::http::{build_client, ensure_success};

/// Dropbox RPC endpoint base URL.
const API_BASE: &str = "https://api.dropboxapi.com/2";
/// Dropbox content endpoint base URL.
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";
/// Header carrying the JSON arguments of content endpoints.
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Entry of a folder listing, tagged by `.tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    Folder {
        name: String,
    },
    File {
        name: String,
        #[serde(default)]
        size: Option<u64>,
    },
    /// Deleted entries and any tag this client does not know.
    #[serde(other)]
    Other,
}

/// One page of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFolderPage {
    pub entries: Vec<Metadata>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

/// The subset of the Dropbox API the driver needs.
///
/// Paths are API paths: `""` is the root, everything else starts with `/`.
#[async_trait]
pub trait DropboxApi: Send + Sync {
    /// First page of a folder listing.
    async fn list_folder(&self, path: &str) -> Result<ListFolderPage>;

    /// Next page of a listing.
    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage>;

    /// Download a file, optionally restricted by a `Range` header value.
    async fn download(&self, path: &str, range: Option<String>) -> Result<Vec<u8>>;

    /// Upload a file, overwriting what is there.
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()>;
}

/// Dropbox HTTP client.
pub struct DropboxClient {
    http: Client,
    token: String,
}

impl DropboxClient {
    /// Create a client for an access token. Performs no requests.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            token: token.into(),
        })
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.http
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn rpc<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<ListFolderPage> {
        let response = self
            .post(format!("{}/{}", API_BASE, endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Dropbox {} failed: {}", endpoint, e)))?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("Dropbox {}: {}", endpoint, e)))
    }
}

/// Encode arguments for the `Dropbox-API-Arg` header.
///
/// Header values must be ASCII, so every non-ASCII character is written as a
/// JSON `\u` escape.
pub(crate) fn api_arg(value: &serde_json::Value) -> String {
    let json = value.to_string();
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];

    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }

    out
}

#[async_trait]
impl DropboxApi for DropboxClient {
    async fn list_folder(&self, path: &str) -> Result<ListFolderPage> {
        self.rpc("files/list_folder", &serde_json::json!({ "path": path }))
            .await
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage> {
        self.rpc(
            "files/list_folder/continue",
            &serde_json::json!({ "cursor": cursor }),
        )
        .await
    }

    async fn download(&self, path: &str, range: Option<String>) -> Result<Vec<u8>> {
        let mut request = self
            .post(format!("{}/files/download", CONTENT_BASE))
            .header(API_ARG_HEADER, api_arg(&serde_json::json!({ "path": path })));
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        ensure_success(response)
            .await?
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download response: {}", e)))
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let arg = serde_json::json!({ "path": path, "mode": "overwrite", "mute": true });

        let response = self
            .post(format!("{}/files/upload", CONTENT_BASE))
            .header(API_ARG_HEADER, api_arg(&arg))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        ensure_success(response).await?;
        Ok(())
    }
}
