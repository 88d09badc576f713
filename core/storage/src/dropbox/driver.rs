//! Dropbox driver implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use forager_common::path::coerce_path;
use forager_common::types::sort_list;
use forager_common::{Error, List, PathInfo, Result};

use crate::driver::{ByteStream, Driver, ReadOptions};
use crate::util;

use super::client::{DropboxApi, DropboxClient, Metadata};

/// Canonical protocol name, used in listing failures.
pub const PROTOCOL: &str = "dropbox";

/// Dropbox access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropboxOptions {
    pub token: String,
}

impl DropboxOptions {
    /// Validate the shape of a raw options object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            debug!(error = %e, "Rejected Dropbox options");
            Error::InvalidOptions(PROTOCOL.to_string())
        })
    }

    /// Whether `value` has the Dropbox options shape.
    pub fn is_options(value: &serde_json::Value) -> bool {
        Self::from_value(value).is_ok()
    }
}

impl fmt::Debug for DropboxOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxOptions")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Dropbox driver.
///
/// The API has no incremental transfer here, so streamed reads download the
/// whole file and emit it as one chunk, and streamed writes collect the input
/// before uploading. Memory use is proportional to file size.
pub struct DropboxDriver {
    protocol: String,
    client: Box<dyn DropboxApi>,
}

impl DropboxDriver {
    /// Create a driver over the Dropbox HTTP API.
    ///
    /// `protocol` is the token the caller used ("dropbox" or "dbx").
    pub fn new(protocol: impl Into<String>, options: DropboxOptions) -> Result<Self> {
        Ok(Self::with_client(protocol, DropboxClient::new(options.token)?))
    }

    /// Create a driver over any [`DropboxApi`] implementation.
    pub fn with_client(protocol: impl Into<String>, client: impl DropboxApi + 'static) -> Self {
        Self {
            protocol: protocol.into(),
            client: Box::new(client),
        }
    }

    /// Collect every page of a folder listing.
    async fn list_all(&self, path: &str) -> Result<List> {
        let mut page = self.client.list_folder(&coerce_path(path)).await?;
        let mut list = Vec::new();

        loop {
            list.extend(page.entries.into_iter().filter_map(|entry| match entry {
                Metadata::Folder { name } => Some(PathInfo::directory(name)),
                Metadata::File { name, size } => Some(PathInfo::file(name, size)),
                Metadata::Other => None,
            }));

            if !page.has_more {
                break;
            }
            page = self.client.list_folder_continue(&page.cursor).await?;
        }

        sort_list(&mut list);
        Ok(list)
    }
}

#[async_trait]
impl Driver for DropboxDriver {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    async fn read(&self, path: &str, options: ReadOptions) -> Result<Vec<u8>> {
        let range = options.range.map(|r| r.to_header_value()).transpose()?;
        self.client.download(&coerce_path(path), range).await
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        debug!(path = %path, size = data.len(), "Uploading to Dropbox");
        self.client.upload(&coerce_path(path), data).await
    }

    async fn create_read_stream(&self, path: &str, options: ReadOptions) -> Result<ByteStream> {
        let data = self.read(path, options).await?;
        Ok(util::once(data))
    }

    async fn write_stream(&self, path: &str, stream: ByteStream) -> Result<()> {
        let data = util::drain(stream).await?;
        self.write(path, data).await
    }

    async fn list(&self, path: &str) -> Result<List> {
        self.list_all(path).await.map_err(|e| {
            warn!(path = %path, error = %e, "Dropbox listing failed");
            Error::ListFailed(PROTOCOL.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dropbox::ListFolderPage;
    use bytes::Bytes;
    use forager_common::Operation;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted [`DropboxApi`] recording the paths and cursors it sees.
    #[derive(Clone, Default)]
    struct MockDropbox {
        pages: Arc<Mutex<VecDeque<ListFolderPage>>>,
        calls: Arc<Mutex<Vec<String>>>,
        uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl MockDropbox {
        fn with_pages(pages: Vec<ListFolderPage>) -> Self {
            Self {
                pages: Arc::new(Mutex::new(pages.into())),
                ..Self::default()
            }
        }

        fn next_page(&self) -> Result<ListFolderPage> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Network("connection reset".to_string()))
        }
    }

    #[async_trait]
    impl DropboxApi for MockDropbox {
        async fn list_folder(&self, path: &str) -> Result<ListFolderPage> {
            self.calls.lock().unwrap().push(format!("list:{}", path));
            self.next_page()
        }

        async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage> {
            self.calls.lock().unwrap().push(format!("continue:{}", cursor));
            self.next_page()
        }

        async fn download(&self, path: &str, range: Option<String>) -> Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("download:{}:{}", path, range.unwrap_or_default()));
            Ok(b"dropbox data".to_vec())
        }

        async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
            self.uploads.lock().unwrap().push((path.to_string(), data));
            Ok(())
        }
    }

    fn folder(name: &str) -> Metadata {
        Metadata::Folder {
            name: name.to_string(),
        }
    }

    fn file(name: &str, size: u64) -> Metadata {
        Metadata::File {
            name: name.to_string(),
            size: Some(size),
        }
    }

    #[test]
    fn test_options_shape() {
        use serde_json::json;

        assert!(DropboxOptions::is_options(&json!({ "token": "" })));
        assert!(!DropboxOptions::is_options(&json!({ "token": 42 })));
        assert!(!DropboxOptions::is_options(&json!(42)));
        assert!(!format!("{:?}", DropboxOptions { token: "t0k".into() }).contains("t0k"));
    }

    #[tokio::test]
    async fn test_list_sorts_and_coerces_root() {
        let mock = MockDropbox::with_pages(vec![ListFolderPage {
            entries: vec![file("b.txt", 2), folder("sub"), file("a.txt", 1), Metadata::Other],
            cursor: "c0".to_string(),
            has_more: false,
        }]);
        let driver = DropboxDriver::with_client("dropbox", mock.clone());

        let list = driver.list("/").await.unwrap();
        assert_eq!(
            list,
            vec![
                PathInfo::file("a.txt", Some(1)),
                PathInfo::file("b.txt", Some(2)),
                PathInfo::directory("sub"),
            ]
        );
        assert_eq!(*mock.calls.lock().unwrap(), vec!["list:".to_string()]);
    }

    #[tokio::test]
    async fn test_list_follows_cursor() {
        let mock = MockDropbox::with_pages(vec![
            ListFolderPage {
                entries: vec![file("z.txt", 3)],
                cursor: "c1".to_string(),
                has_more: true,
            },
            ListFolderPage {
                entries: vec![folder("a")],
                cursor: "c2".to_string(),
                has_more: false,
            },
        ]);
        let driver = DropboxDriver::with_client("dbx", mock.clone());

        let list = driver.list("photos").await.unwrap();
        assert_eq!(
            list,
            vec![PathInfo::directory("a"), PathInfo::file("z.txt", Some(3))]
        );
        assert_eq!(
            *mock.calls.lock().unwrap(),
            vec!["list:/photos".to_string(), "continue:c1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_failure_is_wrapped() {
        let driver = DropboxDriver::with_client("dropbox", MockDropbox::default());
        let err = driver.list("").await.unwrap_err();
        assert!(matches!(err, Error::ListFailed(_)));
        assert_eq!(err.to_string(), "Failed to list dropbox contents");
    }

    #[tokio::test]
    async fn test_read_and_stream() {
        let mock = MockDropbox::default();
        let driver = DropboxDriver::with_client("dropbox", mock.clone());

        let data = driver.read("dir/f.txt", ReadOptions::range(0..4)).await.unwrap();
        assert_eq!(data, b"dropbox data");

        let stream = driver
            .create_read_stream("/dir/f.txt", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(util::drain(stream).await.unwrap(), b"dropbox data");

        assert_eq!(
            *mock.calls.lock().unwrap(),
            vec![
                "download:/dir/f.txt:bytes=0-3".to_string(),
                "download:/dir/f.txt:".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_stream_uploads_once() {
        let mock = MockDropbox::default();
        let driver = DropboxDriver::with_client("dropbox", mock.clone());

        let chunks: Vec<Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"c")), Ok(Bytes::from_static(b"cc"))];
        driver
            .write_stream("out.txt", Box::pin(futures::stream::iter(chunks)))
            .await
            .unwrap();

        assert_eq!(
            *mock.uploads.lock().unwrap(),
            vec![("/out.txt".to_string(), b"ccc".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_remove_not_supported() {
        let driver = DropboxDriver::with_client("dropbox", MockDropbox::default());
        let err = driver.remove("asdf").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                operation: Operation::Remove,
                ..
            }
        ));
        assert_eq!(err.to_string(), "dropbox: remove not supported");
    }
}
