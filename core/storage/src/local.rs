//! Local filesystem driver.

use async_trait::async_trait;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, Take};
use tracing::debug;

use forager_common::path::DEFAULT_PROTOCOL;
use forager_common::types::sort_list;
use forager_common::{List, PathInfo, Result};

use crate::driver::{ByteStream, Driver, ReadOptions};
use crate::util;

/// Local filesystem driver.
///
/// Paths are plain OS paths, absolute or relative to the working directory.
/// Implements the full capability set with incremental streaming.
pub struct LocalDriver;

impl LocalDriver {
    /// Create a local filesystem driver.
    pub fn new() -> Self {
        Self
    }

    /// Open `path` positioned at the start of the requested range, limited to
    /// its length.
    async fn open_range(path: &str, options: ReadOptions) -> Result<Take<fs::File>> {
        let range = options.range.unwrap_or_default();
        range.check_slice()?;

        let mut file = fs::File::open(path).await?;
        if range.begin > 0 {
            file.seek(SeekFrom::Start(range.begin)).await?;
        }

        Ok(file.take(range.len().unwrap_or(u64::MAX)))
    }
}

impl Default for LocalDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for LocalDriver {
    fn protocol(&self) -> &str {
        DEFAULT_PROTOCOL
    }

    async fn read(&self, path: &str, options: ReadOptions) -> Result<Vec<u8>> {
        let mut reader = Self::open_range(path, options).await?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok(data)
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        fs::write(path, &data).await?;
        Ok(())
    }

    async fn create_read_stream(&self, path: &str, options: ReadOptions) -> Result<ByteStream> {
        let reader = Self::open_range(path, options).await?;
        Ok(util::from_reader(reader))
    }

    async fn write_stream(&self, path: &str, mut stream: ByteStream) -> Result<()> {
        let mut file = fs::File::create(path).await?;

        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }

        file.flush().await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<List> {
        let mut results = Vec::new();
        let mut entries = fs::read_dir(path).await?;

        while let Some(entry) = entries.next_entry().await? {
            // Symlinks, sockets, FIFOs and devices are skipped.
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_dir() {
                results.push(PathInfo::directory(name));
            } else if file_type.is_file() {
                let size = entry.metadata().await?.len();
                results.push(PathInfo::file(name, Some(size)));
            } else {
                debug!(path = %Path::new(path).join(&name).display(), "Skipping special file");
            }
        }

        sort_list(&mut results);
        Ok(results)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use forager_common::{ByteRange, Error};
    use tempfile::TempDir;

    fn path_in(temp: &TempDir, name: &str) -> String {
        temp.path().join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();
        let path = path_in(&temp, "test.txt");

        driver.write(&path, b"Hello, Local!".to_vec()).await.unwrap();
        let data = driver.read(&path, ReadOptions::default()).await.unwrap();

        assert_eq!(data, b"Hello, Local!");
    }

    #[tokio::test]
    async fn test_local_read_range() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();
        let path = path_in(&temp, "range.txt");
        driver.write(&path, b"abcdef".to_vec()).await.unwrap();

        let middle = driver.read(&path, ReadOptions::range(1..5)).await.unwrap();
        assert_eq!(middle, b"bcde");

        let tail = driver.read(&path, ReadOptions::range(4..)).await.unwrap();
        assert_eq!(tail, b"ef");

        let empty = driver.read(&path, ReadOptions::range(3..3)).await.unwrap();
        assert!(empty.is_empty());

        let reversed = ReadOptions {
            range: Some(ByteRange::new(4, 2)),
        };
        assert!(matches!(
            driver.read(&path, reversed).await,
            Err(Error::InvalidRange(_))
        ));
    }

    #[tokio::test]
    async fn test_local_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();
        let result = driver
            .read(&path_in(&temp, "nope.txt"), ReadOptions::default())
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_local_streams() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();
        let path = path_in(&temp, "stream.txt");

        let chunks: Vec<Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"ss")), Ok(Bytes::from_static(b"s"))];
        driver
            .write_stream(&path, Box::pin(futures::stream::iter(chunks)))
            .await
            .unwrap();

        let stream = driver
            .create_read_stream(&path, ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(util::drain(stream).await.unwrap(), b"sss");

        let stream = driver
            .create_read_stream(&path, ReadOptions::range(1..2))
            .await
            .unwrap();
        assert_eq!(util::drain(stream).await.unwrap(), b"s");
    }

    #[tokio::test]
    async fn test_local_list() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();

        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("b.txt"), b"22").unwrap();
        std::fs::write(temp.path().join("a.txt"), b"1").unwrap();

        let contents = driver
            .list(&temp.path().to_string_lossy())
            .await
            .unwrap();

        assert_eq!(
            contents,
            vec![
                PathInfo::file("a.txt", Some(1)),
                PathInfo::file("b.txt", Some(2)),
                PathInfo::directory("sub"),
            ]
        );
    }

    #[tokio::test]
    async fn test_local_remove() {
        let temp = TempDir::new().unwrap();
        let driver = LocalDriver::new();
        let path = path_in(&temp, "gone.txt");

        driver.write(&path, vec![1, 2, 3]).await.unwrap();
        driver.remove(&path).await.unwrap();

        assert!(driver.read(&path, ReadOptions::default()).await.is_err());
        assert!(driver.remove(&path).await.is_err());
    }
}
