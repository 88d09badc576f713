//! Protocol-dispatching facade.

use serde::de::DeserializeOwned;
use tracing::debug;

use forager_common::path::{join, protocol_or_default, strip_protocol};
use forager_common::{Error, List, PathInfo, Result};

use crate::config::ForagerConfig;
use crate::driver::{ByteStream, Driver, ReadOptions};
use crate::factory::{self, Protocol};

/// Entry point for path-based storage access.
///
/// Every call resolves the protocol of its path (`s3://bucket/key`,
/// `dropbox:///doc.txt`, a bare filesystem path, ...), builds a driver with
/// the configured options and forwards the protocol-relative path to it.
///
/// # Example
/// ```no_run
/// # async fn demo() -> forager_common::Result<()> {
/// use forager_storage::Forager;
///
/// let forager = Forager::default();
/// forager.copy_file("/tmp/in.txt", "s3://bucket/out.txt").await?;
/// let everything = forager.list("s3://bucket/dir", true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Forager {
    config: ForagerConfig,
}

/// Pending entries of one directory during a recursive listing.
struct Frame {
    /// Path of the directory relative to the listing root.
    prefix: String,
    entries: std::vec::IntoIter<PathInfo>,
}

impl Forager {
    /// Create a facade with the given configuration.
    pub fn new(config: ForagerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ForagerConfig {
        &self.config
    }

    /// Build the driver for `path` and return it with the protocol-relative
    /// path.
    fn resolve<'a>(&self, path: &'a str) -> Result<(Box<dyn Driver>, &'a str)> {
        let token = protocol_or_default(path);
        let protocol = Protocol::parse(token)?;
        let driver = factory::create(token, self.config.options_for(protocol))?;
        Ok((driver, strip_protocol(path)))
    }

    /// Read a whole file.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.read_with(path, ReadOptions::default()).await
    }

    /// Read a file with options such as a byte range.
    pub async fn read_with(&self, path: &str, options: ReadOptions) -> Result<Vec<u8>> {
        let (driver, relative) = self.resolve(path)?;
        debug!(path = %path, range = ?options.range, "Reading");
        driver.read(relative, options).await
    }

    /// Read a file as UTF-8 text.
    pub async fn read_string(&self, path: &str) -> Result<String> {
        let data = self.read(path).await?;
        String::from_utf8(data)
            .map_err(|e| Error::Parse(format!("{} is not valid UTF-8: {}", path, e)))
    }

    /// Read a file and parse it as JSON.
    pub async fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let text = self.read_string(path).await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("{} is not valid JSON: {}", path, e)))
    }

    /// Write a file, replacing existing content.
    pub async fn write(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let (driver, relative) = self.resolve(path)?;
        let data = data.into();
        debug!(path = %path, size = data.len(), "Writing");
        driver.write(relative, data).await
    }

    /// Open a stream over a file.
    pub async fn create_read_stream(&self, path: &str) -> Result<ByteStream> {
        self.create_read_stream_with(path, ReadOptions::default())
            .await
    }

    /// Open a stream over a file with options such as a byte range.
    pub async fn create_read_stream_with(
        &self,
        path: &str,
        options: ReadOptions,
    ) -> Result<ByteStream> {
        let (driver, relative) = self.resolve(path)?;
        debug!(path = %path, range = ?options.range, "Opening read stream");
        driver.create_read_stream(relative, options).await
    }

    /// Write a stream to a file.
    pub async fn write_stream(&self, path: &str, stream: ByteStream) -> Result<()> {
        let (driver, relative) = self.resolve(path)?;
        debug!(path = %path, "Writing stream");
        driver.write_stream(relative, stream).await
    }

    /// Copy `input` to `output` through a stream. The two paths may use
    /// different backends.
    pub async fn copy_file(&self, input: &str, output: &str) -> Result<()> {
        debug!(input = %input, output = %output, "Copying");
        let stream = self.create_read_stream(input).await?;
        self.write_stream(output, stream).await
    }

    /// Remove a file.
    pub async fn remove(&self, path: &str) -> Result<()> {
        let (driver, relative) = self.resolve(path)?;
        debug!(path = %path, "Removing");
        driver.remove(relative).await
    }

    /// List a directory.
    ///
    /// A plain listing returns the backend's entries unchanged: files and
    /// directories, sorted by path. A recursive listing returns only files,
    /// with paths relative to `dir`, in the order they are found walking each
    /// level depth-first.
    ///
    /// # Errors
    /// - Any failure of a nested listing aborts the whole call
    /// - `DepthLimitExceeded` when nesting goes past `max_list_depth`
    pub async fn list(&self, dir: &str, recursive: bool) -> Result<List> {
        let (driver, root) = self.resolve(dir)?;
        debug!(path = %dir, recursive, "Listing");
        self.list_with(driver.as_ref(), root, recursive).await
    }

    /// List `root` through an already resolved driver.
    async fn list_with(&self, driver: &dyn Driver, root: &str, recursive: bool) -> Result<List> {
        let contents = driver.list(root).await?;
        if !recursive {
            return Ok(contents);
        }

        let limit = self.config.max_list_depth;
        let mut files = Vec::new();
        let mut stack = vec![Frame {
            prefix: String::new(),
            entries: contents.into_iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(item) = frame.entries.next() else {
                stack.pop();
                continue;
            };

            let path = join(&frame.prefix, &item.path);
            if item.is_file() {
                files.push(PathInfo { path, ..item });
                continue;
            }

            if stack.len() > limit {
                return Err(Error::DepthLimitExceeded { path, limit });
            }

            debug!(path = %path, "Descending");
            let entries = driver.list(&join(root, &path)).await?;
            stack.push(Frame {
                prefix: path,
                entries: entries.into_iter(),
            });
        }

        Ok(files)
    }
}
