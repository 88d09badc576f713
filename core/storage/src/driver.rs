//! Driver capability contract.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use forager_common::{ByteRange, Error, List, Operation, Result};

/// Byte stream type for streamed reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Options accepted by read operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Restrict the read to a byte range.
    pub range: Option<ByteRange>,
}

impl ReadOptions {
    /// Read only `range`.
    pub fn range(range: impl Into<ByteRange>) -> Self {
        Self {
            range: Some(range.into()),
        }
    }
}

/// Storage driver bound to one protocol.
///
/// Every capability is part of the trait. Backends override the ones they
/// support; the rest fall through to defaults that fail with
/// [`Error::Unsupported`], naming the protocol and the operation.
///
/// Paths handed to a driver are protocol-relative (`bucket/key`, not
/// `s3://bucket/key`).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Protocol token this driver was created for (e.g. "s3", "dbx").
    fn protocol(&self) -> &str;

    /// Build the "not supported" error for `operation`.
    fn unsupported(&self, operation: Operation) -> Error {
        Error::unsupported(self.protocol(), operation)
    }

    /// Read a whole object, or the part selected by `options.range`.
    async fn read(&self, _path: &str, _options: ReadOptions) -> Result<Vec<u8>> {
        Err(self.unsupported(Operation::Read))
    }

    /// Write `data`, replacing any existing content.
    async fn write(&self, _path: &str, _data: Vec<u8>) -> Result<()> {
        Err(self.unsupported(Operation::Write))
    }

    /// Open a stream over an object's content.
    async fn create_read_stream(&self, _path: &str, _options: ReadOptions) -> Result<ByteStream> {
        Err(self.unsupported(Operation::CreateReadStream))
    }

    /// Write everything produced by `stream`.
    async fn write_stream(&self, _path: &str, _stream: ByteStream) -> Result<()> {
        Err(self.unsupported(Operation::WriteStream))
    }

    /// List one level of a directory, sorted by path.
    async fn list(&self, _path: &str) -> Result<List> {
        Err(self.unsupported(Operation::List))
    }

    /// Remove a file.
    async fn remove(&self, _path: &str) -> Result<()> {
        Err(self.unsupported(Operation::Remove))
    }
}
