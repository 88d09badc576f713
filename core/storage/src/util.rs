//! Byte stream helpers shared by drivers and the facade.

use bytes::Bytes;
use futures::{stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use forager_common::Result;

use crate::driver::ByteStream;

/// Collect a byte stream into one buffer, failing on the first bad chunk.
pub async fn drain(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut data = Vec::new();

    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }

    Ok(data)
}

/// Single-chunk stream over an in-memory buffer.
///
/// Backends without incremental transfers use this to present whole
/// downloads through the streaming interface.
pub fn once(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(stream::once(async move { Ok(data) }))
}

/// Stream the contents of an async reader chunk by chunk.
pub fn from_reader<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(ReaderStream::new(reader).map(|chunk| chunk.map_err(Into::into)))
}
