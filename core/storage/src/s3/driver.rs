//! S3 driver implementation.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::{debug, warn};

use forager_common::path::{pop_slash, split_bucket};
use forager_common::types::sort_list;
use forager_common::{Error, List, PathInfo, Result};

use crate::driver::{ByteStream, Driver, ReadOptions};
use crate::util;

use super::client::{
    AwsS3Client, GetObjectRequest, ListObjectsRequest, MultipartUpload, PutObjectRequest, S3Api,
};

/// Protocol token served by this driver.
pub const PROTOCOL: &str = "s3";

/// Listing delimiter.
const DELIMITER: &str = "/";

/// Size of each multipart upload part. Streams shorter than one part are
/// sent with a single `PutObject`.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 credentials and region.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Options {
    #[serde(
        default,
        deserialize_with = "present_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub region: Option<String>,
    pub access: String,
    pub secret: String,
}

impl S3Options {
    /// Validate the shape of a raw options object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            debug!(error = %e, "Rejected S3 options");
            Error::InvalidOptions(PROTOCOL.to_string())
        })
    }

    /// Whether `value` has the S3 options shape.
    pub fn is_options(value: &serde_json::Value) -> bool {
        Self::from_value(value).is_ok()
    }
}

/// A region key, when present, must hold a string; `null` is rejected.
fn present_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

impl fmt::Debug for S3Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Options")
            .field("region", &self.region)
            .field("access", &self.access)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// S3 driver.
///
/// Supports read, write, streamed read and streamed write. Streamed writes
/// are sent as a multipart upload, one part at a time as the input produces
/// them.
pub struct S3Driver {
    client: Box<dyn S3Api>,
    part_size: usize,
}

impl S3Driver {
    /// Create a driver over the AWS SDK.
    ///
    /// Without options, credentials and region come from the SDK's default
    /// provider chain.
    pub fn new(options: Option<S3Options>) -> Self {
        Self::with_client(AwsS3Client::new(options))
    }

    /// Create a driver over any [`S3Api`] implementation.
    pub fn with_client(client: impl S3Api + 'static) -> Self {
        Self {
            client: Box::new(client),
            part_size: PART_SIZE,
        }
    }

    /// Split `path` into bucket and key, requiring a key.
    fn object(path: &str, action: &str) -> Result<(String, String)> {
        match split_bucket(path)? {
            (bucket, Some(key)) => Ok((bucket.to_string(), key.to_string())),
            (_, None) => Err(Error::InvalidInput(format!(
                "Invalid S3 {} - no object specified",
                action
            ))),
        }
    }

    async fn get_body(&self, path: &str, options: ReadOptions) -> Result<ByteStream> {
        let (bucket, key) = Self::object(path, "read")?;
        let range = options.range.map(|r| r.to_header_value()).transpose()?;

        self.client
            .get_object(GetObjectRequest { bucket, key, range })
            .await?
            .ok_or_else(|| Error::MissingContent("Missing response body from S3".to_string()))
    }

    /// Upload `buffer` and the rest of `stream` as parts, then complete the
    /// upload.
    async fn send_parts(
        &self,
        upload: &MultipartUpload,
        mut buffer: Vec<u8>,
        mut stream: ByteStream,
    ) -> Result<()> {
        let mut parts = Vec::new();
        let mut finished = false;

        while !finished {
            while buffer.len() < self.part_size {
                match stream.next().await {
                    Some(chunk) => buffer.extend_from_slice(&chunk?),
                    None => {
                        finished = true;
                        break;
                    }
                }
            }

            while buffer.len() >= self.part_size || (finished && !buffer.is_empty()) {
                let rest = buffer.split_off(buffer.len().min(self.part_size));
                let body = std::mem::replace(&mut buffer, rest);
                let part_number = i32::try_from(parts.len() + 1)
                    .map_err(|_| Error::InvalidInput("Too many upload parts".to_string()))?;

                debug!(key = %upload.key, part_number, size = body.len(), "Uploading part");
                parts.push(self.client.upload_part(upload, part_number, body).await?);
            }
        }

        self.client.complete_multipart_upload(upload, parts).await
    }
}

/// Content type guessed from an object key's extension.
fn content_type(key: &str) -> Option<String> {
    mime_guess::from_path(key)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

#[async_trait]
impl Driver for S3Driver {
    fn protocol(&self) -> &str {
        PROTOCOL
    }

    async fn read(&self, path: &str, options: ReadOptions) -> Result<Vec<u8>> {
        let body = self.get_body(path, options).await?;
        util::drain(body).await
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let (bucket, key) = Self::object(path, "write")?;
        let content_type = content_type(&key);

        debug!(bucket = %bucket, key = %key, size = data.len(), "Uploading object");
        self.client
            .put_object(PutObjectRequest {
                bucket,
                key,
                body: data,
                content_type,
            })
            .await
    }

    async fn create_read_stream(&self, path: &str, options: ReadOptions) -> Result<ByteStream> {
        self.get_body(path, options).await
    }

    async fn write_stream(&self, path: &str, mut stream: ByteStream) -> Result<()> {
        let (bucket, key) = Self::object(path, "write")?;

        let mut buffer = Vec::new();
        while buffer.len() < self.part_size {
            match stream.next().await {
                Some(chunk) => buffer.extend_from_slice(&chunk?),
                None => return self.write(path, buffer).await,
            }
        }

        let content_type = content_type(&key);
        let upload = self
            .client
            .create_multipart_upload(bucket, key, content_type)
            .await?;

        match self.send_parts(&upload, buffer, stream).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(abort) = self.client.abort_multipart_upload(&upload).await {
                    warn!(key = %upload.key, error = %abort, "Failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn list(&self, path: &str) -> Result<List> {
        let (bucket, key) = split_bucket(path)?;
        let prefix = key.map(|k| format!("{}/", k)).unwrap_or_default();

        let mut list = Vec::new();
        let mut continuation_token = None;

        loop {
            let page = self
                .client
                .list_objects(ListObjectsRequest {
                    bucket: bucket.to_string(),
                    prefix: prefix.clone(),
                    delimiter: DELIMITER.to_string(),
                    continuation_token,
                })
                .await?;

            let (Some(common_prefixes), Some(contents)) = (page.common_prefixes, page.contents)
            else {
                return Err(Error::MalformedResponse(
                    "Unexpected S3 list response".to_string(),
                ));
            };

            list.extend(common_prefixes.iter().map(|p| {
                let relative = p.strip_prefix(&prefix).unwrap_or(p);
                PathInfo::directory(pop_slash(relative))
            }));
            list.extend(contents.into_iter().map(|object| {
                let relative = object.key.strip_prefix(&prefix).unwrap_or(&object.key);
                PathInfo::file(relative, object.size)
            }));

            continuation_token = page.next_continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }

        sort_list(&mut list);
        Ok(list)
    }
}
