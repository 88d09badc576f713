//! S3 API client.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as SdkByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures::stream;
use tokio::sync::OnceCell;
use tracing::debug;

use forager_common::{Error, Result};

use crate::driver::ByteStream;

use super::driver::S3Options;

/// Region used when neither options nor the SDK's provider chain name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Provider name attached to static credentials.
const CREDENTIALS_PROVIDER: &str = "forager";

/// Request for a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
    /// `Range` header value, if any.
    pub range: Option<String>,
}

/// Upload of a whole object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Request for one page of a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: String,
    pub continuation_token: Option<String>,
}

/// Object in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: Option<u64>,
}

/// One page of a listing.
///
/// Both collections are optional so that a response missing them can be
/// detected and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    pub common_prefixes: Option<Vec<String>>,
    pub contents: Option<Vec<ObjectEntry>>,
    pub next_continuation_token: Option<String>,
}

/// Handle on a multipart upload in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Part accepted by the service, as needed to complete an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// 1-based position in the object.
    pub part_number: i32,
    pub e_tag: Option<String>,
}

/// The subset of the S3 API the driver needs.
#[async_trait]
pub trait S3Api: Send + Sync {
    /// Fetch an object body. `None` means the response carried no body.
    async fn get_object(&self, request: GetObjectRequest) -> Result<Option<ByteStream>>;

    /// Store an object.
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;

    /// Fetch one listing page.
    async fn list_objects(&self, request: ListObjectsRequest) -> Result<ListObjectsPage>;

    /// Start a multipart upload.
    async fn create_multipart_upload(
        &self,
        bucket: String,
        key: String,
        content_type: Option<String>,
    ) -> Result<MultipartUpload>;

    /// Upload one part of a multipart upload.
    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart>;

    /// Assemble the uploaded parts into the final object.
    async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: Vec<UploadedPart>,
    ) -> Result<()>;

    /// Discard a multipart upload and the parts stored so far.
    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> Result<()>;
}

/// [`S3Api`] over the AWS SDK.
///
/// The SDK client is built on first use, so constructing this performs no
/// I/O. Without explicit options, credentials and region come from the SDK's
/// default provider chain (environment, shared profile files, SSO, instance
/// roles).
pub struct AwsS3Client {
    options: Option<S3Options>,
    client: OnceCell<Client>,
}

impl AwsS3Client {
    /// Create a client from options, deferring SDK setup.
    pub fn new(options: Option<S3Options>) -> Self {
        Self {
            options,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let region = self
                    .options
                    .as_ref()
                    .and_then(|o| o.region.clone())
                    .filter(|r| !r.is_empty())
                    .map(Region::new);
                let region_provider = RegionProviderChain::first_try(region)
                    .or_default_provider()
                    .or_else(Region::new(DEFAULT_REGION));

                let mut loader =
                    aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
                if let Some(options) = &self.options {
                    loader = loader.credentials_provider(Credentials::new(
                        options.access.clone(),
                        options.secret.clone(),
                        None,
                        None,
                        CREDENTIALS_PROVIDER,
                    ));
                }

                let config = loader.load().await;
                debug!(
                    region = ?config.region(),
                    static_credentials = self.options.is_some(),
                    "Loaded S3 configuration"
                );
                Client::new(&config)
            })
            .await
    }
}

/// Map an SDK failure, keeping its full error chain in the message.
fn sdk_error(operation: &str, err: impl std::error::Error) -> Error {
    Error::Storage(format!("S3 {} failed: {}", operation, DisplayErrorContext(&err)))
}

/// Adapt the SDK body into our stream type without buffering it.
fn body_stream(body: SdkByteStream) -> ByteStream {
    Box::pin(stream::unfold(body, |mut body| async move {
        body.next().await.map(|chunk| {
            let chunk =
                chunk.map_err(|e| Error::Network(format!("S3 body read error: {}", e)));
            (chunk, body)
        })
    }))
}

#[async_trait]
impl S3Api for AwsS3Client {
    async fn get_object(&self, request: GetObjectRequest) -> Result<Option<ByteStream>> {
        let output = self
            .client()
            .await
            .get_object()
            .bucket(request.bucket)
            .key(request.key)
            .set_range(request.range)
            .send()
            .await
            .map_err(|e| sdk_error("GetObject", e))?;

        Ok(Some(body_stream(output.body)))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        self.client()
            .await
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(SdkByteStream::from(request.body))
            .set_content_type(request.content_type)
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;

        Ok(())
    }

    async fn list_objects(&self, request: ListObjectsRequest) -> Result<ListObjectsPage> {
        let output = self
            .client()
            .await
            .list_objects_v2()
            .bucket(request.bucket)
            .prefix(request.prefix)
            .delimiter(request.delimiter)
            .set_continuation_token(request.continuation_token)
            .send()
            .await
            .map_err(|e| sdk_error("ListObjectsV2", e))?;

        let common_prefixes = output
            .common_prefixes
            .map(|prefixes| prefixes.into_iter().filter_map(|p| p.prefix).collect());

        let contents = output.contents.map(|objects| {
            objects
                .into_iter()
                .filter_map(|object| {
                    let size = object.size.and_then(|s| u64::try_from(s).ok());
                    object.key.map(|key| ObjectEntry { key, size })
                })
                .collect()
        });

        Ok(ListObjectsPage {
            common_prefixes,
            contents,
            next_continuation_token: output.next_continuation_token,
        })
    }

    async fn create_multipart_upload(
        &self,
        bucket: String,
        key: String,
        content_type: Option<String>,
    ) -> Result<MultipartUpload> {
        let output = self
            .client()
            .await
            .create_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .set_content_type(content_type)
            .send()
            .await
            .map_err(|e| sdk_error("CreateMultipartUpload", e))?;

        let upload_id = output.upload_id.ok_or_else(|| {
            Error::MalformedResponse("Missing upload ID from S3".to_string())
        })?;

        Ok(MultipartUpload {
            bucket,
            key,
            upload_id,
        })
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<UploadedPart> {
        let output = self
            .client()
            .await
            .upload_part()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("UploadPart", e))?;

        Ok(UploadedPart {
            part_number,
            e_tag: output.e_tag,
        })
    }

    async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                CompletedPart::builder()
                    .set_e_tag(part.e_tag)
                    .part_number(part.part_number)
                    .build()
            })
            .collect();
        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client()
            .await
            .complete_multipart_upload()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| sdk_error("CompleteMultipartUpload", e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> Result<()> {
        self.client()
            .await
            .abort_multipart_upload()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| sdk_error("AbortMultipartUpload", e))?;

        Ok(())
    }
}
