//! Object storage driver backed by S3.
//!
//! Paths take the form `bucket/key`. Listings use `/` as the delimiter and
//! follow continuation tokens until the last page. Streamed writes become
//! multipart uploads. Removal is not offered.

pub mod client;
pub mod driver;

pub use client::{
    AwsS3Client, GetObjectRequest, ListObjectsPage, ListObjectsRequest, MultipartUpload,
    ObjectEntry, PutObjectRequest, S3Api, UploadedPart,
};
pub use driver::{S3Driver, S3Options, PART_SIZE};
