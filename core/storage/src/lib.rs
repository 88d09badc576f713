//! Storage drivers and the path-based facade for Forager.
//!
//! A path names its backend through a protocol prefix (`s3://`, `dropbox://`,
//! `dbx://`, `http://`, `https://`, `file://`, or none for the local
//! filesystem). The [`Forager`] facade resolves the prefix, builds a driver
//! through the [`factory`] and forwards the protocol-relative path to it.
//!
//! # Design Principles
//! - Capability subsets: every driver implements [`Driver`], overriding only
//!   what its backend supports; the rest fails uniformly
//! - Construction is offline: option shapes are checked, nothing is fetched
//! - Streaming support: large files move through [`ByteStream`]s
//! - Backend SDKs sit behind narrow client traits so drivers test offline

pub mod config;
pub mod driver;
pub mod dropbox;
pub mod factory;
pub mod forager;
pub mod http;
pub mod local;
pub mod s3;
pub mod util;

pub use config::ForagerConfig;
pub use driver::{ByteStream, Driver, ReadOptions};
pub use dropbox::{DropboxDriver, DropboxOptions};
pub use factory::{create, Options, Protocol};
pub use forager::Forager;
pub use http::HttpDriver;
pub use local::LocalDriver;
pub use s3::{S3Driver, S3Options};
