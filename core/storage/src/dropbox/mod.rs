//! Dropbox driver.
//!
//! This module provides a cloud-drive backend over the Dropbox v2 HTTP API:
//! - Bearer token authentication (tokens are supplied, never refreshed)
//! - Cursor-paginated folder listings
//! - Whole-file transfers exposed through the streaming interface
//! - No removal

pub mod client;
pub mod driver;

pub use client::{DropboxApi, DropboxClient, ListFolderPage, Metadata};
pub use driver::{DropboxDriver, DropboxOptions};
