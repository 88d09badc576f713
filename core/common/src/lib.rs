//! Common utilities and types shared across Forager crates.
//!
//! This crate holds the pieces every driver and the facade agree on: the
//! error taxonomy, listing entries, the path router and the byte-range model.

pub mod error;
pub mod path;
pub mod range;
pub mod types;

pub use error::{Error, ResponseBody, Result};
pub use range::ByteRange;
pub use types::{compare_paths, List, Operation, PathInfo, PathType};
