//! Common types used throughout Forager.

use icu_collator::{CaseFirst, Collator, CollatorOptions};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    File,
    Directory,
}

/// One entry of a directory listing.
///
/// `path` is relative to the listed directory and never carries a leading
/// separator. `size` is only ever set for files, and `None` means the backend
/// did not report one, not that the file is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: PathType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl PathInfo {
    /// Create a file entry.
    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            kind: PathType::File,
            size,
        }
    }

    /// Create a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: PathType::Directory,
            size: None,
        }
    }

    /// Whether this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind == PathType::File
    }

    /// Whether this entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == PathType::Directory
    }
}

/// Ordered listing result.
pub type List = Vec<PathInfo>;

/// Sort a listing in place using [`compare_paths`].
pub fn sort_list(list: &mut List) {
    list.sort_by(|a, b| compare_paths(&a.path, &b.path));
}

thread_local! {
    /// Root-locale collator, lowercase first. `None` if the collation data
    /// failed to load, in which case ordering falls back to code points.
    static COLLATOR: Option<Collator> = {
        let mut options = CollatorOptions::new();
        options.case_first = Some(CaseFirst::LowerFirst);
        Collator::try_new(&Default::default(), options).ok()
    };
}

/// Locale-aware path ordering.
///
/// Uses the Unicode collation of the root locale with lowercase sorted ahead
/// of uppercase. Strings the collator considers equal are ordered by code
/// point so the result is total.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    COLLATOR
        .with(|collator| match collator {
            Some(collator) => collator.compare(a, b),
            None => Ordering::Equal,
        })
        .then_with(|| a.cmp(b))
}

/// A capability of the driver contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    CreateReadStream,
    WriteStream,
    List,
    Remove,
}

impl Operation {
    /// Every capability, in contract order.
    pub const ALL: [Operation; 6] = [
        Operation::Read,
        Operation::Write,
        Operation::CreateReadStream,
        Operation::WriteStream,
        Operation::List,
        Operation::Remove,
    ];

    /// Name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::CreateReadStream => "create_read_stream",
            Self::WriteStream => "write_stream",
            Self::List => "list",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
