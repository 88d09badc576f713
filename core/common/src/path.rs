//! Path routing: protocol extraction, stripping and joining.
//!
//! Paths look like `<protocol>://<path>`. A path without a protocol belongs to
//! the local filesystem.

use crate::{Error, Result};

/// Separator between the protocol token and the rest of the path.
pub const PROTOCOL_SEPARATOR: &str = "://";

/// Protocol used when a path carries none.
pub const DEFAULT_PROTOCOL: &str = "file";

/// Return the protocol token of `path`, or `""` when there is none.
pub fn classify_protocol(path: &str) -> &str {
    path.split_once(PROTOCOL_SEPARATOR)
        .map_or("", |(protocol, _)| protocol)
}

/// Return the protocol token of `path`, defaulting to `file`.
pub fn protocol_or_default(path: &str) -> &str {
    match classify_protocol(path) {
        "" => DEFAULT_PROTOCOL,
        protocol => protocol,
    }
}

/// Remove the protocol prefix, leaving a protocol-relative path.
pub fn strip_protocol(path: &str) -> &str {
    path.split_once(PROTOCOL_SEPARATOR)
        .map_or(path, |(_, rest)| rest)
}

/// Join two path fragments with a single `/`.
///
/// An empty `base` yields `child` without any leading separator, which keeps
/// relative listing paths relative.
pub fn join(base: &str, child: &str) -> String {
    let child = child.trim_start_matches('/');
    if base.is_empty() {
        return child.to_string();
    }
    if child.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), child)
}

/// Strip one trailing `/`, if present.
pub fn pop_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Normalize a path for APIs that spell the root as `""` and everything else
/// with exactly one leading `/`.
///
/// Both `""` and `"/"` map to the root. Applying this twice is the same as
/// applying it once.
pub fn coerce_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Split an object-storage path into its bucket and optional object key.
pub fn split_bucket(path: &str) -> Result<(&str, Option<&str>)> {
    let path = pop_slash(path.trim_start_matches('/'));
    let (bucket, key) = match path.split_once('/') {
        Some((bucket, key)) => (bucket, Some(key)),
        None => (path, None),
    };

    if bucket.is_empty() {
        return Err(Error::InvalidInput("No S3 bucket supplied".to_string()));
    }

    Ok((bucket, key.filter(|k| !k.is_empty())))
}
