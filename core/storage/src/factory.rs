//! Protocol resolution and driver construction.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use forager_common::path::DEFAULT_PROTOCOL;
use forager_common::{Error, Result};

use crate::driver::Driver;
use crate::dropbox::{DropboxDriver, DropboxOptions};
use crate::http::HttpDriver;
use crate::local::LocalDriver;
use crate::s3::{S3Driver, S3Options};

/// Backends a protocol token can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    File,
    Http,
    Https,
    S3,
    Dropbox,
}

impl Protocol {
    /// Resolve a protocol token. `""` means the local filesystem and `dbx` is
    /// an alias for Dropbox.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "" | "file" => Ok(Protocol::File),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "s3" => Ok(Protocol::S3),
            "dropbox" | "dbx" => Ok(Protocol::Dropbox),
            other => Err(Error::InvalidProtocol(other.to_string())),
        }
    }

    /// Canonical token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::File => DEFAULT_PROTOCOL,
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::S3 => "s3",
            Protocol::Dropbox => "dropbox",
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend option bundles, kept apart per backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Options {
    S3(S3Options),
    Dropbox(DropboxOptions),
}

impl Options {
    /// Whether `value` has the S3 options shape.
    pub fn is_s3(value: &Value) -> bool {
        S3Options::is_options(value)
    }

    /// Whether `value` has the Dropbox options shape.
    pub fn is_dropbox(value: &Value) -> bool {
        DropboxOptions::is_options(value)
    }

    /// Validate `value` against the shape `protocol` expects.
    ///
    /// Returns `None` for backends that take no options.
    pub fn for_protocol(protocol: Protocol, value: &Value) -> Result<Option<Self>> {
        match protocol {
            Protocol::S3 => S3Options::from_value(value).map(|o| Some(Options::S3(o))),
            Protocol::Dropbox => {
                DropboxOptions::from_value(value).map(|o| Some(Options::Dropbox(o)))
            }
            Protocol::File | Protocol::Http | Protocol::Https => Ok(None),
        }
    }
}

/// Create a driver for a protocol token.
///
/// Only the shape of `options` is checked; nothing touches the network.
///
/// # Errors
/// - `InvalidProtocol` for an unknown token
/// - `InvalidOptions` when options are given but do not fit the backend, or
///   when Dropbox is requested without options
pub fn create(token: &str, options: Option<&Value>) -> Result<Box<dyn Driver>> {
    let protocol = Protocol::parse(token)?;
    debug!(protocol = %protocol, token = %token, "Creating driver");

    let options = options
        .map(|value| Options::for_protocol(protocol, value))
        .transpose()?
        .flatten();

    let driver: Box<dyn Driver> = match (protocol, options) {
        (Protocol::File, _) => Box::new(LocalDriver::new()),
        (Protocol::Http | Protocol::Https, _) => Box::new(HttpDriver::new(token)?),
        (Protocol::S3, Some(Options::S3(options))) => Box::new(S3Driver::new(Some(options))),
        (Protocol::S3, _) => Box::new(S3Driver::new(None)),
        (Protocol::Dropbox, Some(Options::Dropbox(options))) => {
            Box::new(DropboxDriver::new(token, options)?)
        }
        (Protocol::Dropbox, _) => {
            return Err(Error::InvalidOptions(Protocol::Dropbox.to_string()));
        }
    };

    Ok(driver)
}
