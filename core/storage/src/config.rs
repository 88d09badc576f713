//! Facade configuration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use forager_common::{Error, Result};

use crate::factory::Protocol;

/// Default cap on recursive listing depth.
pub const DEFAULT_MAX_LIST_DEPTH: usize = 256;

/// Name of the configuration file under the user config directory.
const CONFIG_FILE: &str = "config.json";

/// Options handed to drivers, plus facade limits.
///
/// Backend options are kept as raw JSON so the factory remains the only place
/// that checks their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForagerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropbox: Option<Value>,
    #[serde(default = "default_max_list_depth")]
    pub max_list_depth: usize,
}

fn default_max_list_depth() -> usize {
    DEFAULT_MAX_LIST_DEPTH
}

impl Default for ForagerConfig {
    fn default() -> Self {
        Self {
            s3: None,
            dropbox: None,
            max_list_depth: DEFAULT_MAX_LIST_DEPTH,
        }
    }
}

impl ForagerConfig {
    /// Options to pass when creating a driver for `protocol`.
    pub fn options_for(&self, protocol: Protocol) -> Option<&Value> {
        match protocol {
            Protocol::S3 => self.s3.as_ref(),
            Protocol::Dropbox => self.dropbox.as_ref(),
            Protocol::File | Protocol::Http | Protocol::Https => None,
        }
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Build a configuration from environment variables.
    ///
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`,
    /// `DROPBOX_TOKEN` and `FORAGER_MAX_LIST_DEPTH`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let s3 = match (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY")) {
            (Some(access), Some(secret)) => {
                let mut options = json!({ "access": access, "secret": secret });
                if let Some(region) = lookup("AWS_REGION") {
                    options["region"] = Value::String(region);
                }
                Some(options)
            }
            _ => None,
        };

        let dropbox = lookup("DROPBOX_TOKEN").map(|token| json!({ "token": token }));

        let max_list_depth = match lookup("FORAGER_MAX_LIST_DEPTH") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::InvalidInput(format!("FORAGER_MAX_LIST_DEPTH is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_LIST_DEPTH,
        };

        Ok(Self {
            s3,
            dropbox,
            max_list_depth,
        })
    }

    /// Default location of the configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forager").join(CONFIG_FILE))
    }

    /// Load configuration from the first available source.
    ///
    /// Uses `explicit` when given, otherwise the file at
    /// [`default_path`](Self::default_path) when it exists, otherwise the
    /// environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "Loading config file");
            return Self::from_file(path);
        }

        match Self::default_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "Loading default config file");
                Self::from_file(path)
            }
            None => {
                debug!("No config file, reading environment");
                Self::from_env()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config: ForagerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ForagerConfig::default());
        assert_eq!(config.max_list_depth, DEFAULT_MAX_LIST_DEPTH);
        assert!(config.options_for(Protocol::S3).is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "dropbox": { "token": "t" }, "max_list_depth": 3 }"#,
        )
        .unwrap();

        let config = ForagerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_list_depth, 3);
        assert_eq!(
            config.options_for(Protocol::Dropbox),
            Some(&json!({ "token": "t" }))
        );
        assert!(config.options_for(Protocol::File).is_none());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ForagerConfig::from_file(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ForagerConfig::from_file(&path), Err(Error::Parse(_))));
    }

    #[test]
    fn test_from_lookup() {
        let config = ForagerConfig::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "ak"),
            ("AWS_SECRET_ACCESS_KEY", "sk"),
            ("AWS_REGION", "eu-west-1"),
            ("DROPBOX_TOKEN", "tok"),
            ("FORAGER_MAX_LIST_DEPTH", "8"),
        ]))
        .unwrap();

        assert_eq!(
            config.s3,
            Some(json!({ "access": "ak", "secret": "sk", "region": "eu-west-1" }))
        );
        assert_eq!(config.dropbox, Some(json!({ "token": "tok" })));
        assert_eq!(config.max_list_depth, 8);
    }

    #[test]
    fn test_from_lookup_partial() {
        let config = ForagerConfig::from_lookup(lookup(&[("AWS_ACCESS_KEY_ID", "ak")])).unwrap();
        assert_eq!(config, ForagerConfig::default());

        let err = ForagerConfig::from_lookup(lookup(&[("FORAGER_MAX_LIST_DEPTH", "deep")]));
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }
}
