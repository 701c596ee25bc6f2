//! Async file-based config source with SHA256 change detection.
//!
//! [`FileSource`] implements [`ConfigSource`] for every enabled file
//! format. The format is taken from the file extension once, at
//! construction. Reads go through Tokio; each load validates the result
//! and hashes the raw content for version tracking.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_config_str, sha256_hex};
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::BeaconError;

/// File names probed, in order, when no `--config` is given.
pub const CANDIDATES: &[&str] = &["beacon.yaml", "beacon.yml", "beacon.json", "beacon.toml"];

#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    format: &'static str,
}

impl FileSource {
    /// Create a source for `path`, rejecting extensions whose format is not
    /// compiled in.
    pub fn new(path: &Path) -> Result<Self, BeaconError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = match ext {
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => "yaml",

            #[cfg(feature = "json")]
            "json" => "json",

            #[cfg(feature = "toml")]
            "toml" => "toml",

            other => return Err(BeaconError::UnsupportedFormat(other.to_string())),
        };

        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String, BeaconError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BeaconError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                BeaconError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.format
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), BeaconError> {
        let content = self.read_content().await?;
        let config = parse_config_str(self.format, &content, &self.path.display().to_string())?;

        if let Err(errors) = validate(&config) {
            return Err(BeaconError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, BeaconError> {
        let content = self.read_content().await?;
        let hash = sha256_hex(content.as_bytes());
        Ok(*current != ConfigVersion::Hash(hash))
    }
}

/// Pick the explicit path if given, else the first candidate present in
/// the working directory.
pub async fn discover(explicit: Option<&Path>) -> Result<Option<FileSource>, BeaconError> {
    if let Some(path) = explicit {
        return FileSource::new(path).map(Some);
    }

    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return FileSource::new(&path).map(Some);
        }
    }

    Ok(None)
}
