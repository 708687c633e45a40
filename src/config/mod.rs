//! Configuration loading and validation.
//!
//! [`FileSource`] reads the config document from disk, picks a
//! deserializer from the file extension, and validates the result.
//! Submodules provide the data model and validation logic. The config
//! is loaded once at startup; there is no reloading.

pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::FrontgateError;
use model::{ConfigFile, ProxyConfig};
use validation::validate;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<ProxyConfig, FrontgateError> {
    let file: ConfigFile = match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| FrontgateError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        })?,

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| FrontgateError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        })?,

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| FrontgateError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        })?,

        other => return Err(FrontgateError::UnsupportedFormat(other.to_string())),
    };
    Ok(file.proxy)
}

/// Extension of `path`, or an empty string when it has none.
#[must_use]
pub fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// Async file-backed config source.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String, FrontgateError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FrontgateError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                FrontgateError::Io(e)
            }
        })
    }

    /// Read, parse, and validate the config. Validation failures are
    /// returned together in [`FrontgateError::ConfigValidation`].
    pub async fn load(&self) -> Result<ProxyConfig, FrontgateError> {
        let content = self.read_content().await?;
        let config = parse_config_str(
            extension_of(&self.path),
            &content,
            &self.path.display().to_string(),
        )?;

        if let Err(errors) = validate(&config) {
            return Err(FrontgateError::ConfigValidation { errors });
        }

        Ok(config)
    }
}
