//! engine::wiring
//!
//! Sources for the resolution table and the stylesheet list.
//!
//! Both documents are JSON: the table is `{"imports": {...}}` and the
//! stylesheet list is an array of hrefs. [`FileManifest`] reads them from
//! disk, [`HttpManifest`] over HTTP (by default from
//! `/importmaps/imports.json` and `/importmaps/stylesheets.json` under the
//! base URL).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::core::config::{
    Config, ConfigError, DocumentLocation, DEFAULT_MANIFEST_PATH, DEFAULT_STYLESHEETS_PATH,
};
use crate::resolution::{ImportMap, ResolutionError};

/// Errors from reading wiring documents.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed resolution table: {0}")]
    Manifest(#[from] ResolutionError),

    #[error("malformed stylesheet list from {origin}: {message}")]
    Stylesheets { origin: String, message: String },
}

/// Where the engine reads its wiring from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn import_map(&self) -> Result<ImportMap, WiringError>;

    async fn stylesheets(&self) -> Result<Vec<String>, WiringError>;
}

fn parse_stylesheets(text: &str, origin: &str) -> Result<Vec<String>, WiringError> {
    serde_json::from_str(text).map_err(|e| WiringError::Stylesheets {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}

/// Wiring documents on disk.
#[derive(Debug, Clone)]
pub struct FileManifest {
    imports: PathBuf,
    stylesheets: Option<PathBuf>,
}

impl FileManifest {
    /// `stylesheets: None` means the page has no stylesheet list.
    pub fn new(imports: impl Into<PathBuf>, stylesheets: Option<PathBuf>) -> Self {
        Self {
            imports: imports.into(),
            stylesheets,
        }
    }

    fn read(path: &Path) -> Result<String, WiringError> {
        std::fs::read_to_string(path).map_err(|source| WiringError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl ManifestSource for FileManifest {
    async fn import_map(&self) -> Result<ImportMap, WiringError> {
        debug!(path = %self.imports.display(), "reading resolution table");
        let text = Self::read(&self.imports)?;
        Ok(ImportMap::from_json(&text)?)
    }

    async fn stylesheets(&self) -> Result<Vec<String>, WiringError> {
        match &self.stylesheets {
            None => Ok(Vec::new()),
            Some(path) => {
                let text = Self::read(path)?;
                parse_stylesheets(&text, &path.display().to_string())
            }
        }
    }
}

/// Wiring documents over HTTP.
#[derive(Debug, Clone)]
pub struct HttpManifest {
    client: reqwest::Client,
    imports: Url,
    stylesheets: Url,
}

impl HttpManifest {
    /// Read both documents from their fixed paths under `base`.
    pub fn from_base(base: &Url) -> Result<Self, WiringError> {
        let join = |path: &str| {
            base.join(path).map_err(|e| WiringError::Fetch {
                url: format!("{}{}", base, path),
                message: e.to_string(),
            })
        };
        Ok(Self::new(join(DEFAULT_MANIFEST_PATH)?, join(DEFAULT_STYLESHEETS_PATH)?))
    }

    pub fn new(imports: Url, stylesheets: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            imports,
            stylesheets,
        }
    }

    async fn get(&self, url: &Url) -> Result<String, WiringError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| WiringError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WiringError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| WiringError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ManifestSource for HttpManifest {
    async fn import_map(&self) -> Result<ImportMap, WiringError> {
        debug!(url = %self.imports, "fetching resolution table");
        let text = self.get(&self.imports).await?;
        Ok(ImportMap::from_json(&text)?)
    }

    async fn stylesheets(&self) -> Result<Vec<String>, WiringError> {
        let text = self.get(&self.stylesheets).await?;
        parse_stylesheets(&text, self.stylesheets.as_str())
    }
}

/// Wiring held in memory. Used by embedders that build the table
/// themselves, and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticManifest {
    map: ImportMap,
    stylesheets: Vec<String>,
}

impl StaticManifest {
    pub fn new(map: ImportMap, stylesheets: Vec<String>) -> Self {
        Self { map, stylesheets }
    }
}

#[async_trait]
impl ManifestSource for StaticManifest {
    async fn import_map(&self) -> Result<ImportMap, WiringError> {
        Ok(self.map.clone())
    }

    async fn stylesheets(&self) -> Result<Vec<String>, WiringError> {
        Ok(self.stylesheets.clone())
    }
}

/// Pick a source from configuration.
///
/// Both documents must come from the same kind of location.
pub fn source_from_config(config: &Config) -> Result<Arc<dyn ManifestSource>, ConfigError> {
    match (config.manifest_location()?, config.stylesheets_location()?) {
        (DocumentLocation::File(imports), DocumentLocation::File(styles)) => {
            Ok(Arc::new(FileManifest::new(imports, Some(styles))))
        }
        (DocumentLocation::Remote(imports), DocumentLocation::Remote(styles)) => {
            Ok(Arc::new(HttpManifest::new(imports, styles)))
        }
        _ => Err(ConfigError::InvalidValue(
            "manifest and stylesheets must both be files or both urls".into(),
        )),
    }
}
