use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";
pub const DEFAULT_OEMBED_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Static pages, scripts and background assets.
    pub serve_dir: PathBuf,
    /// Where collections are persisted. Kept in memory when unset.
    pub documents_dir: Option<PathBuf>,
    /// Channel info and social links served by `/api/content`.
    pub content_file: Option<PathBuf>,
    pub oembed_endpoint: String,
    /// How long to wait on YouTube before giving up on a lookup.
    pub oembed_timeout_secs: u64,
    /// Mark session cookies `Secure`. Turn off for plain http development.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            serve_dir: PathBuf::from("public"),
            documents_dir: None,
            content_file: None,
            oembed_endpoint: DEFAULT_OEMBED_ENDPOINT.to_owned(),
            oembed_timeout_secs: DEFAULT_OEMBED_TIMEOUT_SECS,
            secure_cookies: true,
        }
    }
}

impl ServerConfig {
    pub fn load(file: &Path) -> Result<Self, ConfigError> {
        load_json(file)
    }
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(file: &Path) -> Result<T, ConfigError> {
    let bytes = std::fs::read(file).map_err(|source| ConfigError::Read {
        path: file.to_owned(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: file.to_owned(),
        source,
    })
}
