//! Configuration management for Folio Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Error raised for malformed environment values
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub file_groups: FileGroups,
    pub cache: CacheSettings,
    pub fetch: FetchConfig,
    pub registry_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// File-use categories (METS `fileGrp@USE`) in priority order
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileGroups {
    pub images: Vec<String>,
    pub thumbs: Vec<String>,
    pub download: Vec<String>,
    pub fulltext: Vec<String>,
    pub audio: Vec<String>,
}

impl FileGroups {
    /// Every configured category, without duplicates
    pub fn all(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for group in self
            .images
            .iter()
            .chain(&self.thumbs)
            .chain(&self.download)
            .chain(&self.fulltext)
            .chain(&self.audio)
        {
            if !all.contains(group) {
                all.push(group.clone());
            }
        }
        all
    }
}

impl Default for FileGroups {
    fn default() -> Self {
        FileGroups {
            images: split_list("DEFAULT,MAX"),
            thumbs: split_list("THUMBS"),
            download: split_list("DOWNLOAD"),
            fulltext: split_list("FULLTEXT"),
            audio: split_list("AUDIO"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub max_documents: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Accept `file://` document and file locations
    pub allow_file_locations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            file_groups: FileGroups::default(),
            cache: CacheSettings { max_documents: 100 },
            fetch: FetchConfig {
                timeout_secs: 30,
                allow_file_locations: false,
            },
            registry_path: None,
        }
    }
}

/// Split a comma list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let list = |name: &str, default: &str| {
            split_list(&lookup(name).unwrap_or_else(|| default.to_string()))
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_value("SERVER_PORT", lookup("SERVER_PORT"), 3000)?,
            },
            file_groups: FileGroups {
                images: list("FILE_GRP_IMAGES", "DEFAULT,MAX"),
                thumbs: list("FILE_GRP_THUMBS", "THUMBS"),
                download: list("FILE_GRP_DOWNLOAD", "DOWNLOAD"),
                fulltext: list("FILE_GRP_FULLTEXT", "FULLTEXT"),
                audio: list("FILE_GRP_AUDIO", "AUDIO"),
            },
            cache: CacheSettings {
                max_documents: parse_value("DOCUMENT_CACHE_SIZE", lookup("DOCUMENT_CACHE_SIZE"), 100)?,
            },
            fetch: FetchConfig {
                timeout_secs: parse_value("FETCH_TIMEOUT_SECS", lookup("FETCH_TIMEOUT_SECS"), 30)?,
                allow_file_locations: parse_value(
                    "ALLOW_FILE_LOCATIONS",
                    lookup("ALLOW_FILE_LOCATIONS"),
                    false,
                )?,
            },
            registry_path: lookup("REGISTRY_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
