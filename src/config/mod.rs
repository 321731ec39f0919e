use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::images::{CropMode, ImageFormat};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid size label '{0}': labels must be non-empty and free of path separators, quotes and control characters")]
    InvalidSizeLabel(String),

    #[error("Size '{0}' must map to a positive pixel edge")]
    InvalidSizeEdge(String),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    /// Fetch timeout in seconds.
    pub timeout: u64,
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThumbnailConfig {
    /// Root directory of the thumbnail cache.
    pub path: PathBuf,
    /// Prefix joined with a source identifier to build the fetch URL. Should end with a slash.
    pub host_url: String,
    pub supported_sizes: HashMap<String, u32>,
    #[serde(default)]
    pub default_mode: CropMode,
    #[serde(default)]
    pub default_format: ImageFormat,
    /// `max-age` sent to clients with served thumbnails.
    #[serde(default = "default_max_age")]
    pub max_age: u64,
}

fn default_max_age() -> u64 {
    86400
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thumbnails.validate()
    }
}

impl ThumbnailConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("thumbnails.path"));
        }
        if self.host_url.trim().is_empty() {
            return Err(ConfigError::Missing("thumbnails.host_url"));
        }
        for (label, edge) in &self.supported_sizes {
            if label.is_empty()
                || label.contains(['/', '\\', '"'])
                || label.contains("..")
                || label.chars().any(char::is_control)
            {
                return Err(ConfigError::InvalidSizeLabel(label.clone()));
            }
            if *edge == 0 {
                return Err(ConfigError::InvalidSizeEdge(label.clone()));
            }
        }
        Ok(())
    }

    pub fn size_table(&self) -> SizeTable {
        SizeTable::new(self.supported_sizes.clone())
    }
}

/// Named thumbnail sizes mapped to their target edge length in pixels.
#[derive(Debug, Clone, Default)]
pub struct SizeTable {
    sizes: HashMap<String, u32>,
}

impl SizeTable {
    pub fn new(sizes: HashMap<String, u32>) -> Self {
        Self { sizes }
    }

    pub fn edge(&self, label: &str) -> Option<u32> {
        self.sizes.get(label).copied()
    }

    /// Labels in a stable order, for error messages.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.sizes.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

impl<const N: usize> From<[(&str, u32); N]> for SizeTable {
    fn from(entries: [(&str, u32); N]) -> Self {
        Self::new(
            entries
                .into_iter()
                .map(|(label, edge)| (label.to_string(), edge))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumbnail_config(sizes: &[(&str, u32)]) -> ThumbnailConfig {
        ThumbnailConfig {
            path: PathBuf::from("/tmp/thumbnails"),
            host_url: "http://localhost:5000/".to_string(),
            supported_sizes: sizes.iter().map(|(l, e)| (l.to_string(), *e)).collect(),
            default_mode: CropMode::default(),
            default_format: ImageFormat::default(),
            max_age: default_max_age(),
        }
    }

    #[test]
    fn accepts_plain_labels() {
        let config = thumbnail_config(&[("small", 50), ("medium", 300)]);
        assert!(config.validate().is_ok());
        assert_eq!(config.size_table().edge("medium"), Some(300));
        assert_eq!(config.size_table().labels(), vec!["medium", "small"]);
    }

    #[test]
    fn rejects_labels_that_escape_the_namespace() {
        for label in ["", "../up", "a/b", "a\\b"] {
            let config = thumbnail_config(&[(label, 50)]);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidSizeLabel(_))),
                "label {label:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_labels_that_break_header_values() {
        for label in ["big\"", "x\"; filename=\"evil", "line\r\nbreak", "tab\t", "nul\0"] {
            let config = thumbnail_config(&[(label, 50)]);
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidSizeLabel(_))),
                "label {label:?} should be rejected"
            );
        }
        assert!(thumbnail_config(&[("x-large 2", 50)]).validate().is_ok());
    }

    #[test]
    fn rejects_zero_edge() {
        let config = thumbnail_config(&[("tiny", 0)]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSizeEdge(_))));
    }

    #[test]
    fn rejects_missing_host() {
        let mut config = thumbnail_config(&[("small", 50)]);
        config.host_url = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("thumbnails.host_url"))));
    }

    #[test]
    fn deserializes_defaults() {
        let config: ThumbnailConfig = serde_json::from_value(serde_json::json!({
            "path": "/var/cache/thumbnails",
            "host_url": "http://datastore/",
            "supported_sizes": { "small": 50 }
        }))
        .unwrap();
        assert_eq!(config.default_mode, CropMode::FillSquare);
        assert_eq!(config.default_format, ImageFormat::Jpeg);
        assert_eq!(config.max_age, 86400);
    }
}
