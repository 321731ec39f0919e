//! Get-or-create and invalidation of cached thumbnails.
//!
//! Every operation on a source runs under that source's lock from the lock registry, so
//! generation and invalidation of one namespace are strictly serialized while different
//! sources proceed in parallel. Lock guards are dropped on every return path.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::cache::{self, CacheStore, LockRegistry, StoreError, StoredFile};
use crate::config::{SizeTable, ThumbnailConfig};
use crate::images::{self, CropMode, FetchError, ImageFormat, SourceFetcher, TransformError};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image access failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unsupported image: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub source: String,
    size: Option<String>,
    pub mode: CropMode,
    pub format: ImageFormat,
}

impl ThumbnailRequest {
    /// An empty `size` asks for the original image.
    pub fn new(
        source: impl Into<String>,
        size: Option<String>,
        mode: CropMode,
        format: ImageFormat,
    ) -> Self {
        Self {
            source: source.into(),
            size: size.filter(|s| !s.is_empty()),
            mode,
            format,
        }
    }

    pub fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }
}

/// A cached thumbnail opened for streaming.
#[derive(Debug)]
pub struct Thumbnail {
    pub stored: StoredFile,
    pub file_name: String,
    pub format: ImageFormat,
    /// `true` when served from an existing cache entry.
    pub cache_hit: bool,
}

impl Thumbnail {
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

pub struct ThumbnailService {
    sizes: SizeTable,
    store: CacheStore,
    locks: LockRegistry,
    fetcher: Arc<dyn SourceFetcher>,
    default_mode: CropMode,
    default_format: ImageFormat,
}

impl ThumbnailService {
    pub fn new(sizes: SizeTable, store: CacheStore, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            sizes,
            store,
            locks: LockRegistry::new(),
            fetcher,
            default_mode: CropMode::default(),
            default_format: ImageFormat::default(),
        }
    }

    pub fn from_config(config: &ThumbnailConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self::new(config.size_table(), CacheStore::new(&config.path), fetcher)
            .with_defaults(config.default_mode, config.default_format)
    }

    pub fn with_defaults(mut self, mode: CropMode, format: ImageFormat) -> Self {
        self.default_mode = mode;
        self.default_format = format;
        self
    }

    pub fn default_mode(&self) -> CropMode {
        self.default_mode
    }

    pub fn default_format(&self) -> ImageFormat {
        self.default_format
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Path of the cache file that serves `request`.
    pub fn entry_path(&self, request: &ThumbnailRequest) -> PathBuf {
        self.store.entry_path(
            &cache::encode_source(&request.source),
            &cache::file_name(request.size(), request.mode, request.format),
        )
    }

    fn validate(&self, request: &ThumbnailRequest) -> Result<Option<u32>, ThumbnailError> {
        if request.source.trim().is_empty() {
            return Err(ThumbnailError::InvalidRequest("The url is required".to_string()));
        }

        match request.size() {
            None => Ok(None),
            Some(size) => self.sizes.edge(size).map(Some).ok_or_else(|| {
                ThumbnailError::InvalidRequest(format!(
                    "Invalid size. Must be one of the following: {}",
                    self.sizes.labels().join(", ")
                ))
            }),
        }
    }

    /// Serve the thumbnail for `request`, generating and caching it on a miss.
    ///
    /// `authorization` is forwarded to the source fetcher on a miss.
    pub async fn get_or_create(
        &self,
        request: &ThumbnailRequest,
        authorization: Option<&str>,
    ) -> Result<Thumbnail, ThumbnailError> {
        // Rejected before any lock or I/O
        let edge = self.validate(request)?;

        let namespace = cache::encode_source(&request.source);
        let file_name = cache::file_name(request.size(), request.mode, request.format);
        let path = self.store.entry_path(&namespace, &file_name);

        let _guard = self.locks.acquire(&namespace).await;

        if self.store.exists(&path).await? {
            debug!("Cache hit for {} ({})", request.source, file_name);
            let stored = self.store.open(&path).await?;
            return Ok(Thumbnail {
                stored,
                file_name,
                format: request.format,
                cache_hit: true,
            });
        }

        debug!("Cache miss for {} ({})", request.source, file_name);

        let source = self.fetcher.fetch(&request.source, authorization).await.map_err(|e| {
            warn!("Failed to fetch {}: {}", request.source, e);
            e
        })?;

        let resize = edge.map(|edge| (request.mode, edge));
        let format = request.format;
        let encoded = tokio::task::spawn_blocking(move || images::transform(&source, resize, format))
            .await
            .map_err(|e| TransformError::Aborted(e.to_string()))?
            .map_err(|e| {
                warn!("Failed to transform {}: {}", request.source, e);
                e
            })?;

        self.store.write(&path, &encoded).await?;
        info!("Generated {} for {}", file_name, request.source);

        // Opened before the guard drops so a concurrent invalidation cannot remove it first
        let stored = self.store.open(&path).await?;

        Ok(Thumbnail {
            stored,
            file_name,
            format: request.format,
            cache_hit: false,
        })
    }

    /// Delete the original and every derivative cached for `source`.
    ///
    /// Succeeds whether or not anything was cached.
    pub async fn invalidate(&self, source: &str) -> Result<(), ThumbnailError> {
        if source.trim().is_empty() {
            return Err(ThumbnailError::InvalidRequest("The url is required".to_string()));
        }

        let namespace = cache::encode_source(source);
        let guard = self.locks.acquire(&namespace).await;

        let removed = self.store.delete_namespace(&namespace).await?;
        guard.release();

        if removed {
            info!("Cleared thumbnail cache for {}", source);
        } else {
            debug!("No cached thumbnails for {}", source);
        }
        Ok(())
    }
}
