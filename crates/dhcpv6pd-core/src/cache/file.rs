// # File Config Cache
//
// File-based ConfigWriter with crash recovery.
//
// ## Purpose
//
// Keeps the last accepted configuration across daemon restarts so the
// pipeline can start reconciling before the configuration system pushes
// the tree again.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Automatic backup: Keeps .backup of the previous cache
// - Recovery: Falls back to backup if the cache is corrupt
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "written_at": "2025-01-09T12:00:00Z",
//   "config": { "vyatta-interfaces-v1:interfaces": { ... } }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::ConfigTree;
use crate::traits::ConfigWriter;

/// Cache file format version
const CACHE_FILE_VERSION: &str = "1.0";

/// Serializable cache file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheFileFormat {
    version: String,
    written_at: DateTime<Utc>,
    config: ConfigTree,
}

/// Why a cache file could not be loaded
enum LoadFailure {
    /// The file exists but does not hold a valid cache
    Corrupt(String),
    /// The file could not be read at all
    Io(Error),
}

/// File-based config cache with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use dhcpv6pd_core::cache::FileConfigCache;
/// use dhcpv6pd_core::traits::ConfigWriter;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = FileConfigCache::new("/run/vci-dhcpv6-pd/config.cache").await?;
///
///     let tree = cache.load().await?;
///     cache.write_config(&tree).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileConfigCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigCache {
    /// Create a file config cache, creating parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config_cache(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached configuration
    ///
    /// Recovery strategy:
    /// 1. Missing cache file: empty tree
    /// 2. Corrupt cache file: load the backup and restore it over the cache
    /// 3. Corrupt or missing backup: empty tree
    pub async fn load(&self) -> Result<ConfigTree, Error> {
        match Self::load_file(&self.path).await {
            Ok(Some(tree)) => {
                tracing::debug!("Loaded cached config from {}", self.path.display());
                Ok(tree)
            }
            Ok(None) => {
                tracing::debug!("No cached config at {}", self.path.display());
                Ok(ConfigTree::empty())
            }
            Err(LoadFailure::Io(e)) => Err(e),
            Err(LoadFailure::Corrupt(reason)) => {
                tracing::warn!(
                    "Config cache appears corrupted: {}. Attempting recovery from backup.",
                    reason
                );
                let backup_path = Self::backup_path(&self.path);
                match Self::load_file(&backup_path).await {
                    Ok(Some(tree)) => {
                        tracing::info!("Recovered config from backup");
                        if let Err(e) = fs::copy(&backup_path, &self.path).await {
                            tracing::error!("Failed to restore config cache from backup: {}", e);
                        }
                        Ok(tree)
                    }
                    Ok(None) => {
                        tracing::warn!("No backup file found. Starting with empty config.");
                        Ok(ConfigTree::empty())
                    }
                    Err(LoadFailure::Corrupt(reason)) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty config.",
                            reason
                        );
                        Ok(ConfigTree::empty())
                    }
                    Err(LoadFailure::Io(e)) => Err(e),
                }
            }
        }
    }

    async fn load_file(path: &Path) -> Result<Option<ConfigTree>, LoadFailure> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LoadFailure::Io(Error::config_cache(format!(
                    "Failed to read config cache {}: {}",
                    path.display(),
                    e
                ))));
            }
        };

        let cache: CacheFileFormat = serde_json::from_str(&content)
            .map_err(|e| LoadFailure::Corrupt(format!("{}: {}", path.display(), e)))?;

        if cache.version != CACHE_FILE_VERSION {
            tracing::warn!(
                "Config cache version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                CACHE_FILE_VERSION,
                cache.version
            );
        }

        Ok(Some(cache.config))
    }

    /// Write the cache file atomically
    async fn write_file(&self, config: &ConfigTree) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let cache = CacheFileFormat {
            version: CACHE_FILE_VERSION.to_string(),
            written_at: Utc::now(),
            config: config.clone(),
        };
        let json = serde_json::to_string_pretty(&cache)
            .map_err(|e| Error::config_cache(format!("Failed to serialize config: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config_cache(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::config_cache(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::config_cache(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::config_cache(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Config cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl ConfigWriter for FileConfigCache {
    async fn write_config(&self, config: &ConfigTree) -> Result<(), Error> {
        self.write_file(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn tree(name: &str) -> ConfigTree {
        ConfigTree::new(json!({
            "vyatta-interfaces-v1:interfaces": {
                "vyatta-interfaces-dataplane-v1:dataplane": [{"tagnode": name}]
            }
        }))
    }

    #[tokio::test]
    async fn test_missing_cache_loads_empty_tree() {
        let dir = tempdir().unwrap();
        let cache = FileConfigCache::new(dir.path().join("sub").join("config.cache"))
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap(), ConfigTree::empty());
        assert!(dir.path().join("sub").exists());
    }

    #[tokio::test]
    async fn test_write_then_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.cache");

        let cache = FileConfigCache::new(&path).await.unwrap();
        cache.write_config(&tree("dp0s1")).await.unwrap();
        assert!(path.exists());

        let reloaded = FileConfigCache::new(&path).await.unwrap();
        assert_eq!(reloaded.load().await.unwrap(), tree("dp0s1"));
    }

    #[tokio::test]
    async fn test_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.cache");

        let cache = FileConfigCache::new(&path).await.unwrap();
        cache.write_config(&tree("dp0s1")).await.unwrap();
        cache.write_config(&tree("dp0s2")).await.unwrap();

        let backup_path = FileConfigCache::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = cache.load().await.unwrap();
        assert_eq!(
            recovered,
            tree("dp0s1"),
            "Backup should contain previous config, not latest"
        );

        // Restored over the corrupt file
        let again = FileConfigCache::new(&path).await.unwrap();
        assert_eq!(again.load().await.unwrap(), tree("dp0s1"));
    }

    #[tokio::test]
    async fn test_corrupt_without_backup_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.cache");
        fs::write(&path, b"{ nope").await.unwrap();

        let cache = FileConfigCache::new(&path).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), ConfigTree::empty());
    }
}
