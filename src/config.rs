use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{blob_store::StoreOptions, dirs::Dirs};

pub const IMAGE_CACHE_FILE: &str = "imgcache";
pub const IMAGE_CACHE_MAX_ENTRIES: usize = 5000;
pub const IMAGE_CACHE_MAX_BYTES: u64 = 200 * 1024 * 1024;
pub const IMAGE_CACHE_VERSION: u32 = 7;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub file_name: String,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub version: u32,
    pub thumbnail_size: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: Dirs::Cache.path(),
            file_name: IMAGE_CACHE_FILE.to_string(),
            max_entries: IMAGE_CACHE_MAX_ENTRIES,
            max_bytes: IMAGE_CACHE_MAX_BYTES,
            version: IMAGE_CACHE_VERSION,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl CacheSettings {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
            reset: false,
            version: self.version,
        }
    }
}

/// Persistent flag telling whether files from an older cache format may still
/// be lying around.
pub trait Preferences {
    fn cache_up_to_date(&self) -> bool;
    fn mark_cache_up_to_date(&mut self) -> Result<(), ConfigError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    pub cache_up_to_date: bool,
}

impl Preferences for MemoryPreferences {
    fn cache_up_to_date(&self) -> bool {
        self.cache_up_to_date
    }

    fn mark_cache_up_to_date(&mut self) -> Result<(), ConfigError> {
        self.cache_up_to_date = true;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    cache_up_to_date: Option<bool>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(skip)]
    path: Option<PathBuf>,
}

pub enum ConfigModification {
    MarkCacheUpToDate,
}

impl Config {
    pub fn default_path() -> PathBuf {
        Dirs::Config.path().join("config.toml")
    }

    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Config, ConfigError> {
        let mut config = if config_path.exists() {
            let mut file = File::open(config_path)?;
            let mut buf = String::new();
            file.read_to_string(&mut buf)?;
            toml::from_str::<Config>(&buf)?
        } else {
            Config::default()
        };
        config.path = Some(config_path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = self.path.clone().unwrap_or_else(Self::default_path);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(config_path)?;
        file.write_all(toml::to_string(self)?.as_bytes())?;
        Ok(())
    }

    pub fn modify(&mut self, modification: ConfigModification) -> Result<(), ConfigError> {
        match modification {
            ConfigModification::MarkCacheUpToDate => {
                self.cache_up_to_date = Some(true);
            }
        }

        self.save()?;
        Ok(())
    }
}

impl Preferences for Config {
    fn cache_up_to_date(&self) -> bool {
        self.cache_up_to_date.unwrap_or(false)
    }

    fn mark_cache_up_to_date(&mut self) -> Result<(), ConfigError> {
        self.modify(ConfigModification::MarkCacheUpToDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(!config.cache_up_to_date());
        assert_eq!(config.cache.file_name, IMAGE_CACHE_FILE);
        assert_eq!(config.cache.max_entries, IMAGE_CACHE_MAX_ENTRIES);
        assert_eq!(config.cache.max_bytes, IMAGE_CACHE_MAX_BYTES);
        assert_eq!(config.cache.version, IMAGE_CACHE_VERSION);
    }

    #[test]
    fn test_mark_up_to_date_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        config.mark_cache_up_to_date().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded.cache_up_to_date());
    }

    #[test]
    fn test_partial_cache_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            concat!(
                "cache_up_to_date = true\n",
                "[cache]\n",
                "directory = \"/var/cache/thumbs\"\n",
                "max_entries = 10\n",
            ),
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.cache_up_to_date());
        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/thumbs"));
        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.file_name, IMAGE_CACHE_FILE);
        assert_eq!(
            config.cache.store_path(),
            PathBuf::from("/var/cache/thumbs/imgcache")
        );
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cache_up_to_date = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_store_options() {
        let options = CacheSettings::in_directory("/tmp/x").store_options();
        assert!(!options.reset);
        assert_eq!(options.version, IMAGE_CACHE_VERSION);
    }
}
