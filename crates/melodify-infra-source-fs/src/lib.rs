use melodify_ports::config::{ConfigError, Options, OptionsStorePort};
use melodify_ports::source::{SourceError, SourcePort};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves score locations against the local filesystem. Accepts plain
/// paths and `file://` URLs; any other scheme is refused rather than
/// guessed at.
pub struct FsSource;

impl FsSource {
    pub fn new() -> Self {
        Self
    }

    fn resolve(source: &str) -> Result<PathBuf, SourceError> {
        if let Some(rest) = source.strip_prefix("file://") {
            return Ok(PathBuf::from(rest));
        }
        if let Some((scheme, _)) = source.split_once("://") {
            return Err(SourceError::UnsupportedScheme(scheme.to_string()));
        }
        Ok(PathBuf::from(source))
    }
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SourcePort for FsSource {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, SourceError> {
        let path = Self::resolve(source)?;
        if !path.exists() {
            return Err(SourceError::NotFound(source.to_string()));
        }
        fs::read(&path).map_err(|e| SourceError::Io(e.to_string()))
    }
}

pub struct FsOptionsStore {
    base_dir: PathBuf,
}

impl FsOptionsStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| ConfigError::Io("config dir not found".to_string()))?;
        Ok(base.join("Melodify"))
    }

    fn options_path(&self) -> PathBuf {
        self.base_dir.join("options.json")
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let data = fs::read(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| ConfigError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| ConfigError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

impl Default for FsOptionsStore {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_dir }
    }
}

impl OptionsStorePort for FsOptionsStore {
    fn load_options(&self) -> Result<Options, ConfigError> {
        let path = self.options_path();
        if !path.exists() {
            return Ok(Options::default());
        }
        Self::read_json(&path)
    }

    fn save_options(&self, options: &Options) -> Result<(), ConfigError> {
        let path = self.options_path();
        Self::write_json(&path, options)
    }
}
