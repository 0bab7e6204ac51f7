//! Configuration for the kiln workspace: `watch`, `storage`, and `api`
//! sections, loaded from a TOML or YAML file with environment-variable and
//! CLI-flag overrides.
//!
//! Precedence, highest first: explicit CLI flag (applied via
//! [`ConfigBuilder`]) > `KILN_*` environment variable > config file >
//! built-in default. Missing sections in a file fall back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported config file extension: {0}")]
    UnsupportedExtension(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from(".")],
            extensions: vec![".md".to_string(), ".markdown".to_string()],
            debounce_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("kiln.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8420,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load from `path` if given (TOML or YAML, chosen by extension),
    /// falling back to defaults when the file does not exist. Applies
    /// `KILN_*` environment variable overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&raw).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            }),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
            other => Err(ConfigError::UnsupportedExtension(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("KILN_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("KILN_WATCH_ROOTS") {
            self.watch.roots = value.split(',').map(|s| PathBuf::from(s.trim())).collect();
        }
        if let Ok(value) = std::env::var("KILN_WATCH_EXTENSIONS") {
            self.watch.extensions = value.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(value) = std::env::var("KILN_WATCH_DEBOUNCE_MS") {
            if let Ok(parsed) = value.parse() {
                self.watch.debounce_ms = parsed;
            }
        }
        if let Ok(value) = std::env::var("KILN_API_HOST") {
            self.api.host = value;
        }
        if let Ok(value) = std::env::var("KILN_API_PORT") {
            if let Ok(parsed) = value.parse() {
                self.api.port = parsed;
            }
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Other(anyhow::anyhow!(e)))
    }
}

/// Applies CLI-flag overrides on top of an already-loaded `Config`. CLI
/// flags are the highest-precedence source.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    pub fn watch_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.watch.roots = roots;
        self
    }

    pub fn api_port(mut self, port: u16) -> Self {
        self.config.api.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    fn clear_env() {
        for key in [
            "KILN_DATABASE_PATH",
            "KILN_WATCH_ROOTS",
            "KILN_WATCH_EXTENSIONS",
            "KILN_WATCH_DEBOUNCE_MS",
            "KILN_API_HOST",
            "KILN_API_PORT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn load_missing_file_falls_back_to_defaults() {
        clear_env();
        let config = Config::load(Some(Path::new("/nonexistent/kiln.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn load_valid_toml() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            [watch]
            roots = ["notes"]
            extensions = [".md"]
            debounce_ms = 500

            [storage]
            database_path = "notes.db"

            [api]
            host = "0.0.0.0"
            port = 9000
            "#
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.watch.roots, vec![PathBuf::from("notes")]);
        assert_eq!(config.watch.debounce_ms, 500);
        assert_eq!(config.storage.database_path, PathBuf::from("notes.db"));
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    #[serial]
    fn invalid_toml_errors() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiln.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_apply_after_file_load() {
        clear_env();
        std::env::set_var("KILN_DATABASE_PATH", "/tmp/from-env.db");
        std::env::set_var("KILN_API_PORT", "1234");
        let config = Config::load(None).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/from-env.db"));
        assert_eq!(config.api.port, 1234);
        clear_env();
    }

    #[test]
    #[serial]
    fn cli_builder_overrides_win_over_env_and_file() {
        clear_env();
        std::env::set_var("KILN_API_PORT", "1234");
        let loaded = Config::load(None).unwrap();
        let config = ConfigBuilder::from_config(loaded).api_port(9999).build();
        assert_eq!(config.api.port, 9999);
        clear_env();
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.watch.roots, vec![PathBuf::from(".")]);
        assert!(config.watch.extensions.contains(&".md".to_string()));
        assert_eq!(config.api.port, 8420);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let serialized = config.to_toml_string().unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, parsed);
    }
}
