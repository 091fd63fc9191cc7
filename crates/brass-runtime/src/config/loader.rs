//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`brass.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`brass.yaml`, `brass.yml`)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`brass.{profile}.toml` / `brass.{profile}.yaml`)
//! 4. Main config file (`brass.toml` / `brass.yaml`)
//! 5. Environment variables (`BRASS_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `BRASS_` prefix with `__` as separator:
//!
//! - `BRASS_SERVER__PORT=8080` → `server.port = 8080`
//! - `BRASS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `BRASS_APP__SCOPE=tenant-a` → `app.scope = "tenant-a"`
//!
//! # Example
//!
//! ```rust,ignore
//! use brass_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/brass.toml")
//!     .load()?;
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BrassConfig;

const ENV_PREFIX: &str = "BRASS_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `BRASS_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("BRASS_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    profile: Profile,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically.
    ///
    /// ```rust,ignore
    /// let config = ConfigLoader::new()
    ///     .merge(BrassConfig {
    ///         server: ServerConfig { port: 8080, ..Default::default() },
    ///         ..Default::default()
    ///     })
    ///     .load()?;
    /// ```
    pub fn merge(mut self, config: BrassConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<BrassConfig> {
        let profile = self.profile.clone();
        let config: BrassConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            port = config.server.port,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(BrassConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    fn candidate_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("brass")))
            .collect()
    }

    /// Merges the first base file found, preceded by its profile variant
    /// (`brass.production.toml` next to `brass.toml`).
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.candidate_dirs();
        let found = search_paths.iter().find_map(|dir| {
            FORMATS.iter().find_map(|format| {
                format
                    .files
                    .iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.is_file())
                    .map(|path| (format, path))
            })
        });

        let Some((format, path)) = found else {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
            return figment;
        };

        let profile_path = profile_variant(&path, &self.profile);
        if profile_path.is_file() {
            debug!(path = %profile_path.display(), "Loading profile-specific config");
            figment = (format.merge)(figment, &profile_path);
        }
        info!(path = %path.display(), "Loading configuration file");
        (format.merge)(figment, &path)
    }
}

/// A supported file format and the base file names searched for it.
struct FileFormat {
    extensions: &'static [&'static str],
    files: &'static [&'static str],
    merge: fn(Figment, &Path) -> Figment,
}

const FORMATS: &[FileFormat] = &[
    #[cfg(feature = "toml-config")]
    FileFormat {
        extensions: &["toml"],
        files: &["brass.toml", "config.toml"],
        merge: merge_toml,
    },
    #[cfg(feature = "yaml-config")]
    FileFormat {
        extensions: &["yaml", "yml"],
        files: &["brass.yaml", "brass.yml"],
        merge: merge_yaml,
    },
];

#[cfg(feature = "toml-config")]
fn merge_toml(figment: Figment, path: &Path) -> Figment {
    figment.merge(Toml::file(path))
}

#[cfg(feature = "yaml-config")]
fn merge_yaml(figment: Figment, path: &Path) -> Figment {
    figment.merge(Yaml::file(path))
}

/// Merges `path` if its extension belongs to an enabled format.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    FORMATS
        .iter()
        .find(|format| format.extensions.contains(&ext))
        .map(|format| (format.merge)(figment, path))
        .ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
}

/// `dir/brass.toml` becomes `dir/brass.{profile}.toml`.
fn profile_variant(path: &Path, profile: &Profile) -> PathBuf {
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    path.with_file_name(format!("{stem}.{profile}.{ext}"))
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<BrassConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, plus environment variables.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<BrassConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, ServerConfig};

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.server.addr(), "127.0.0.1:3000");
        assert!(config.app.scope.is_none());
    }

    #[test]
    fn test_programmatic_merge() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(BrassConfig {
                server: ServerConfig {
                    port: 8080,
                    ..Default::default()
                },
                ..Default::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/brass.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brass.ini");
        std::fs::write(&path, "port = 1").unwrap();

        let err = ConfigLoader::new().file(&path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_under_base_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("brass.toml"),
            "[server]\nport = 4000\n\n[app]\nscope = \"base\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("brass.production.toml"),
            "[server]\nhost = \"0.0.0.0\"\nport = 5000\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("prod")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.app.scope.as_deref(), Some("base"));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".to_string()));
    }
}
