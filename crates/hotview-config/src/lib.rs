//! Configuration management for hotview.
//!
//! Parses `hotview.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `server.host` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override served root directory.
    pub root: Option<PathBuf>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "hotview.toml";

/// Default document served for `/`.
const DEFAULT_DOCUMENT: &str = "index.html";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Site configuration (root is a relative string from TOML).
    site: SiteConfigRaw,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,

    /// Resolved site configuration (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Raw site configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    root: Option<String>,
    default_document: Option<String>,
    required_files: Option<Vec<String>>,
}

/// Resolved site configuration with an absolute root.
#[derive(Debug)]
pub struct SiteConfig {
    /// Directory served over HTTP.
    pub root: PathBuf,
    /// Document served for `/`, relative to `root`.
    pub default_document: String,
    /// Files that must exist under `root` before the server starts.
    pub required_files: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            default_document: DEFAULT_DOCUMENT.to_owned(),
            required_files: vec![DEFAULT_DOCUMENT.to_owned()],
        }
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
    /// Path of the event-stream endpoint.
    pub endpoint: String,
    /// Files to watch, relative to the site root.
    ///
    /// Defaults to the default document when unset.
    pub watch: Option<Vec<String>>,
    /// Interval between modification time samples.
    pub poll_interval_ms: u64,
    /// Delay between detecting a change and notifying clients.
    pub debounce_ms: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/sse".to_owned(),
            watch: None,
            poll_interval_ms: 1000,
            debounce_ms: 100,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `hotview.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(root) = &settings.root {
            self.site_resolved.root.clone_from(root);
        }
        if let Some(live_reload_enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = live_reload_enabled;
        }
    }

    /// Watched files as absolute paths under the site root.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        match &self.live_reload.watch {
            Some(files) => files
                .iter()
                .map(|f| self.site_resolved.root.join(f))
                .collect(),
            None => vec![
                self.site_resolved
                    .root
                    .join(&self.site_resolved.default_document),
            ],
        }
    }

    /// Required files that are absent from the site root.
    ///
    /// Returned names are as written in the configuration.
    #[must_use]
    pub fn missing_required_files(&self) -> Vec<String> {
        self.site_resolved
            .required_files
            .iter()
            .filter(|f| !self.site_resolved.root.join(f).exists())
            .cloned()
            .collect()
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            live_reload: LiveReloadConfig::default(),
            site_resolved: SiteConfig {
                root: base.to_path_buf(),
                ..SiteConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_site()?;
        self.validate_live_reload()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate site configuration.
    fn validate_site(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.site_resolved.default_document, "site.default_document")
    }

    /// Validate live reload configuration.
    fn validate_live_reload(&self) -> Result<(), ConfigError> {
        let endpoint = &self.live_reload.endpoint;
        if !endpoint.starts_with('/') || endpoint.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "live_reload.endpoint must be a path below /, got {endpoint:?}"
            )));
        }

        // Substituted verbatim into the client script
        if let Some(c) = endpoint.chars().find(|&c| matches!(c, '\'' | '\\' | '<')) {
            return Err(ConfigError::Validation(format!(
                "live_reload.endpoint cannot contain {c:?}, got {endpoint:?}"
            )));
        }

        if self.live_reload.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "live_reload.poll_interval_ms must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let default_document = self
            .site
            .default_document
            .clone()
            .unwrap_or_else(|| DEFAULT_DOCUMENT.to_owned());
        let required_files = self
            .site
            .required_files
            .clone()
            .unwrap_or_else(|| vec![default_document.clone()]);

        self.site_resolved = SiteConfig {
            root: self
                .site
                .root
                .as_deref()
                .map_or_else(|| config_dir.to_path_buf(), |r| config_dir.join(r)),
            default_document,
            required_files,
        };
    }
}
