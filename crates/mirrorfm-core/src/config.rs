//! Configuration module for MirrorFM.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MirrorFM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// URL of the single backend endpoint; the action goes in the query.
    pub endpoint: String,
    /// Per-request timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

/// Shared-secret storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Keyring service name the secret is stored under.
    pub keyring_service: String,
    /// Keyring account name the secret is stored under.
    pub keyring_user: String,
    /// Whether a secret entered after a re-auth challenge is saved.
    pub persist_secret: bool,
}

/// Upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of the body chunks (in KiB) between two progress reports.
    pub chunk_size_kb: u64,
    /// Ask before overwriting existing files. When false they are replaced.
    pub confirm_overwrite: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/mirrorfm/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("mirrorfm")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api".to_string(),
            timeout_secs: None,
            user_agent: format!("mirrorfm/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keyring_service: "mirrorfm".to_string(),
            keyring_user: "default".to_string(),
            persist_secret: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_kb: 64,
            confirm_overwrite: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"server.endpoint"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        let endpoint = self.server.endpoint.trim();
        if endpoint.is_empty() {
            errors.push(ValidationError {
                field: "server.endpoint".into(),
                message: "must not be empty".into(),
            });
        } else if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ValidationError {
                field: "server.endpoint".into(),
                message: format!("must be an http(s) URL, got '{endpoint}'"),
            });
        }
        if self.server.timeout_secs == Some(0) {
            errors.push(ValidationError {
                field: "server.timeout_secs".into(),
                message: "must be greater than 0 (omit it to disable the timeout)".into(),
            });
        }

        // --- auth ---
        if self.auth.keyring_service.is_empty() {
            errors.push(ValidationError {
                field: "auth.keyring_service".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.keyring_user.is_empty() {
            errors.push(ValidationError {
                field: "auth.keyring_user".into(),
                message: "must not be empty".into(),
            });
        }

        // --- upload ---
        if self.upload.chunk_size_kb == 0 {
            errors.push(ValidationError {
                field: "upload.chunk_size_kb".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use mirrorfm_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_endpoint("https://files.example.org/api")
///     .server_timeout_secs(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.server.endpoint = endpoint.into();
        self
    }

    pub fn server_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.timeout_secs = Some(seconds);
        self
    }

    pub fn server_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.server.user_agent = user_agent.into();
        self
    }

    // --- auth ---

    pub fn auth_keyring_service(mut self, service: impl Into<String>) -> Self {
        self.config.auth.keyring_service = service.into();
        self
    }

    pub fn auth_keyring_user(mut self, user: impl Into<String>) -> Self {
        self.config.auth.keyring_user = user.into();
        self
    }

    pub fn auth_persist_secret(mut self, persist: bool) -> Self {
        self.config.auth.persist_secret = persist;
        self
    }

    // --- upload ---

    pub fn upload_chunk_size_kb(mut self, kb: u64) -> Self {
        self.config.upload.chunk_size_kb = kb;
        self
    }

    pub fn upload_confirm_overwrite(mut self, confirm: bool) -> Self {
        self.config.upload.confirm_overwrite = confirm;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
