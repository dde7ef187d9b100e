use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::PageLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Shared secret for the payment, completion and sweep routes. Unset means those
    /// routes refuse every caller.
    pub system_token: Option<SecretString>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Period of the background expiry/completion sweep.
    pub sweep_interval_secs: u64,
    pub confirmation_prefix: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl WorkflowConfig {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits { default_limit: self.default_page_size, max_limit: self.max_page_size }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub server_port: Option<u16>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://voyage.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                system_token: None,
            },
            workflow: WorkflowConfig {
                sweep_interval_secs: 300,
                confirmation_prefix: "VG".to_string(),
                default_page_size: crate::search::DEFAULT_PAGE_LIMIT,
                max_page_size: crate::search::MAX_PAGE_LIMIT,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layers defaults, the TOML file, `VOYAGE_*` variables and explicit overrides, in that order.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;
        let mut config = Self::default();

        match locate_file(config_path.as_deref()) {
            Some(path) => read_file_layer(&path)?.merge_into(&mut config),
            None if require_file => {
                return Err(ConfigError::MissingConfigFile(
                    config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME)),
                ));
            }
            None => {}
        }

        EnvLayer::capture()?.merge_into(&mut config);
        overrides.merge_into(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_database()?;
        self.check_server()?;
        self.check_workflow()?;
        self.check_logging()
    }

    fn check_database(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        if !(url.starts_with("sqlite:") || url == ":memory:") {
            return Err(invalid(
                "database.url must point at sqlite (`sqlite://<path>` or `sqlite::memory:`)",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be at least 1"));
        }
        if !(1..=300).contains(&self.database.timeout_secs) {
            return Err(invalid("database.timeout_secs must be between 1 and 300"));
        }
        Ok(())
    }

    fn check_server(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.trim().is_empty() {
            return Err(invalid("server.bind_address must not be blank"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port must be a non-zero TCP port"));
        }
        if self.server.graceful_shutdown_secs == 0 {
            return Err(invalid("server.graceful_shutdown_secs must be at least 1"));
        }
        if let Some(token) = &self.server.system_token {
            if token.expose_secret().trim().len() < MIN_SYSTEM_TOKEN_LEN {
                return Err(ConfigError::Validation(format!(
                    "server.system_token must be at least {MIN_SYSTEM_TOKEN_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    fn check_workflow(&self) -> Result<(), ConfigError> {
        let workflow = &self.workflow;
        if !(1..=86_400).contains(&workflow.sweep_interval_secs) {
            return Err(invalid("workflow.sweep_interval_secs must be in range 1..=86400"));
        }

        let prefix = workflow.confirmation_prefix.as_str();
        let prefix_ok = (1..=6).contains(&prefix.len())
            && prefix.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit());
        if !prefix_ok {
            return Err(ConfigError::Validation(format!(
                "workflow.confirmation_prefix `{prefix}` must be 1-6 uppercase letters or digits"
            )));
        }

        if !(1..=500).contains(&workflow.max_page_size) {
            return Err(invalid("workflow.max_page_size must be in range 1..=500"));
        }
        if workflow.default_page_size == 0 || workflow.default_page_size > workflow.max_page_size {
            return Err(invalid(
                "workflow.default_page_size must be between 1 and workflow.max_page_size",
            ));
        }
        Ok(())
    }

    fn check_logging(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if LEVELS.contains(&self.logging.level.trim().to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ConfigError::Validation(format!(
                "logging.level `{}` is not one of {}",
                self.logging.level,
                LEVELS.join("|")
            )))
        }
    }
}

const DEFAULT_FILE_NAME: &str = "voyage.toml";
const MIN_SYSTEM_TOKEN_LEN: usize = 16;

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

fn secret(value: String) -> Option<SecretString> {
    Some(value.into())
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// An explicit path is used only when it exists; otherwise the working directory is probed.
fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => [PathBuf::from(DEFAULT_FILE_NAME), Path::new("config").join(DEFAULT_FILE_NAME)]
            .into_iter()
            .find(|candidate| candidate.is_file()),
    }
}

fn read_file_layer(path: &Path) -> Result<FileLayer, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let expanded = expand_env_references(&raw)?;
    toml::from_str(&expanded)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Substitutes every `${NAME}` in the raw file text with the value of that environment variable.
fn expand_env_references(raw: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &after_open[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        expanded.push_str(&value);
        rest = &after_open[end + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

fn env_text(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    env_text(key)
        .map(|value| {
            value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

/// Values read from `VOYAGE_*` variables.
/// `VOYAGE_LOG_LEVEL`/`VOYAGE_LOG_FORMAT` are accepted as aliases.
struct EnvLayer {
    database_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    system_token: Option<String>,
    sweep_interval_secs: Option<u64>,
    confirmation_prefix: Option<String>,
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
}

impl EnvLayer {
    fn capture() -> Result<Self, ConfigError> {
        let log_format = env_text("VOYAGE_LOGGING_FORMAT")
            .or_else(|| env_text("VOYAGE_LOG_FORMAT"))
            .map(|value| value.parse::<LogFormat>())
            .transpose()?;

        Ok(Self {
            database_url: env_text("VOYAGE_DATABASE_URL"),
            max_connections: env_parsed("VOYAGE_DATABASE_MAX_CONNECTIONS")?,
            timeout_secs: env_parsed("VOYAGE_DATABASE_TIMEOUT_SECS")?,
            bind_address: env_text("VOYAGE_SERVER_BIND_ADDRESS"),
            port: env_parsed("VOYAGE_SERVER_PORT")?,
            graceful_shutdown_secs: env_parsed("VOYAGE_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
            system_token: env_text("VOYAGE_SERVER_SYSTEM_TOKEN"),
            sweep_interval_secs: env_parsed("VOYAGE_WORKFLOW_SWEEP_INTERVAL_SECS")?,
            confirmation_prefix: env_text("VOYAGE_WORKFLOW_CONFIRMATION_PREFIX"),
            default_page_size: env_parsed("VOYAGE_WORKFLOW_DEFAULT_PAGE_SIZE")?,
            max_page_size: env_parsed("VOYAGE_WORKFLOW_MAX_PAGE_SIZE")?,
            log_level: env_text("VOYAGE_LOGGING_LEVEL").or_else(|| env_text("VOYAGE_LOG_LEVEL")),
            log_format,
        })
    }

    fn merge_into(self, config: &mut AppConfig) {
        replace(&mut config.database.url, self.database_url);
        replace(&mut config.database.max_connections, self.max_connections);
        replace(&mut config.database.timeout_secs, self.timeout_secs);
        replace(&mut config.server.bind_address, self.bind_address);
        replace(&mut config.server.port, self.port);
        replace(&mut config.server.graceful_shutdown_secs, self.graceful_shutdown_secs);
        replace(&mut config.server.system_token, self.system_token.map(secret));
        replace(&mut config.workflow.sweep_interval_secs, self.sweep_interval_secs);
        replace(&mut config.workflow.confirmation_prefix, self.confirmation_prefix);
        replace(&mut config.workflow.default_page_size, self.default_page_size);
        replace(&mut config.workflow.max_page_size, self.max_page_size);
        replace(&mut config.logging.level, self.log_level);
        replace(&mut config.logging.format, self.log_format);
    }
}

impl ConfigOverrides {
    fn merge_into(self, config: &mut AppConfig) {
        replace(&mut config.database.url, self.database_url);
        replace(&mut config.database.max_connections, self.database_max_connections);
        replace(&mut config.logging.level, self.log_level);
        replace(&mut config.logging.format, self.log_format);
        replace(&mut config.server.port, self.server_port);
        replace(&mut config.workflow.sweep_interval_secs, self.sweep_interval_secs);
    }
}

/// Sparse mirror of [`AppConfig`] as it appears in `voyage.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLayer {
    database: DatabaseSection,
    server: ServerSection,
    workflow: WorkflowSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseSection {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    system_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WorkflowSection {
    sweep_interval_secs: Option<u64>,
    confirmation_prefix: Option<String>,
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FileLayer {
    fn merge_into(self, config: &mut AppConfig) {
        let Self { database, server, workflow, logging } = self;

        replace(&mut config.database.url, database.url);
        replace(&mut config.database.max_connections, database.max_connections);
        replace(&mut config.database.timeout_secs, database.timeout_secs);

        replace(&mut config.server.bind_address, server.bind_address);
        replace(&mut config.server.port, server.port);
        replace(&mut config.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        replace(&mut config.server.system_token, server.system_token.map(secret));

        replace(&mut config.workflow.sweep_interval_secs, workflow.sweep_interval_secs);
        replace(&mut config.workflow.confirmation_prefix, workflow.confirmation_prefix);
        replace(&mut config.workflow.default_page_size, workflow.default_page_size);
        replace(&mut config.workflow.max_page_size, workflow.max_page_size);

        replace(&mut config.logging.level, logging.level);
        replace(&mut config.logging.format, logging.format);
    }
}
