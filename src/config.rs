//! Configuration file management for certalert.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (`certalert.toml` or the one given with `--config`)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! sites_file = "/etc/certalert/sites.json"
//! timeout_secs = 5
//!
//! [smtp]
//! server = "mail.example.com"
//! port = 587
//! from = "cert-monitor@example.com"
//! starttls = true
//! username = "cert-monitor"
//! password = "secret"
//! timeout_secs = 30
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use crate::notify::SmtpSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "certalert.toml";

const DEFAULT_SITES_FILE: &str = "sites.json";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PROMETHEUS_ADDRESS: &str = "http://localhost:9091";

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Path of the JSON site registry
    pub sites_file: Option<String>,
    /// Timeout for certificate retrieval, in seconds
    pub timeout_secs: Option<u64>,
    /// Outgoing mail settings
    pub smtp: Option<SmtpConfig>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// SMTP relay used for alerts and reminders.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SmtpConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Sender address of every message
    pub from: Option<String>,
    /// Upgrade the connection with STARTTLS
    pub starttls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Timeout for one SMTP exchange, in seconds
    pub timeout_secs: Option<u64>,
}

/// Prometheus integration configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sites_file: PathBuf,
    pub timeout: Duration,
    pub smtp: SmtpSettings,
    /// Push gateway address, present only when pushing is enabled
    pub prometheus_address: Option<String>,
}

impl Default for Config {
    /// Creates a configuration with every value set to its default.
    fn default() -> Self {
        let smtp = SmtpSettings::default();
        Config {
            sites_file: Some(DEFAULT_SITES_FILE.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            smtp: Some(SmtpConfig {
                server: Some(smtp.server),
                port: Some(smtp.port),
                from: Some(smtp.from),
                starttls: Some(smtp.starttls),
                username: None,
                password: None,
                timeout_secs: Some(smtp.timeout.as_secs()),
            }),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some(DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            }),
        }
    }
}

impl Config {
    /// A configuration with nothing set, i.e. the identity for [`Config::merge_with`].
    pub fn empty() -> Self {
        Config {
            sites_file: None,
            timeout_secs: None,
            smtp: None,
            prometheus: None,
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use certalert::config::Config;
    /// let config = Config::from_file("certalert.toml")?;
    /// # Ok::<(), certalert::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads the file configuration layer.
    ///
    /// An explicitly named file must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is read if present and an empty layer is returned otherwise.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::empty())
                }
            }
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, a `Some` in `other` overrides this config's value; a
    /// `None` keeps the current one. Nested tables merge field by field.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.sites_file.is_some() {
            self.sites_file = other.sites_file;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if let Some(other_smtp) = other.smtp {
            let smtp = self.smtp.get_or_insert_with(SmtpConfig::default);
            if other_smtp.server.is_some() {
                smtp.server = other_smtp.server;
            }
            if other_smtp.port.is_some() {
                smtp.port = other_smtp.port;
            }
            if other_smtp.from.is_some() {
                smtp.from = other_smtp.from;
            }
            if other_smtp.starttls.is_some() {
                smtp.starttls = other_smtp.starttls;
            }
            if other_smtp.username.is_some() {
                smtp.username = other_smtp.username;
            }
            if other_smtp.password.is_some() {
                smtp.password = other_smtp.password;
            }
            if other_smtp.timeout_secs.is_some() {
                smtp.timeout_secs = other_smtp.timeout_secs;
            }
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) override other layers.
    pub fn from_cli_args(
        sites_file: Option<String>,
        timeout_secs: Option<u64>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        let prometheus = if prometheus.is_some() || prometheus_address.is_some() {
            Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            })
        } else {
            None
        };
        Config {
            sites_file,
            timeout_secs,
            smtp: None,
            prometheus,
        }
    }

    /// Validates the merged configuration and fills remaining gaps with defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let defaults = SmtpSettings::default();
        let smtp = self.smtp.clone().unwrap_or_default();
        let credentials = match (smtp.username, smtp.password) {
            (Some(username), Some(password)) => Some((username, password)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Validation(
                    "smtp.username and smtp.password must be set together".to_string(),
                ))
            }
        };
        let smtp_timeout = smtp.timeout_secs.unwrap_or(defaults.timeout.as_secs());
        if smtp_timeout == 0 {
            return Err(ConfigError::Validation(
                "smtp.timeout_secs must be greater than zero".to_string(),
            ));
        }
        let smtp = SmtpSettings {
            server: smtp.server.unwrap_or(defaults.server),
            port: smtp.port.unwrap_or(defaults.port),
            from: smtp.from.unwrap_or(defaults.from),
            starttls: smtp.starttls.unwrap_or(defaults.starttls),
            credentials,
            timeout: Duration::from_secs(smtp_timeout),
        };

        let prometheus_address = match &self.prometheus {
            Some(PrometheusConfig {
                enabled: Some(true),
                address,
            }) => Some(
                address
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            ),
            _ => None,
        };

        Ok(Settings {
            sites_file: PathBuf::from(
                self.sites_file
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SITES_FILE.to_string()),
            ),
            timeout: Duration::from_secs(timeout_secs),
            smtp,
            prometheus_address,
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            sites_file: Some("/etc/certalert/sites.json".to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            smtp: Some(SmtpConfig {
                server: Some("mail.example.com".to_string()),
                port: Some(587),
                from: Some("cert-monitor@example.com".to_string()),
                starttls: Some(true),
                username: Some("cert-monitor".to_string()),
                password: Some("change-me".to_string()),
                timeout_secs: Some(30),
            }),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some(DEFAULT_PROMETHEUS_ADDRESS.to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}
