//! Server configuration.
//!
//! [`ServerConfig`] holds the listen address, the access-log toggle, and the
//! size of the single read each connection gets. Values come from defaults or
//! from `CHC_*` environment variables (see [`ServerConfig::from_env`]).

use thiserror::Error;

/// Errors produced while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Listening and per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Emit one access-log line per completed request.
    pub request_logging: bool,
    /// Bytes read from each connection. Anything beyond this is never seen.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            request_logging: true,
            read_buffer_size: 1024,
        }
    }
}

impl ServerConfig {
    pub const HOST_VAR: &'static str = "CHC_HOST";
    pub const PORT_VAR: &'static str = "CHC_PORT";
    pub const REQUEST_LOGGING_VAR: &'static str = "CHC_REQUEST_LOGGING";
    pub const READ_BUFFER_SIZE_VAR: &'static str = "CHC_READ_BUFFER_SIZE";

    /// Returns the `host:port` string to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds a config from `CHC_HOST`, `CHC_PORT`, `CHC_REQUEST_LOGGING`, and
    /// `CHC_READ_BUFFER_SIZE`, falling back to the defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup(Self::HOST_VAR) {
            config.host = host;
        }
        if let Some(port) = lookup(Self::PORT_VAR) {
            config.port = parse_var(Self::PORT_VAR, port, |v| v.parse().ok())?;
        }
        if let Some(flag) = lookup(Self::REQUEST_LOGGING_VAR) {
            config.request_logging = parse_var(Self::REQUEST_LOGGING_VAR, flag, parse_bool)?;
        }
        if let Some(size) = lookup(Self::READ_BUFFER_SIZE_VAR) {
            config.read_buffer_size = parse_var(Self::READ_BUFFER_SIZE_VAR, size, |v| {
                v.parse().ok().filter(|n: &usize| *n > 0)
            })?;
        }

        Ok(config)
    }
}

fn parse_var<T>(
    key: &'static str,
    value: String,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    parse(value.trim()).ok_or(ConfigError::Invalid { key, value })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
