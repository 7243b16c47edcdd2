//! Connection configuration shared by connection providers.
//!
//! The mapping core never reads this configuration itself, but every provider is
//! built from a validated [`ConnectionConfig`], so the core can assume the database
//! name, credentials and hosts were checked before it ever sees a provider.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::config::ConnectionConfig;
//!
//! let config = ConnectionConfig::from_json(r#"{
//!     "dbname": "app",
//!     "username": "",
//!     "password": "",
//!     "hosts": [{ "hostname": "localhost", "port": 27017 }]
//! }"#)?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MapperError, MapperResult};

/// Default connection timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default port of a MongoDB server.
pub const DEFAULT_PORT: u16 = 27017;

/// A single host/port endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Host name or address.
    #[serde(default)]
    pub hostname: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl HostConfig {
    /// Creates a new endpoint.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self { hostname: hostname.into(), port }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Configuration consumed by connection providers.
///
/// `username` and `password` must be present but may be empty, in which case the
/// connection is made without credentials.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionConfig {
    /// Name of the database selected by default.
    pub dbname: Option<String>,
    /// Login user name.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// One or more endpoints; several endpoints describe a replica set.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    /// Identifier of a persistent connection shared by providers using the same token.
    #[serde(default)]
    pub persistent: Option<String>,
    /// Whether the provider should connect eagerly when it is built.
    #[serde(default)]
    pub connect: bool,
    /// Connection and server selection timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ConnectionConfig {
    /// Creates a builder for a configuration.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Parses a configuration from a JSON string.
    ///
    /// The configuration is not validated; call [`ConnectionConfig::validate`] or let the
    /// provider builder do it.
    pub fn from_json(input: &str) -> MapperResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks that every required setting is present.
    ///
    /// Keys are checked in the order database name, password, username, host, and the
    /// first missing one is reported.
    pub fn validate(&self) -> MapperResult<()> {
        if self.dbname.as_deref().is_none_or(str::is_empty) {
            return Err(MapperError::InvalidConfiguration(
                "Configuration must have a key for 'dbname' that names the database instance".into(),
            ));
        }
        if self.password.is_none() {
            return Err(MapperError::InvalidConfiguration(
                "Configuration must have a key for 'password' for login credentials".into(),
            ));
        }
        if self.username.is_none() {
            return Err(MapperError::InvalidConfiguration(
                "Configuration must have a key for 'username' for login credentials".into(),
            ));
        }
        if self.hosts.is_empty() {
            return Err(MapperError::InvalidConfiguration(
                "Configuration must have a key for 'host'".into(),
            ));
        }
        if self.hosts.iter().any(|host| host.hostname.is_empty()) {
            return Err(MapperError::InvalidConfiguration(
                "Configuration must have a key for 'host > hostname'".into(),
            ));
        }

        Ok(())
    }

    /// Returns the database name, or an empty string when unset.
    pub fn database(&self) -> &str {
        self.dbname.as_deref().unwrap_or_default()
    }

    /// Returns the login credentials if both user name and password are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Builds the host string `mongodb://host:port[,host:port...]/database`.
    ///
    /// Credentials are never included.
    pub fn host_string(&self) -> String {
        let hosts = self
            .hosts
            .iter()
            .map(|host| format!("{}:{}", host.hostname, host.port))
            .collect::<Vec<_>>()
            .join(",");

        format!("mongodb://{}/{}", hosts, self.database())
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Sets the database name.
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.config.dbname = Some(dbname.into());
        self
    }

    /// Sets the login credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// Adds a host endpoint.
    pub fn host(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.config.hosts.push(HostConfig::new(hostname, port));
        self
    }

    /// Sets the persistent connection token.
    pub fn persistent(mut self, token: impl Into<String>) -> Self {
        self.config.persistent = Some(token.into());
        self
    }

    /// Sets whether the provider connects when it is built.
    pub fn connect(mut self, connect: bool) -> Self {
        self.config.connect = connect;
        self
    }

    /// Sets the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the configuration.
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            timeout_ms: if self.config.timeout_ms == 0 {
                DEFAULT_TIMEOUT_MS
            } else {
                self.config.timeout_ms
            },
            ..self.config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ConnectionConfig {
        ConnectionConfig::builder()
            .dbname("foo")
            .credentials("baz", "bar")
            .host("quux", 123)
            .build()
    }

    #[test]
    fn test_complete_config_validates() {
        let config = complete();

        assert!(config.validate().is_ok());
        assert_eq!(config.database(), "foo");
        assert_eq!(config.credentials(), Some(("baz", "bar")));
        assert_eq!(config.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_missing_keys_are_reported_in_order() {
        let mut config = ConnectionConfig::default();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("'dbname'"));

        config.dbname = Some("foo".into());
        assert!(config.validate().unwrap_err().to_string().contains("'password'"));

        config.password = Some("bar".into());
        assert!(config.validate().unwrap_err().to_string().contains("'username'"));

        config.username = Some("baz".into());
        assert!(config.validate().unwrap_err().to_string().contains("'host'"));

        config.hosts.push(HostConfig::new("", 27017));
        assert!(config.validate().unwrap_err().to_string().contains("'host > hostname'"));
    }

    #[test]
    fn test_empty_credentials_connect_anonymously() {
        let config = ConnectionConfig::builder()
            .dbname("foo")
            .credentials("", "")
            .host("localhost", 27017)
            .build();

        assert!(config.validate().is_ok());
        assert_eq!(config.credentials(), None);
    }

    #[test]
    fn test_host_string_lists_every_endpoint() {
        let config = ConnectionConfig::builder()
            .dbname("app")
            .credentials("u", "p")
            .host("a", 1)
            .host("b", 2)
            .build();

        assert_eq!(config.host_string(), "mongodb://a:1,b:2/app");
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = ConnectionConfig::from_json(
            r#"{ "dbname": "app", "username": "", "password": "", "hosts": [{ "hostname": "db" }] }"#,
        )
        .unwrap();

        assert_eq!(config.hosts, vec![HostConfig::new("db", DEFAULT_PORT)]);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!config.connect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_timeout_saturates() {
        let config = ConnectionConfig::builder().timeout(Duration::MAX).build();

        assert_eq!(config.timeout_ms, u64::MAX);
    }
}
