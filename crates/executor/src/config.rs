//! Client configuration via `xapi.toml`
//!
//! A TOML file is an alternative to building [`SessionOptions`] by hand.
//! [`ClientConfig::to_options`] feeds every field through the option table,
//! so a file is held to exactly the same rules as `SessionOptions::set`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::options::{OptionKey, OptionValue, SessionOptions, SslMode};
use crate::{Error, Result};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "xapi.toml";

/// Connection settings loaded from `xapi.toml`.
///
/// # Example
///
/// ```toml
/// host = "localhost"
/// port = 33060
/// user = "root"
/// # password = "secret"
/// # database = "test"
/// # ssl_mode = "required"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Server host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Server port (default: 33060).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Unix socket path, used instead of host and port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,
    /// User name.
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Default schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// `"disabled"`, `"required"`, `"verify_ca"` or `"verify_identity"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    crate::options::DEFAULT_PORT
}

fn default_user() -> String {
    "root".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: Some("localhost".to_string()),
            port: default_port(),
            socket: None,
            user: default_user(),
            password: None,
            database: None,
            ssl_mode: None,
            ssl_ca: None,
            priority: None,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# xapi client configuration
#
# Server location: either host/port or a unix socket.
host = "localhost"
port = 33060
# socket = "/var/run/mysqld/mysqlx.sock"

# Credentials
user = "root"
# password = "secret"

# Default schema
# database = "test"

# TLS: "disabled", "required", "verify_ca" or "verify_identity"
# ssl_mode = "required"
# ssl_ca = "/etc/ssl/ca.pem"

# priority = 100
# connect_timeout_ms = 10000
"#
    }

    /// Parse config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::invalid(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::invalid(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::invalid(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::invalid(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::invalid(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Convert to an option set, validating every field through the option
    /// table.
    pub fn to_options(&self) -> Result<SessionOptions> {
        let mut entries: Vec<(OptionKey, Option<OptionValue>)> = vec![
            (OptionKey::User, Some(self.user.clone().into())),
            (OptionKey::Port, Some(self.port.into())),
        ];
        if let Some(host) = &self.host {
            entries.push((OptionKey::Host, Some(host.clone().into())));
        }
        if let Some(socket) = &self.socket {
            entries.push((OptionKey::Socket, Some(socket.clone().into())));
        }
        if let Some(pwd) = &self.password {
            entries.push((OptionKey::Pwd, Some(pwd.clone().into())));
        }
        if let Some(db) = &self.database {
            entries.push((OptionKey::Db, Some(db.clone().into())));
        }
        if let Some(mode) = &self.ssl_mode {
            let mode = SslMode::from_name(mode)
                .ok_or_else(|| Error::InvalidOptionValue {
                    reason: format!("Invalid ssl_mode '{}' in config", mode),
                })?;
            entries.push((OptionKey::SslMode, Some(mode.into())));
        }
        if let Some(ca) = &self.ssl_ca {
            entries.push((OptionKey::SslCa, Some(ca.clone().into())));
        }
        if let Some(priority) = self.priority {
            entries.push((OptionKey::Priority, Some(priority.into())));
        }
        if let Some(timeout) = self.connect_timeout_ms {
            entries.push((OptionKey::ConnectTimeout, Some(timeout.into())));
        }

        let mut opts = SessionOptions::new();
        opts.try_set(entries)?;
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_correctly() {
        let config = ClientConfig::from_toml_str(ClientConfig::default_toml()).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        ClientConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.host.as_deref(), Some("localhost"));
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "host = \"db.internal\"\n").unwrap();
        ClientConfig::write_default_if_missing(&path).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.host.as_deref(), Some("db.internal"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = ClientConfig::from_toml_str("host = \"h\"").unwrap();
        assert_eq!(config.port, 33060);
        assert_eq!(config.user, "root");
        assert!(config.password.is_none());
    }

    #[test]
    fn round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ClientConfig {
            database: Some("shop".into()),
            ssl_mode: Some("verify_identity".into()),
            connect_timeout_ms: Some(2500),
            ..ClientConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(ClientConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn to_options_uses_option_rules() {
        let config = ClientConfig {
            password: Some("pw".into()),
            ssl_mode: Some("required".into()),
            ..ClientConfig::default()
        };
        let opts = config.to_options().unwrap();
        assert_eq!(opts.peek(OptionKey::Host), Some(&"localhost".into()));
        assert_eq!(opts.peek(OptionKey::Pwd), Some(&"pw".into()));
        assert_eq!(opts.peek(OptionKey::SslMode), Some(&OptionValue::Uint(2)));

        let empty_db = ClientConfig {
            database: Some(String::new()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            empty_db.to_options(),
            Err(Error::InvalidOptionValue { .. })
        ));

        let bad_priority = ClientConfig {
            priority: Some(500),
            ..ClientConfig::default()
        };
        assert!(bad_priority.to_options().is_err());
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(ClientConfig::from_toml_str("port = \"many\"").is_err());
    }
}
