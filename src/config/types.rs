use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// MongoDB connection configuration
    pub mongodb: MongoConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address. `:8080` binds every interface.
    #[serde(alias = "addr")]
    pub bind_addr: String,

    /// Request body limit in bytes. Unset means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

/// MongoDB connection and pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Connection URI
    #[serde(alias = "uri")]
    pub url: String,

    /// Minimum number of connections in the pool
    #[serde(alias = "minPoolSize", alias = "minpoolsize")]
    pub min_pool_size: u32,

    /// Maximum number of connections in the pool
    #[serde(alias = "maxPoolSize", alias = "maxpoolsize")]
    pub max_pool_size: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Server selection timeout in seconds
    pub server_selection_timeout_secs: u64,

    /// Application name reported to the server
    pub app_name: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    pub level: String,

    /// Log format
    pub format: LogFormat,

    /// Write to stderr
    pub console: bool,

    /// Write to a rolling file under `dir`
    pub file: bool,

    /// Log file directory
    pub dir: PathBuf,

    /// File rotation
    pub rotation: RotationStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Pretty-printed format
    #[serde(rename = "pretty")]
    Pretty,

    /// JSON format
    #[serde(rename = "json")]
    Json,

    /// Compact format
    #[serde(rename = "compact")]
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "never")]
    Never,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_body_bytes: None,
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            min_pool_size: 1,
            max_pool_size: 10,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            app_name: Some("mongo-gateway".to_string()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            console: true,
            file: false,
            dir: PathBuf::from("logs"),
            rotation: RotationStrategy::Daily,
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address.
    ///
    /// A bare `:port` (the form used by older config files) listens on all
    /// interfaces.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.bind_addr.starts_with(':') {
            format!("0.0.0.0{}", self.bind_addr)
        } else {
            self.bind_addr.clone()
        };

        addr.to_socket_addrs()
            .map_err(|e| Error::Config(format!("Invalid bind address {}: {}", self.bind_addr, e)))?
            .next()
            .ok_or_else(|| Error::Config(format!("Bind address {} did not resolve", self.bind_addr)))
    }
}

impl MongoConfig {
    /// Validate MongoDB configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("MongoDB URL cannot be empty".to_string()));
        }
        if self.max_pool_size == 0 {
            return Err(Error::Config(
                "max_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(Error::Config(format!(
                "min_pool_size ({}) exceeds max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        if self.server.max_body_bytes == Some(0) {
            return Err(Error::Config(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.mongodb.validate()?;
        Ok(())
    }

    /// Render a commented sample configuration file
    pub fn sample_toml() -> Result<String> {
        let body = toml::to_string_pretty(&GatewayConfig::default())?;

        Ok(format!(
            r#"# mongo-gateway configuration
#
# Save as mongo-gateway.toml (or config/mongo-gateway.toml).
# Every key can be overridden from the environment with a GATEWAY__ prefix,
# e.g. GATEWAY__MONGODB__URL=mongodb://db:27017
#
# The gateway forwards filters and updates to MongoDB verbatim and accepts any
# database/collection name. Put it behind an authorization layer before
# exposing it.

{}"#,
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mongodb.min_pool_size, 1);
        assert_eq!(config.mongodb.max_pool_size, 10);
        assert_eq!(config.server.max_body_bytes, None);
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let mut config = GatewayConfig::default();
        config.server.max_body_bytes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_bounds_validation() {
        let mut config = MongoConfig::default();
        config.min_pool_size = 20;
        assert!(config.validate().is_err());

        config.min_pool_size = 0;
        config.max_pool_size = 0;
        assert!(config.validate().is_err());

        config.max_pool_size = 5;
        config.url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bare_port_binds_all_interfaces() {
        let server = ServerConfig {
            bind_addr: ":9090".to_string(),
            ..ServerConfig::default()
        };
        let addr = server.socket_addr().unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 9090);

        let server = ServerConfig {
            bind_addr: "not an address".to_string(),
            ..ServerConfig::default()
        };
        assert!(server.socket_addr().is_err());
    }

    #[test]
    fn test_sample_toml_parses_back() {
        let sample = GatewayConfig::sample_toml().unwrap();
        let parsed: GatewayConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.mongodb.url, "mongodb://localhost:27017");
        assert_eq!(parsed.logging.rotation, RotationStrategy::Daily);
    }
}
