use super::types::GatewayConfig;
use crate::error::Result;
use config::{Config, Environment, File};
use tracing::debug;

/// Values supplied on the command line, applied after every other source
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_addr: Option<String>,
    pub mongodb_url: Option<String>,
    pub log_level: Option<String>,
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    config_file: Option<String>,
    load_env: bool,
    cli_override: CliOverrides,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
            cli_override: CliOverrides::default(),
        }
    }

    /// Load configuration from file
    pub fn load_from_file(mut self, path: Option<&str>) -> Self {
        self.config_file = path.map(String::from);
        self
    }

    /// Load configuration from `GATEWAY__SECTION__KEY` environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Apply command line overrides
    pub fn load_from_cli(mut self, overrides: CliOverrides) -> Self {
        self.cli_override = overrides;
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<GatewayConfig> {
        let mut builder = Config::builder();

        if let Some(config_path) = &self.config_file {
            debug!("Loading configuration file {}", config_path);
            builder = builder.add_source(File::with_name(config_path));
        } else {
            // Standard locations; config/config is the legacy layout
            builder = builder
                .add_source(File::with_name("mongo-gateway").required(false))
                .add_source(File::with_name("config/mongo-gateway").required(false))
                .add_source(File::with_name("config/config").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix("GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let CliOverrides {
            bind_addr,
            mongodb_url,
            log_level,
        } = self.cli_override;
        builder = builder
            .set_override_option("server.bind_addr", bind_addr)?
            .set_override_option("mongodb.url", mongodb_url)?
            .set_override_option("logging.level", log_level)?;

        let config: GatewayConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
