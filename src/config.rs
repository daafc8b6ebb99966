//! Gateway configuration
//!
//! 設定ファイル → 環境変数 (`GATEWAY__*`) → CLI 引数 の順に上書きされる。

mod loader;
mod types;

pub use loader::{CliOverrides, ConfigLoader};
pub use types::{
    GatewayConfig, LogFormat, LoggingConfig, MongoConfig, RotationStrategy, ServerConfig,
};
