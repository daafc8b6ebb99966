use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig, RotationStrategy};

const LOG_FILE_NAME: &str = "mongo-gateway.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル (trace, debug, info, warn, error) または EnvFilter 構文
    pub level: String,
    /// 出力フォーマット
    pub format: LogFormat,
    /// ログディレクトリ
    pub log_dir: PathBuf,
    /// ファイルローテーション設定
    pub rotation: RotationStrategy,
    /// コンソール出力有効
    pub console_enabled: bool,
    /// ファイル出力有効
    pub file_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_logging_config(&LoggingConfig::default())
    }
}

impl LogConfig {
    /// 設定からログ設定を作成
    pub fn from_logging_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format,
            log_dir: config.dir.clone(),
            rotation: config.rotation,
            console_enabled: config.console,
            file_enabled: config.file,
        }
    }
}

/// ログディレクトリを確保
fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }
    Ok(())
}

fn build_filter(level: &str) -> EnvFilter {
    // RUST_LOG が設定されていればそちらを優先
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// ログシステムを初期化
///
/// ファイル出力が有効な場合は non-blocking writer のガードを返す。
/// ガードを drop すると未書き込みのログが失われるため、プロセス終了まで保持すること。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.console_enabled || !config.file_enabled {
        layers.push(fmt_layer(config.format, std::io::stderr, true));
    }

    if config.file_enabled {
        ensure_log_dir(&config.log_dir)?;

        let file_appender = match config.rotation {
            RotationStrategy::Daily => rolling::daily(&config.log_dir, LOG_FILE_NAME),
            RotationStrategy::Hourly => rolling::hourly(&config.log_dir, LOG_FILE_NAME),
            RotationStrategy::Never => rolling::never(&config.log_dir, LOG_FILE_NAME),
        };
        let (writer, file_guard) = non_blocking(file_appender);
        layers.push(fmt_layer(config.format, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(&config.level))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        console = config.console_enabled,
        file = config.file_enabled,
        "Logging initialized"
    );
    if config.file_enabled {
        tracing::info!("Log directory: {}", config.log_dir.display());
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert_eq!(config.rotation, RotationStrategy::Daily);
    }

    #[test]
    fn test_log_config_from_logging_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            file: true,
            console: false,
            rotation: RotationStrategy::Hourly,
            ..Default::default()
        };

        let config = LogConfig::from_logging_config(&logging);
        assert_eq!(config.level, "debug");
        assert!(config.file_enabled);
        assert!(!config.console_enabled);
        assert_eq!(config.rotation, RotationStrategy::Hourly);
    }

    #[test]
    fn test_ensure_log_dir() {
        let temp_dir = tempdir().unwrap();
        let log_dir = temp_dir.path().join("nested").join("logs");

        assert!(ensure_log_dir(&log_dir).is_ok());
        assert!(log_dir.exists());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // should not panic on a malformed directive
        let _filter = build_filter("=====");
    }
}
