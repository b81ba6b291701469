//! Logger setup for the two run modes.
//!
//! The terminal UI owns stdout, so it logs to a file through `log4rs`.
//! Headless subcommands log to stderr through `env_logger`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Environment variable holding the file log level for the terminal UI.
pub const LEVEL_ENV: &str = "GUARDCHAT_LOG";

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {t} - {m}{n}";

/// Initializes file logging for the terminal UI.
///
/// `config/log4rs.yaml` under `workspace_root` wins when present. Otherwise a
/// single file appender writes to `logs/guardchat.log`. Returns where logs go.
pub fn init_file_logging(workspace_root: &Path) -> Result<PathBuf> {
    let yaml = workspace_root.join("config/log4rs.yaml");
    if yaml.exists() {
        log4rs::init_file(&yaml, Default::default())
            .with_context(|| format!("failed to load logging config {}", yaml.display()))?;
        return Ok(yaml);
    }

    let log_path = workspace_root.join("logs/guardchat.log");
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(level_from_env()))
        .context("invalid logging config")?;
    log4rs::init_config(config).context("logger already initialized")?;
    Ok(log_path)
}

/// Initializes stderr logging for headless commands, filtered by `RUST_LOG`.
pub fn init_stderr_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .try_init();
}

fn level_from_env() -> LevelFilter {
    parse_level(env::var(LEVEL_ENV).ok().as_deref())
}

fn parse_level(raw: Option<&str>) -> LevelFilter {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}
