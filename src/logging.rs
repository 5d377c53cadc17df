// src/logging.rs

use crate::config::Config;
use crate::errors::PanelResult;
use crate::models::ExchangeLog;
use flexi_logger::{detailed_format, FileSpec, Logger, LoggerHandle};
use std::path::PathBuf;

pub const EXCHANGE_TARGET: &str = "arc1610::exchange";

/// Directory the log file goes to. The terminal belongs to the UI, so
/// nothing is logged to stderr.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("arc1610")
        .join("logs")
}

/// Starts file logging. `RUST_LOG` wins over the configured level. Keep the
/// returned handle alive for the lifetime of the program.
pub fn init_logging(config: &Config) -> PanelResult<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(&config.log_level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir())
                .basename("arc1610")
                .suppress_timestamp(),
        )
        .append()
        .format(detailed_format)
        .start()?;

    log::info!("Logging to {}", log_dir().display());
    Ok(handle)
}

pub fn format_exchange(log: &ExchangeLog) -> String {
    format!(
        "[{}] {} - exchange #{} - {} - chunks: {} - question: {} chars - answer: {} chars - Time: {}ms",
        log.timestamp.to_rfc3339(),
        log.endpoint,
        log.exchange_id,
        log.outcome,
        log.chunk_count,
        log.question_chars,
        log.answer_chars,
        log.elapsed_ms
    )
}

/// Records a finished exchange.
pub fn log_exchange(log: &ExchangeLog) {
    log::info!(target: EXCHANGE_TARGET, "{}", format_exchange(log));
}
