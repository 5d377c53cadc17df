// src/errors.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Stream protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Logger error: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),
}

pub type PanelResult<T> = Result<T, PanelError>;

impl PanelError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        PanelError::Config(msg.into())
    }

    pub fn endpoint_error(msg: impl Into<String>) -> Self {
        PanelError::Endpoint(msg.into())
    }

    pub fn asset_error(msg: impl Into<String>) -> Self {
        PanelError::Asset(msg.into())
    }
}
