// src/lib.rs

pub mod api;
pub mod app;
pub mod chat;
pub mod chat_message;
pub mod chat_view;
pub mod config;
pub mod constants;
pub mod errors;
pub mod exchange;
pub mod highlight;
pub mod key_handlers;
pub mod log_view;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod panel;
pub mod sse;
pub mod status_indicator;
pub mod ui;

pub use app::App;
pub use chat::ChatClient;
pub use errors::{PanelError, PanelResult};
pub use panel::PanelHost;
