// Service Constants
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/ask";
pub const QUESTION_PARAM: &str = "question";
pub const ENDPOINT_ENV_VAR: &str = "ARC1610_ENDPOINT";

// Panel Constants
pub const VIEW_TYPE: &str = "arc1610.view";
pub const PANEL_TITLE: &str = "Arc1610";
pub const PANEL_HEADING: &str = "ARC1610 ASSISTANT";
pub const LOGO_PATH: &str = "media/icon.png";

pub const MARKDOWN_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/markdown-it@14.1.0/dist/markdown-it.min.js";
pub const HIGHLIGHT_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/highlight.js@11.9.0/lib/common.min.js";
pub const HIGHLIGHT_STYLESHEET_URL: &str =
    "https://cdn.jsdelivr.net/npm/highlight.js@11.9.0/styles/github-dark.min.css";

// Rendering Constants
pub const CURSOR_GLYPH: &str = "▍";
pub const DEFAULT_CODE_THEME: &str = "base16-ocean.dark";
