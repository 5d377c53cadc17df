// src/panel.rs

use crate::{
    constants::{
        HIGHLIGHT_SCRIPT_URL, HIGHLIGHT_STYLESHEET_URL, LOGO_PATH, MARKDOWN_SCRIPT_URL,
        PANEL_HEADING, PANEL_TITLE, VIEW_TYPE,
    },
    errors::{PanelError, PanelResult},
    models::RenderedMessage,
};
use reqwest::Url;
use std::{
    env,
    fmt::Write as _,
    path::{Component, Path, PathBuf},
};
use tokio::sync::watch;

const BASE_STYLES: &str = r#"
body, html { margin: 0; padding: 0; height: 100%; overflow: hidden; color: var(--vscode-editor-foreground); background-color: var(--vscode-sideBar-background, var(--vscode-editor-background)); font-family: var(--vscode-font-family); }
.chat-container { display: flex; flex-direction: column; height: 100vh; padding: 10px; box-sizing: border-box; }
.header { display: flex; align-items: center; padding: 10px; border-bottom: 1px solid var(--vscode-sideBar-border, #252526); }
.logo { width: 24px; height: 24px; margin-right: 8px; }
.header h4 { margin: 0; font-size: 14px; }
#chat-log { flex-grow: 1; overflow-y: auto; padding-bottom: 10px; }
.message { padding: 8px 12px; border-radius: 6px; margin-bottom: 8px; max-width: 90%; line-height: 1.5; }
.message.user { background-color: var(--vscode-list-activeSelectionBackground); align-self: flex-end; }
.message.assistant { background-color: var(--vscode-list-hoverBackground); align-self: flex-start; white-space: pre-wrap; }
.message.assistant pre.hljs { padding: 1em; border-radius: 4px; }
.input-form { display: flex; align-items: center; border-top: 1px solid var(--vscode-sideBar-border); padding-top: 10px; }
#question-input { flex-grow: 1; border-radius: 4px; padding: 8px; resize: none; }
#ask-button { border: none; border-radius: 4px; padding: 8px 12px; margin-left: 10px; cursor: pointer; }
"#;

/// Signal from the host that the panel is going away.
#[derive(Debug, Clone)]
pub struct HostCancellation {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

pub fn cancellation_pair() -> (CancellationSource, HostCancellation) {
    let (tx, rx) = watch::channel(false);
    (CancellationSource { tx }, HostCancellation { rx })
}

impl CancellationSource {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl HostCancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the host has cancelled. If the host drops its source
    /// without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                if *self.rx.borrow() {
                    return;
                }
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sandbox options for the panel's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebviewOptions {
    pub enable_scripts: bool,
    pub local_resource_roots: Vec<PathBuf>,
}

/// External library resources referenced by the content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelAssets {
    pub markdown_script: String,
    pub highlight_script: String,
    pub highlight_stylesheet: String,
}

impl Default for PanelAssets {
    fn default() -> Self {
        Self {
            markdown_script: MARKDOWN_SCRIPT_URL.to_string(),
            highlight_script: HIGHLIGHT_SCRIPT_URL.to_string(),
            highlight_stylesheet: HIGHLIGHT_STYLESHEET_URL.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct PanelView {
    pub options: WebviewOptions,
    pub html: String,
    cancellation: HostCancellation,
}

impl PanelView {
    pub fn cancellation(&self) -> HostCancellation {
        self.cancellation.clone()
    }
}

/// Registers the chat panel and produces its content document.
#[derive(Debug)]
pub struct PanelHost {
    extension_root: PathBuf,
    assets: PanelAssets,
    view: Option<PanelView>,
}

impl PanelHost {
    pub fn new(extension_root: impl Into<PathBuf>, assets: PanelAssets) -> PanelResult<Self> {
        let extension_root = extension_root.into();
        let extension_root = if extension_root.is_absolute() {
            extension_root
        } else {
            env::current_dir()?.join(extension_root)
        };

        log::debug!("Registering {} at {}", VIEW_TYPE, extension_root.display());
        Ok(Self {
            extension_root,
            assets,
            view: None,
        })
    }

    pub fn view_type(&self) -> &'static str {
        VIEW_TYPE
    }

    pub fn extension_root(&self) -> &Path {
        &self.extension_root
    }

    pub fn view(&self) -> Option<&PanelView> {
        self.view.as_ref()
    }

    pub fn options(&self) -> WebviewOptions {
        WebviewOptions {
            enable_scripts: true,
            local_resource_roots: vec![self.extension_root.clone()],
        }
    }

    /// Called when the panel is shown: configures the sandbox and produces
    /// the initial (empty) content document.
    pub fn resolve_view(&mut self, cancellation: HostCancellation) -> &PanelView {
        let options = self.options();
        let html = self.content_document_with(&options, &[], "");
        log::info!("Resolved panel view {}", VIEW_TYPE);
        self.view.insert(PanelView {
            options,
            html,
            cancellation,
        })
    }

    /// Re-renders the resolved view's document. Returns `false` if no view
    /// has been resolved yet.
    pub fn refresh(&mut self, scrollback: &[RenderedMessage], stylesheet: &str) -> bool {
        let Some(options) = self.view.as_ref().map(|view| view.options.clone()) else {
            return false;
        };
        let html = self.content_document_with(&options, scrollback, stylesheet);
        if let Some(view) = self.view.as_mut() {
            view.html = html;
        }
        true
    }

    /// Rewrites a path under the extension root into a URI the panel is
    /// allowed to load.
    pub fn as_webview_uri(&self, relative: impl AsRef<Path>) -> PanelResult<Url> {
        let relative = relative.as_ref();
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(PanelError::asset_error(format!(
                "{} is outside the extension root",
                relative.display()
            )));
        }

        let path = self.extension_root.join(relative);
        Url::from_file_path(&path)
            .map_err(|_| PanelError::asset_error(format!("cannot build a URI for {}", path.display())))
    }

    pub fn content_document(&self, scrollback: &[RenderedMessage], stylesheet: &str) -> String {
        let options = self
            .view
            .as_ref()
            .map(|view| view.options.clone())
            .unwrap_or_else(|| self.options());
        self.content_document_with(&options, scrollback, stylesheet)
    }

    fn content_document_with(
        &self,
        options: &WebviewOptions,
        scrollback: &[RenderedMessage],
        stylesheet: &str,
    ) -> String {
        let logo_uri = match self.as_webview_uri(LOGO_PATH) {
            Ok(uri) => uri.to_string(),
            Err(e) => {
                log::warn!("Logo unavailable: {}", e);
                String::new()
            }
        };

        let markdown_script = checked_url(&self.assets.markdown_script);
        let highlight_script = checked_url(&self.assets.highlight_script);
        let highlight_stylesheet = checked_url(&self.assets.highlight_stylesheet);

        let mut head = String::new();
        let _ = writeln!(
            head,
            "<meta http-equiv=\"Content-Security-Policy\" content=\"{}\">",
            content_security_policy(options, &[&markdown_script, &highlight_script], &highlight_stylesheet)
        );
        if let Some(url) = &highlight_stylesheet {
            let _ = writeln!(head, "<link rel=\"stylesheet\" href=\"{}\">", url);
        }
        if options.enable_scripts {
            for url in [&markdown_script, &highlight_script].into_iter().flatten() {
                let _ = writeln!(head, "<script src=\"{}\"></script>", url);
            }
        }

        let mut log = String::new();
        for rendered in scrollback {
            let _ = writeln!(
                log,
                "<div class=\"message {}\">{}</div>",
                rendered.message.sender.css_class(),
                rendered.html
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
{head}<style>{base}</style>
<style>{highlight}</style>
</head>
<body>
<div class="chat-container">
<div class="header">
<img src="{logo}" alt="{title} Logo" class="logo">
<h4>{heading}</h4>
</div>
<div id="chat-log">
{log}</div>
<div class="input-form">
<textarea id="question-input" rows="3" placeholder="Ask a question..."></textarea>
<button id="ask-button">Ask</button>
</div>
</div>
</body>
</html>
"#,
            title = PANEL_TITLE,
            head = head,
            base = BASE_STYLES,
            highlight = stylesheet,
            logo = logo_uri,
            heading = PANEL_HEADING,
            log = log,
        )
    }
}

fn checked_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("Skipping library resource '{}': {}", raw, e);
            None
        }
    }
}

fn content_security_policy(
    options: &WebviewOptions,
    scripts: &[&Option<Url>],
    stylesheet: &Option<Url>,
) -> String {
    let origin = |url: &Url| url.origin().ascii_serialization();

    let img_src: Vec<String> = options
        .local_resource_roots
        .iter()
        .filter_map(|root| Url::from_directory_path(root).ok())
        .map(|url| url.to_string())
        .collect();

    let mut script_src: Vec<String> = if options.enable_scripts {
        scripts.iter().filter_map(|url| url.as_ref()).map(origin).collect()
    } else {
        Vec::new()
    };
    script_src.dedup();

    let mut style_src = vec!["'unsafe-inline'".to_string()];
    style_src.extend(stylesheet.as_ref().map(origin));

    let or_none = |sources: Vec<String>| {
        if sources.is_empty() {
            "'none'".to_string()
        } else {
            sources.join(" ")
        }
    };

    format!(
        "default-src 'none'; img-src {}; style-src {}; script-src {};",
        or_none(img_src),
        style_src.join(" "),
        or_none(script_src)
    )
}
