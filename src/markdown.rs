// src/markdown.rs

use crate::config::Config;
use crate::highlight::Highlighter;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

static BARE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<url>https?://[^\s<>"'`]+)|(?P<www>\bwww\.[^\s<>"'`]+)|(?P<email>\b[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+)"#,
    )
    .expect("bare link pattern is valid")
});
static HTML_LINK_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^<a[>\s]").expect("link open pattern is valid"));
static HTML_LINK_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^</a\s*>").expect("link close pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pass raw HTML in the source through untouched.
    pub raw_html: bool,
    /// Turn bare `http(s)://` URLs into anchors.
    pub linkify: bool,
    /// Smart quotes, dashes and ellipses.
    pub typographer: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            raw_html: true,
            linkify: true,
            typographer: true,
        }
    }
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            raw_html: config.raw_html,
            linkify: config.linkify,
            typographer: config.typographer,
        }
    }
}

/// Markdown to HTML translation used for every message in the scrollback.
///
/// Rendering is pure: the same source always yields the same markup, and
/// partial input (for example an unterminated code fence while a response
/// is still streaming) renders without error.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
    highlighter: Highlighter,
}

struct PendingCode<'a> {
    kind: CodeBlockKind<'a>,
    text: String,
}

impl MarkdownRenderer {
    pub fn new(options: RenderOptions, highlighter: Highlighter) -> Self {
        Self {
            options,
            highlighter,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RenderOptions::from(config),
            Highlighter::new(config.code_theme.clone()),
        )
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    fn parser_options(&self) -> Options {
        let mut options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        if self.options.typographer {
            options |= Options::ENABLE_SMART_PUNCTUATION;
        }
        options
    }

    pub fn render(&self, source: &str) -> String {
        let parser = Parser::new_ext(source, self.parser_options());

        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<PendingCode> = None;
        let mut pending_text = String::new();
        let mut link_depth = 0usize;

        for event in parser {
            if code_block.is_some() {
                match event {
                    Event::Text(text) => {
                        if let Some(block) = code_block.as_mut() {
                            block.text.push_str(&text);
                        }
                    }
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some(block) = code_block.take() {
                            self.push_code_block(&mut events, block);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            if let Event::Text(text) = &event {
                pending_text.push_str(text);
                continue;
            }
            self.flush_text(&mut events, &mut pending_text, link_depth);

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    code_block = Some(PendingCode {
                        kind,
                        text: String::new(),
                    });
                }
                // Text inside links and image alt text is never linkified.
                Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {
                    link_depth += 1;
                    events.push(event);
                }
                Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                    link_depth = link_depth.saturating_sub(1);
                    events.push(event);
                }
                Event::Html(raw) | Event::InlineHtml(raw) if !self.options.raw_html => {
                    events.push(Event::Text(raw));
                }
                Event::InlineHtml(raw) => {
                    if HTML_LINK_OPEN.is_match(&raw) {
                        link_depth += 1;
                    } else if HTML_LINK_CLOSE.is_match(&raw) {
                        link_depth = link_depth.saturating_sub(1);
                    }
                    events.push(Event::InlineHtml(raw));
                }
                other => events.push(other),
            }
        }

        // The parser closes open blocks itself; this only guards a truncated iterator.
        if let Some(block) = code_block.take() {
            self.push_code_block(&mut events, block);
        }
        self.flush_text(&mut events, &mut pending_text, link_depth);

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn flush_text<'a>(&self, events: &mut Vec<Event<'a>>, pending: &mut String, link_depth: usize) {
        if pending.is_empty() {
            return;
        }
        let text = std::mem::take(pending);
        if self.options.linkify && link_depth == 0 {
            push_linkified(events, text);
        } else {
            events.push(Event::Text(text.into()));
        }
    }

    fn push_code_block<'a>(&self, events: &mut Vec<Event<'a>>, block: PendingCode<'a>) {
        let lang = match &block.kind {
            CodeBlockKind::Fenced(info) => fence_language(info),
            CodeBlockKind::Indented => "",
        };

        if let Some(highlighted) = self.highlighter.highlight_html(&block.text, lang) {
            events.push(Event::Html(
                format!(
                    "<pre class=\"hljs\"><code class=\"language-{}\">{}</code></pre>\n",
                    css_class_token(lang),
                    highlighted
                )
                .into(),
            ));
            return;
        }

        events.push(Event::Start(Tag::CodeBlock(block.kind)));
        events.push(Event::Text(block.text.into()));
        events.push(Event::End(TagEnd::CodeBlock));
    }
}

fn fence_language<'s>(info: &'s CowStr<'_>) -> &'s str {
    info.split_whitespace().next().unwrap_or("")
}

fn css_class_token(lang: &str) -> String {
    lang.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
        .collect::<String>()
        .to_lowercase()
}

fn push_linkified<'a>(events: &mut Vec<Event<'a>>, text: String) {
    let mut last = 0;
    for caps in BARE_LINK.captures_iter(&text) {
        let (found, scheme) = if let Some(m) = caps.name("url") {
            (m, "")
        } else if let Some(m) = caps.name("www") {
            (m, "http://")
        } else if let Some(m) = caps.name("email") {
            (m, "mailto:")
        } else {
            continue;
        };

        let shown = found
            .as_str()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'));
        let host = shown
            .split_once("://")
            .map(|(_, rest)| rest)
            .or_else(|| shown.strip_prefix("www."))
            .unwrap_or(shown);
        if host.is_empty() {
            continue;
        }

        let start = found.start();
        if start > last {
            events.push(Event::Text(text[last..start].to_string().into()));
        }
        let href = format!("{}{}", scheme, shown)
            .replace('&', "&amp;")
            .replace('"', "&quot;");
        events.push(Event::InlineHtml(format!("<a href=\"{}\">", href).into()));
        events.push(Event::Text(shown.to_string().into()));
        events.push(Event::InlineHtml("</a>".into()));
        last = start + shown.len();
    }

    if last == 0 {
        events.push(Event::Text(text.into()));
    } else if last < text.len() {
        events.push(Event::Text(text[last..].to_string().into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::default()
    }

    fn strip_tags(html: &str) -> String {
        Regex::new(r"<[^>]*>").unwrap().replace_all(html, "").to_string()
    }

    #[test]
    fn test_plain_text_round_trips() {
        assert_eq!(renderer().render("hello world"), "<p>hello world</p>\n");
        assert_eq!(renderer().render("4"), "<p>4</p>\n");
    }

    #[test]
    fn test_plain_text_is_escaped() {
        assert_eq!(
            renderer().render("a < b & c"),
            "<p>a &lt; b &amp; c</p>\n"
        );
    }

    #[test]
    fn test_recognized_fence_is_highlighted() {
        let html = renderer().render("```py\nprint(1)\n```");
        assert!(html.starts_with("<pre class=\"hljs\"><code class=\"language-py\">"));
        assert!(html.contains("<span class="));
        assert!(strip_tags(&html).contains("print(1)"));
    }

    #[test]
    fn test_unknown_fence_falls_back_to_escaped_pre() {
        let html = renderer().render("```klingon\n<tag> & co\n```");
        assert!(!html.contains("hljs"));
        assert!(html.contains("<pre><code"));
        assert!(html.contains("&lt;tag&gt; &amp; co"));
    }

    #[test]
    fn test_missing_language_falls_back() {
        let html = renderer().render("```\nplain\n```");
        assert_eq!(html, "<pre><code>plain\n</code></pre>\n");
    }

    #[test]
    fn test_unterminated_fence_renders_partial_block() {
        let html = renderer().render("intro\n\n```rust\nfn main() {");
        assert!(html.starts_with("<p>intro</p>"));
        assert!(html.contains("hljs"));
        assert!(strip_tags(&html).contains("fn main() {"));
    }

    #[test]
    fn test_bare_urls_are_linkified() {
        let html = renderer().render("see https://example.com/docs.");
        assert_eq!(
            html,
            "<p>see <a href=\"https://example.com/docs\">https://example.com/docs</a>.</p>\n"
        );
    }

    #[test]
    fn test_www_hosts_and_emails_are_linkified() {
        let html = renderer().render("mail me@example.com or visit www.rust-lang.org.");
        assert_eq!(
            html,
            "<p>mail <a href=\"mailto:me@example.com\">me@example.com</a> or visit <a href=\"http://www.rust-lang.org\">www.rust-lang.org</a>.</p>\n"
        );
    }

    #[test]
    fn test_raw_html_anchor_is_not_linked_again() {
        let html = renderer().render("see <a href=\"https://x.io\">https://x.io</a> now");
        assert_eq!(
            html,
            "<p>see <a href=\"https://x.io\">https://x.io</a> now</p>\n"
        );

        let html = renderer().render("<A HREF=\"https://x.io\">x</A> then https://y.io");
        assert_eq!(html.matches("href=\"https://y.io\"").count(), 1);
    }

    #[test]
    fn test_image_alt_text_is_not_linkified() {
        let html = renderer().render("![see https://x.io](img.png)");
        assert!(html.contains("alt=\"see https://x.io\""));
        assert!(!html.contains("&lt;a"));
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_existing_links_are_not_double_linked() {
        let html = renderer().render("[docs](https://example.com)");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn test_raw_html_passthrough_is_configurable() {
        assert!(renderer().render("x <b>bold</b>").contains("<b>bold</b>"));

        let strict = MarkdownRenderer::new(
            RenderOptions {
                raw_html: false,
                ..RenderOptions::default()
            },
            Highlighter::default(),
        );
        let html = strict.render("x <b>bold</b>");
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn test_typographer_applies_smart_quotes() {
        assert!(renderer().render("\"hi\"").contains("“hi”"));

        let plain = MarkdownRenderer::new(
            RenderOptions {
                typographer: false,
                ..RenderOptions::default()
            },
            Highlighter::default(),
        );
        let html = plain.render("\"hi\"");
        assert!(!html.contains('“'));
        assert!(html.contains("hi"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let source = "# Title\n\n- a\n- b\n\n```rust\nlet x = 1;\n```\n";
        assert_eq!(renderer().render(source), renderer().render(source));
    }
}
