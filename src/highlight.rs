// src/highlight.rs

use crate::constants::DEFAULT_CODE_THEME;
use once_cell::sync::Lazy;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use syntect::{
    easy::HighlightLines,
    highlighting::{FontStyle, Theme, ThemeSet},
    html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

pub fn theme_exists(name: &str) -> bool {
    THEME_SET.themes.contains_key(name)
}

/// Syntax highlighting for fenced code blocks, both as class-styled HTML for
/// the panel document and as styled lines for the terminal view.
#[derive(Debug, Clone)]
pub struct Highlighter {
    theme_name: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_THEME)
    }
}

impl Highlighter {
    pub fn new(theme_name: impl Into<String>) -> Self {
        let theme_name = theme_name.into();
        if !theme_exists(&theme_name) {
            log::warn!(
                "Unknown code theme '{}', falling back to '{}'",
                theme_name,
                DEFAULT_CODE_THEME
            );
            return Self {
                theme_name: DEFAULT_CODE_THEME.to_string(),
            };
        }
        Self { theme_name }
    }

    fn theme(&self) -> Option<&'static Theme> {
        THEME_SET
            .themes
            .get(&self.theme_name)
            .or_else(|| THEME_SET.themes.get(DEFAULT_CODE_THEME))
    }

    /// Looks up a fence info token such as `py`, `rust` or `Python`.
    pub fn find_language(&self, lang: &str) -> Option<&'static SyntaxReference> {
        let token = lang.trim();
        if token.is_empty() {
            return None;
        }
        SYNTAX_SET.find_syntax_by_token(token)
    }

    pub fn is_recognized(&self, lang: &str) -> bool {
        self.find_language(lang).is_some()
    }

    /// Highlights `code` into class-styled spans. Returns `None` when the
    /// language is unknown or the grammar fails, so callers can fall back to
    /// escaped plain text.
    pub fn highlight_html(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self.find_language(lang)?;
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);

        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                log::debug!("Highlighting {} failed: {}", syntax.name, e);
                return None;
            }
        }

        Some(generator.finalize())
    }

    /// CSS matching the classes emitted by [`Highlighter::highlight_html`].
    pub fn stylesheet(&self) -> String {
        let Some(theme) = self.theme() else {
            return String::new();
        };
        match css_for_theme_with_class_style(theme, CLASS_STYLE) {
            Ok(css) => css,
            Err(e) => {
                log::warn!("Could not build stylesheet for {}: {}", self.theme_name, e);
                String::new()
            }
        }
    }

    /// Highlights `code` for the terminal view. Unknown languages come back
    /// as unstyled lines.
    pub fn highlight_terminal(&self, code: &str, lang: &str) -> Vec<Line<'static>> {
        let plain = || {
            code.lines()
                .map(|line| Line::from(line.to_string()))
                .collect::<Vec<_>>()
        };

        let (Some(syntax), Some(theme)) = (self.find_language(lang), self.theme()) else {
            return plain();
        };

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut lines = Vec::new();
        for line in LinesWithEndings::from(code) {
            let ranges = match highlighter.highlight_line(line, &SYNTAX_SET) {
                Ok(ranges) => ranges,
                Err(e) => {
                    log::debug!("Terminal highlighting failed: {}", e);
                    return plain();
                }
            };

            let spans: Vec<Span<'static>> = ranges
                .into_iter()
                .map(|(style, text)| {
                    Span::styled(
                        text.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string(),
                        to_terminal_style(style),
                    )
                })
                .collect();
            lines.push(Line::from(spans));
        }
        lines
    }
}

fn to_terminal_style(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    let mut out = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_extension_and_name_tokens() {
        let highlighter = Highlighter::default();
        assert!(highlighter.is_recognized("py"));
        assert!(highlighter.is_recognized("python"));
        assert!(highlighter.is_recognized("rs"));
        assert!(!highlighter.is_recognized(""));
        assert!(!highlighter.is_recognized("definitely-not-a-language"));
    }

    #[test]
    fn test_highlight_html_emits_classed_spans() {
        let highlighter = Highlighter::default();
        let html = highlighter.highlight_html("print(1)\n", "py").unwrap();
        assert!(html.contains("<span class="));
        assert!(html.contains("print"));
    }

    #[test]
    fn test_highlight_html_unknown_language_is_none() {
        let highlighter = Highlighter::default();
        assert!(highlighter.highlight_html("x", "nope-lang").is_none());
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let highlighter = Highlighter::new("missing-theme");
        assert_eq!(highlighter.theme_name, DEFAULT_CODE_THEME);
        assert!(!highlighter.stylesheet().is_empty());
    }

    #[test]
    fn test_terminal_lines_keep_text() {
        let highlighter = Highlighter::default();
        let lines = highlighter.highlight_terminal("let x = 1;\nlet y = 2;\n", "rust");
        assert_eq!(lines.len(), 2);
        let first: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(first, "let x = 1;");
    }
}
