use crate::exchange::ExchangeState;
use crate::highlight::Highlighter;
use crate::models::{Message, Sender};
use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Sent,
    Waiting,
    Streaming,
    Done,
    Failed,
}

impl MessageStatus {
    pub fn from_exchange(state: ExchangeState) -> Self {
        match state {
            ExchangeState::Idle | ExchangeState::AwaitingFirstChunk => MessageStatus::Waiting,
            ExchangeState::Streaming => MessageStatus::Streaming,
            ExchangeState::Done => MessageStatus::Done,
            ExchangeState::Errored => MessageStatus::Failed,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            MessageStatus::Sent => "●",
            MessageStatus::Waiting => "○",
            MessageStatus::Streaming => "◌",
            MessageStatus::Done => "✓",
            MessageStatus::Failed => "✗",
        }
    }
}

/// Terminal rendering of one scrollback message. The markdown source is
/// shown as wrapped text, with fenced code highlighted line by line.
pub struct ChatMessage<'a> {
    message: &'a Message,
    status: MessageStatus,
    highlighter: &'a Highlighter,
}

impl<'a> ChatMessage<'a> {
    pub fn new(message: &'a Message, status: MessageStatus, highlighter: &'a Highlighter) -> Self {
        Self {
            message,
            status,
            highlighter,
        }
    }

    pub fn render(&self, area: Rect) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let base_style = self.base_style();

        self.render_header(&mut lines, base_style);
        self.render_content(&mut lines, area, base_style);
        self.render_footer(&mut lines, base_style);

        lines
    }

    fn from_user(&self) -> bool {
        self.message.sender == Sender::User
    }

    fn indent(&self) -> &'static str {
        if self.from_user() {
            "  "
        } else {
            ""
        }
    }

    fn base_style(&self) -> Style {
        let mut style = Style::default().fg(if self.from_user() {
            Color::Rgb(255, 223, 128)
        } else {
            Color::Rgb(144, 238, 144)
        });

        match self.status {
            MessageStatus::Failed => style = style.fg(Color::Red).add_modifier(Modifier::DIM),
            MessageStatus::Waiting => style = style.add_modifier(Modifier::DIM),
            _ => {}
        }

        style
    }

    fn render_header(&self, lines: &mut Vec<Line<'static>>, style: Style) {
        let timestamp = self
            .message
            .timestamp
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string();
        let who = if self.from_user() { "you" } else { "assistant" };

        lines.push(Line::from(vec![
            Span::styled(self.indent().to_string(), style),
            Span::styled("┌─".to_string(), style),
            Span::styled(timestamp, style.add_modifier(Modifier::DIM)),
            Span::styled(format!(" {} ", who), style.add_modifier(Modifier::BOLD)),
            Span::styled(self.status.icon().to_string(), style),
        ]));
    }

    fn render_content(&self, lines: &mut Vec<Line<'static>>, area: Rect, style: Style) {
        let mut fence: Option<String> = None;
        let mut code_buffer = String::new();
        let mut text_buffer = String::new();

        for line in self.message.text.lines() {
            let trimmed = line.trim_start();
            if let Some(info) = trimmed.strip_prefix("```") {
                match fence.take() {
                    Some(lang) => {
                        self.flush_code_buffer(lines, &code_buffer, &lang, style);
                        code_buffer.clear();
                    }
                    None => {
                        self.flush_text_buffer(lines, &text_buffer, area, style);
                        text_buffer.clear();
                        let lang = info.split_whitespace().next().unwrap_or_default();
                        fence = Some(lang.to_string());
                    }
                }
                continue;
            }

            let buffer = if fence.is_some() {
                &mut code_buffer
            } else {
                &mut text_buffer
            };
            buffer.push_str(line);
            buffer.push('\n');
        }

        self.flush_text_buffer(lines, &text_buffer, area, style);
        if let Some(lang) = fence {
            self.flush_code_buffer(lines, &code_buffer, &lang, style);
        }
    }

    fn flush_text_buffer(
        &self,
        lines: &mut Vec<Line<'static>>,
        buffer: &str,
        area: Rect,
        style: Style,
    ) {
        if buffer.is_empty() {
            return;
        }

        let prefix_width = self.indent().width() + "│ ".width();
        let wrap_width = (area.width as usize).saturating_sub(prefix_width).max(1);

        for paragraph_line in buffer.lines() {
            if paragraph_line.is_empty() {
                lines.push(self.prefixed(Vec::new(), style));
                continue;
            }
            for wrapped_line in wrap(paragraph_line, wrap_width) {
                lines.push(self.prefixed(
                    vec![Span::styled(wrapped_line.to_string(), style)],
                    style,
                ));
            }
        }
    }

    fn flush_code_buffer(
        &self,
        lines: &mut Vec<Line<'static>>,
        buffer: &str,
        lang: &str,
        style: Style,
    ) {
        if buffer.is_empty() {
            return;
        }

        for code_line in self.highlighter.highlight_terminal(buffer, lang) {
            let mut spans = vec![
                Span::styled("▎".to_string(), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
            ];
            spans.extend(code_line.spans);
            lines.push(self.prefixed(spans, style));
        }
    }

    fn render_footer(&self, lines: &mut Vec<Line<'static>>, style: Style) {
        lines.push(Line::from(vec![
            Span::styled(self.indent().to_string(), style),
            Span::styled("╰─".to_string(), style),
        ]));
    }

    fn prefixed(&self, spans: Vec<Span<'static>>, style: Style) -> Line<'static> {
        let mut line = vec![
            Span::styled(self.indent().to_string(), style),
            Span::styled("│ ".to_string(), style),
        ];
        line.extend(spans);
        Line::from(line)
    }
}
