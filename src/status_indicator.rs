use crate::exchange::ExchangeState;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

#[derive(Debug, Default)]
pub struct StatusIndicator {
    thinking: bool,
    status_text: String,
    failed: bool,
    spinner_idx: usize,
}

impl StatusIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status_text = status.into();
    }

    /// Mirrors the newest exchange.
    pub fn sync(&mut self, state: ExchangeState) {
        self.thinking = state.is_live();
        self.failed = state == ExchangeState::Errored;
        self.status_text = match state {
            ExchangeState::Idle => String::new(),
            ExchangeState::AwaitingFirstChunk => "Waiting for the assistant...".to_string(),
            ExchangeState::Streaming => "Receiving answer...".to_string(),
            ExchangeState::Done => String::new(),
            ExchangeState::Errored => "Answer interrupted".to_string(),
        };
    }

    pub fn update_spinner(&mut self) {
        if self.thinking {
            self.spinner_idx = self.spinner_idx.wrapping_add(1);
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let spinner_frames = ["◐", "◓", "◑", "◒"];
        let thinking_indicator = if self.thinking {
            spinner_frames[self.spinner_idx % spinner_frames.len()]
        } else {
            " "
        };

        let status_color = if self.failed {
            Color::Yellow
        } else {
            Color::DarkGray
        };

        let status = Line::from(vec![
            Span::styled(thinking_indicator, Style::default().fg(Color::Gray)),
            Span::raw(" "),
            Span::styled(self.status_text.as_str(), Style::default().fg(status_color)),
        ]);

        frame.render_widget(
            Paragraph::new(status).alignment(ratatui::layout::Alignment::Left),
            Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: 1.min(area.height),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_tracks_exchange_state() {
        let mut status = StatusIndicator::new();
        status.sync(ExchangeState::AwaitingFirstChunk);
        assert!(status.is_thinking());
        assert!(!status.status_text().is_empty());

        status.sync(ExchangeState::Done);
        assert!(!status.is_thinking());
        assert_eq!(status.status_text(), "");

        status.sync(ExchangeState::Errored);
        assert!(!status.is_thinking());
        assert_eq!(status.status_text(), "Answer interrupted");
    }

    #[test]
    fn test_spinner_only_moves_while_thinking() {
        let mut status = StatusIndicator::new();
        status.update_spinner();
        assert_eq!(status.spinner_idx, 0);
        status.sync(ExchangeState::Streaming);
        status.update_spinner();
        assert_eq!(status.spinner_idx, 1);
    }
}
