use crate::App;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    widgets::{Paragraph, Wrap},
    Frame,
};

/// Draws the footer with instructions for the current state.
pub fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &App) {
    let instructions = if app.is_streaming() {
        "Ctrl+X stops the answer. Enter asks a new question. Esc to quit."
    } else {
        "Enter to ask, Shift+Enter for a new line, PgUp/PgDn to scroll, Alt+Up/Down for the log, Esc to quit."
    };

    let footer = Paragraph::new(instructions)
        .style(Style::default().fg(Color::LightCyan))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(footer, area);
}
