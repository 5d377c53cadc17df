use crate::constants::PANEL_HEADING;
use crate::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn draw_header(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .style(Style::default().fg(Color::LightCyan).bg(Color::Black))
        .borders(Borders::NONE);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let title = Paragraph::new(PANEL_HEADING)
        .style(
            Style::default()
                .fg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Left);
    f.render_widget(title, chunks[0]);

    let endpoint = Paragraph::new(app.client.endpoint().to_string())
        .style(Style::default().fg(Color::LightMagenta))
        .alignment(Alignment::Right);
    f.render_widget(endpoint, chunks[1]);
}
