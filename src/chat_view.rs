use crate::chat_message::ChatMessage;
use crate::ui::{footer::draw_footer, header::draw_header};
use crate::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Line and column counts for ratatui offsets, saturating instead of wrapping.
fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub fn draw_chat(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(f, outer[0], app);

    let horizontal_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(2, 3), Constraint::Ratio(1, 3)])
        .margin(1)
        .split(outer[1]);

    let input_lines = app.client.input().split('\n').count().clamp(1, 5) as u16;
    let chat_vertical_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(input_lines + 2),
        ])
        .split(horizontal_chunks[0]);

    draw_messages(f, app, chat_vertical_chunks[0]);
    app.status_indicator.render(f, chat_vertical_chunks[1]);
    draw_input(f, app, chat_vertical_chunks[2]);
    draw_logs(f, app, horizontal_chunks[1]);

    draw_footer(f, outer[2], app);
}

fn draw_messages(f: &mut Frame, app: &mut App, area: Rect) {
    let highlighter = app.client.renderer().highlighter();
    let mut lines = Vec::new();
    for (idx, rendered) in app.client.scrollback().iter().enumerate() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        let message = ChatMessage::new(&rendered.message, app.message_status(idx), highlighter);
        lines.extend(message.render(area));
    }

    let total_lines = clamp_u16(lines.len());
    let max_scroll = total_lines.saturating_sub(area.height);
    if app.follow || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let msgs_para = Paragraph::new(lines)
        .style(Style::default())
        .block(Block::default())
        .wrap(Wrap { trim: false });
    f.render_widget(msgs_para.scroll((app.chat_scroll, 0)), area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let separator = "─".repeat(area.width as usize);
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            separator.clone(),
            Style::default().fg(Color::DarkGray),
        ))),
        Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: 1,
        },
    );

    let input = app.client.input();
    let rows: Vec<&str> = input.split('\n').collect();
    let visible_rows = area.height.saturating_sub(2).max(1) as usize;
    let first_row = rows.len().saturating_sub(visible_rows);

    let lines: Vec<Line> = rows[first_row..]
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let prefix = if first_row + i == 0 { "→ " } else { "  " };
            Line::from(vec![
                Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                Span::styled(*row, Style::default().fg(Color::White)),
            ])
        })
        .collect();

    let last_row = rows.last().copied().unwrap_or_default();
    let visible_width = area.width.saturating_sub(2);
    let text_width = clamp_u16(last_row.width());
    let scroll_offset = text_width.saturating_sub(visible_width);

    f.render_widget(
        Paragraph::new(lines).scroll((0, scroll_offset)),
        Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height.saturating_sub(2),
        },
    );

    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            separator,
            Style::default().fg(Color::DarkGray),
        ))),
        Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(1),
            width: area.width,
            height: 1,
        },
    );

    let cursor_row = clamp_u16((rows.len() - first_row).saturating_sub(1));
    let cursor_x = area.x.saturating_add(2 + (text_width - scroll_offset));
    f.set_cursor_position((cursor_x, area.y + 1 + cursor_row));
}

fn draw_logs(f: &mut Frame, app: &App, area: Rect) {
    if area.x == 0 || area.height == 0 {
        return;
    }

    let vsep = vec![Line::from("│"); area.height as usize];
    f.render_widget(
        Paragraph::new(vsep).style(Style::default().fg(Color::DarkGray)),
        Rect {
            x: area.x - 1,
            y: area.y,
            width: 1,
            height: area.height,
        },
    );

    let log_lines: Vec<Line> = app
        .logs
        .entries
        .iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled("• ", Style::default().fg(Color::DarkGray)),
                Span::raw(entry.as_str()),
            ])
        })
        .collect();

    let total_log_lines = clamp_u16(log_lines.len());
    let max_log_scroll = total_log_lines.saturating_sub(area.height);
    let logs_scroll = max_log_scroll.saturating_sub(app.logs.scroll_offset);

    let logs_para = Paragraph::new(log_lines)
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    f.render_widget(logs_para.scroll((logs_scroll, 0)), area);
}
