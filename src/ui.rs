// src/ui.rs

pub mod footer;
pub mod header;

use crate::{chat_view::draw_chat, errors::PanelResult, key_handlers::handle_chat_input, App};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{io, time::Duration};
use tokio::{sync::mpsc, time};

const TICK_RATE: Duration = Duration::from_millis(120);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Runs the terminal UI until the user quits.
pub async fn run_ui(app: &mut App) -> PanelResult<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        log::error!("UI loop failed: {}", err);
    }
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> PanelResult<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CEvent>();

    // crossterm's reader blocks, so it gets its own thread.
    tokio::task::spawn_blocking(move || loop {
        if tx.is_closed() {
            return;
        }
        match event::poll(POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read terminal event: {}", e);
                    return;
                }
            },
            Ok(false) => {}
            Err(e) => {
                log::error!("Failed to poll terminal events: {}", e);
                return;
            }
        }
    });

    let mut ticker = time::interval(TICK_RATE);

    loop {
        terminal.draw(|f| draw_chat(f, app))?;

        tokio::select! {
            input = rx.recv() => match input {
                Some(CEvent::Key(key)) => handle_chat_input(key, app),
                Some(_) => {}
                None => break,
            },
            Some((handle, event)) = app.client.next_event(), if app.client.has_active_stream() => {
                app.apply(handle, event);
            }
            _ = ticker.tick() => app.on_tick(),
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
