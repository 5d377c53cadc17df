use crate::App;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

const PAGE: u16 = 10;

pub fn handle_chat_input(key: KeyEvent, app: &mut App) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
        }
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            app.client.input_mut().push('\n');
        }
        KeyCode::Enter => {
            if app.submit().is_none() && !app.client.input().trim().is_empty() {
                app.logs.add("Panel is closed, question not sent");
            }
        }
        KeyCode::PageUp => {
            for _ in 0..PAGE {
                app.scroll_up();
            }
        }
        KeyCode::PageDown => {
            for _ in 0..PAGE {
                app.scroll_down();
            }
        }
        KeyCode::Up if key.modifiers.contains(KeyModifiers::ALT) => app.logs.scroll_up(),
        KeyCode::Down if key.modifiers.contains(KeyModifiers::ALT) => app.logs.scroll_down(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::End => app.follow = true,
        KeyCode::Backspace => {
            app.client.input_mut().pop();
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                match c {
                    'c' => app.should_quit = true,
                    'u' => app.scroll_up(),
                    'd' => app.scroll_down(),
                    'x' => app.cancel_active(),
                    _ => {}
                }
            } else {
                app.client.input_mut().push(c);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_chat_input(press(KeyCode::Char(c)), app);
        }
    }

    #[test]
    fn test_typing_and_enter_submits() {
        let (source, mut app, _dir) = test_app();
        type_text(&mut app, "hi!");
        handle_chat_input(press(KeyCode::Backspace), &mut app);
        assert_eq!(app.client.input(), "hi");

        handle_chat_input(press(KeyCode::Enter), &mut app);

        assert_eq!(source.opened(), vec!["hi".to_string()]);
        assert_eq!(app.client.input(), "");
        assert_eq!(app.client.scrollback().len(), 2);
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let (source, mut app, _dir) = test_app();
        type_text(&mut app, "a");
        handle_chat_input(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT), &mut app);
        type_text(&mut app, "b");

        assert_eq!(app.client.input(), "a\nb");
        assert!(source.opened().is_empty());
    }

    #[test]
    fn test_releases_are_ignored() {
        let (_source, mut app, _dir) = test_app();
        let release = KeyEvent {
            code: KeyCode::Char('x'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        handle_chat_input(release, &mut app);
        assert_eq!(app.client.input(), "");
    }

    #[test]
    fn test_quit_keys() {
        let (_source, mut app, _dir) = test_app();
        handle_chat_input(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut app);
        assert!(app.should_quit);

        let (_source, mut app, _dir) = test_app();
        handle_chat_input(press(KeyCode::Esc), &mut app);
        assert!(app.should_quit);
    }

    #[test]
    fn test_alt_arrows_scroll_the_activity_log() {
        let (_source, mut app, _dir) = test_app();
        app.logs.add("one");
        app.logs.add("two");

        handle_chat_input(KeyEvent::new(KeyCode::Up, KeyModifiers::ALT), &mut app);
        assert_eq!(app.logs.scroll_offset, 1);
        assert!(app.follow);

        handle_chat_input(KeyEvent::new(KeyCode::Down, KeyModifiers::ALT), &mut app);
        assert_eq!(app.logs.scroll_offset, 0);
    }

    #[test]
    fn test_ctrl_x_cancels_the_answer() {
        let (_source, mut app, _dir) = test_app();
        type_text(&mut app, "q");
        handle_chat_input(press(KeyCode::Enter), &mut app);
        assert!(app.client.has_active_stream());

        handle_chat_input(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL), &mut app);
        assert!(!app.client.has_active_stream());
    }
}
