use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Completed(completion) => app.on_completed(completion),
        AppEvent::InputClosed => app.should_quit = true,
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('r') if ctrl => {
            app.input_mode = InputMode::Message;
            app.reset();
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.chat_height.max(2) - 1);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.chat_height.max(2) - 1);
            return;
        }
        _ => {}
    }

    match app.input_mode {
        InputMode::Message => handle_message_mode(app, key, ctrl),
        InputMode::AttachPath => handle_path_mode(app, key),
    }
}

fn handle_message_mode(app: &mut App, key: KeyEvent, ctrl: bool) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('o') if ctrl => {
            if !app.in_flight() {
                app.input_mode = InputMode::AttachPath;
            }
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        _ => {
            edit_line(&mut app.input, &mut app.cursor, key);
        }
    }
}

fn handle_path_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Message;
            app.path_input.clear();
            app.path_cursor = 0;
        }
        KeyCode::Enter => app.submit_path(),
        _ => {
            edit_line(&mut app.path_input, &mut app.path_cursor, key);
        }
    }
}

/// Apply a cursor-editing key to a single-line input. Returns `false` for
/// keys that are not editing keys, including unbound Ctrl/Alt chords.
fn edit_line(input: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = input.chars().count();
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        // Ctrl+Alt together is AltGr on some layouts and still types
        KeyCode::Char(_) if is_chord(key.modifiers) => return false,
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

fn is_chord(modifiers: KeyModifiers) -> bool {
    let held = modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT);
    held == KeyModifiers::CONTROL || held == KeyModifiers::ALT
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use oceanchat_core::{Backend, Config, ConversationController, HttpBackend};
    use tokio::sync::mpsc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut String, cursor: &mut usize, text: &str) {
        for c in text.chars() {
            edit_line(input, cursor, press(KeyCode::Char(c)));
        }
    }

    fn test_app() -> App {
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new("http://127.0.0.1:9").unwrap());
        let controller = ConversationController::new(backend, &Config::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(controller, "test".to_string(), tx)
    }

    #[test]
    fn byte_index_respects_multibyte_chars() {
        let s = "año";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 3), s.len());
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }

    #[test]
    fn editing_inserts_at_cursor() {
        let mut input = String::new();
        let mut cursor = 0;
        type_str(&mut input, &mut cursor, "sea lvel");
        for _ in 0..3 {
            edit_line(&mut input, &mut cursor, press(KeyCode::Left));
        }
        assert_eq!(cursor, 5);
        type_str(&mut input, &mut cursor, "e");
        assert_eq!(input, "sea level");
        assert_eq!(cursor, 6);
    }

    #[test]
    fn backspace_and_delete_handle_unicode() {
        let mut input = "°C año".to_string();
        let mut cursor = input.chars().count();

        edit_line(&mut input, &mut cursor, press(KeyCode::Backspace));
        assert_eq!(input, "°C añ");

        edit_line(&mut input, &mut cursor, press(KeyCode::Home));
        edit_line(&mut input, &mut cursor, press(KeyCode::Delete));
        assert_eq!(input, "C añ");
        assert_eq!(cursor, 0);

        edit_line(&mut input, &mut cursor, press(KeyCode::Backspace));
        assert_eq!(input, "C añ");
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut input = "ab".to_string();
        let mut cursor = 0;
        edit_line(&mut input, &mut cursor, press(KeyCode::Left));
        assert_eq!(cursor, 0);
        edit_line(&mut input, &mut cursor, press(KeyCode::End));
        edit_line(&mut input, &mut cursor, press(KeyCode::Right));
        assert_eq!(cursor, 2);
    }

    #[test]
    fn non_editing_keys_are_reported() {
        let mut input = String::new();
        let mut cursor = 0;
        assert!(!edit_line(&mut input, &mut cursor, press(KeyCode::Tab)));
        assert!(edit_line(&mut input, &mut cursor, press(KeyCode::Char('x'))));
    }

    #[test]
    fn control_chords_do_not_type() {
        let mut input = "sea".to_string();
        let mut cursor = 3;
        let ctrl_a = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        assert!(!edit_line(&mut input, &mut cursor, ctrl_a));
        let alt_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert!(!edit_line(&mut input, &mut cursor, alt_x));
        assert_eq!(input, "sea");
        assert_eq!(cursor, 3);

        let shifted = KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT);
        assert!(edit_line(&mut input, &mut cursor, shifted));
        assert_eq!(input, "seaS");

        let alt_gr = KeyEvent::new(KeyCode::Char('@'), KeyModifiers::CONTROL | KeyModifiers::ALT);
        assert!(edit_line(&mut input, &mut cursor, alt_gr));
        assert_eq!(input, "seaS@");
    }

    #[tokio::test]
    async fn ctrl_letters_stay_out_of_the_message() {
        let mut app = test_app();
        handle_event(&mut app, AppEvent::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)));
        handle_event(&mut app, AppEvent::Key(press(KeyCode::Char('h'))));
        assert_eq!(app.input, "h");
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn closed_input_quits() {
        let mut app = test_app();
        handle_event(&mut app, AppEvent::InputClosed);
        assert!(app.should_quit);
    }
}
