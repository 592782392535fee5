use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tripmate_core::conversation::QUICK_REPLY_TOPICS;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Line editing shared by the message input and the API key popup
fn edit_line(buffer: &mut String, cursor: &mut usize, code: KeyCode) {
    match code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < buffer.chars().count() {
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(buffer.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = buffer.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(buffer, *cursor);
            buffer.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Notice(notice) => app.show_notice(notice),
        AppEvent::Tick => app.on_tick(),
    }
    app.poll_reply().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('l') => {
                app.reset();
                return;
            }
            _ => {}
        }
    }

    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_api_key_input(),
        KeyCode::Enter => app.save_api_key(),
        code => edit_line(&mut app.api_key_input, &mut app.api_key_input_cursor, code),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn focus_input(app: &mut App) {
    app.focus = FocusPane::Input;
    app.input_mode = InputMode::Editing;
    // Cursor at end of existing text
    app.input_cursor = app.input.chars().count();
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Number keys pick a quick reply from anywhere once they are showing
    if let KeyCode::Char(c @ '1'..='9') = key.code {
        if app.show_quick_replies {
            let idx = (c as usize) - ('1' as usize);
            if idx < QUICK_REPLY_TOPICS.len() {
                app.quick_reply_idx = idx;
                app.send_quick_reply(idx);
            }
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Tab cycles: Messages -> QuickReplies (if shown) -> Input -> Messages
        KeyCode::Tab => match app.focus {
            FocusPane::Messages if app.show_quick_replies => app.focus = FocusPane::QuickReplies,
            FocusPane::Messages | FocusPane::QuickReplies => focus_input(app),
            FocusPane::Input => app.focus = FocusPane::Messages,
        },
        KeyCode::Char('i') => focus_input(app),

        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('K') => app.open_api_key_input(),
        KeyCode::Char('r') => app.retry_greeting(),

        _ => match app.focus {
            FocusPane::Messages | FocusPane::Input => handle_messages_key(app, key),
            FocusPane::QuickReplies => handle_quick_replies_key(app, key),
        },
    }
}

fn handle_messages_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next_entry(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_entry(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height),
        KeyCode::PageUp => app.scroll_up(app.chat_height),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),
        // Long-press analogue: edit the selected user message
        KeyCode::Char('e') | KeyCode::Enter => app.begin_edit_selected(),
        KeyCode::Esc => app.selected_entry = None,
        _ => {}
    }
}

fn handle_quick_replies_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('l') | KeyCode::Right => app.quick_reply_next(),
        KeyCode::Char('h') | KeyCode::Left => app.quick_reply_prev(),
        KeyCode::Enter => app.send_quick_reply(app.quick_reply_idx),
        KeyCode::Esc => app.focus = FocusPane::Messages,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            // Leaving the input abandons a pending edit
            app.cancel_edit();
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Messages;
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Messages;
        }
        KeyCode::Enter => {
            // Empty input is only meaningful while editing
            if !app.input.trim().is_empty() || app.session.editing().is_some() {
                app.submit();
            }
        }
        code => edit_line(&mut app.input, &mut app.input_cursor, code),
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.show_api_key_input || app.show_model_picker {
        return;
    }

    if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
        let clicked = app
            .quick_reply_areas
            .iter()
            .position(|r| point_in_rect(mouse.column, mouse.row, *r));
        if let (true, Some(idx)) = (app.show_quick_replies, clicked) {
            app.quick_reply_idx = idx;
            app.send_quick_reply(idx);
        }
        return;
    }

    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
