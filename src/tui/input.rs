//! Input handling for the TUI.
//!
//! Processes keyboard events and updates application state.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::AppMode;
use crate::App;

/// Handle keyboard events.
pub fn handle_events(key: KeyEvent, app: &mut App) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C and Ctrl+Q quit from anywhere, even while busy
    if ctrl && matches!(key.code, KeyCode::Char('c' | 'q')) {
        app.force_quit();
        return;
    }

    match &app.mode {
        AppMode::Normal => handle_normal_mode(key, app),
        AppMode::SiteDialog => handle_dialog_mode(key, app, App::submit_site),
        AppMode::CredentialsDialog(_) => {
            if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
                app.next_credential_field();
            } else {
                handle_dialog_mode(key, app, App::submit_credentials);
            }
        }
        AppMode::OutputDialog => handle_dialog_mode(key, app, App::submit_output),
        AppMode::Message(_) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ' | 'q')) {
                app.dismiss();
            }
        }
    }
}

/// Handle input while browsing the course tree.
fn handle_normal_mode(key: KeyEvent, app: &mut App) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('s') if ctrl => app.open_site_dialog(),

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),

        // Actions
        KeyCode::Enter | KeyCode::Right => app.activate(),
        KeyCode::Char(' ') => app.toggle_selection(),
        KeyCode::Char('v') => app.toggle_visibility(),
        KeyCode::Char('r') | KeyCode::F(5) => app.reload(),
        KeyCode::Char('c') => app.toggle_combine(),
        KeyCode::Char('e') => app.start_export(),
        KeyCode::Char('i' | '?') => app.show_about(),
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        _ => {}
    }
}

/// Handle input in a text dialog. `submit` runs on Enter.
fn handle_dialog_mode(key: KeyEvent, app: &mut App, submit: fn(&mut App)) {
    match key.code {
        KeyCode::Enter => submit(app),
        KeyCode::Esc => app.dismiss(),
        code => {
            let Some(input) = app.focused_input() else { return };
            match code {
                KeyCode::Char(c) => input.enter_char(c),
                KeyCode::Backspace => input.delete_char(),
                KeyCode::Left => input.move_cursor_left(),
                KeyCode::Right => input.move_cursor_right(),
                _ => {}
            }
        }
    }
}
