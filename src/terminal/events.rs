use crossterm::event::{KeyCode, KeyEvent};

use crate::terminal::state::{AppState, Focus, ViewMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Refresh,
    Quit,
}

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> Action {
    match key.code {
        KeyCode::Char('q') => return Action::Quit,

        KeyCode::Esc => {
            if state.mode == ViewMode::Split {
                state.close_message();
                return Action::None;
            }
            return Action::Quit;
        }

        KeyCode::Enter => {
            state.open_selected();
            return Action::None;
        }

        KeyCode::Tab => {
            state.toggle_focus();
            return Action::None;
        }

        KeyCode::Char('r') => {
            state.refreshing = true;
            return Action::Refresh;
        }

        KeyCode::Char('s') => {
            state.cycle_filter();
            return Action::None;
        }

        _ => {}
    }

    match state.focus {
        Focus::List => handle_list_keys(key, state),
        Focus::Body => handle_body_keys(key, state),
    }
    Action::None
}

fn handle_list_keys(key: KeyEvent, state: &mut AppState) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => state.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => state.move_selection(-1),
        KeyCode::PageDown => state.move_selection(10),
        KeyCode::PageUp => state.move_selection(-10),
        KeyCode::Home => state.select_first(),
        KeyCode::End => state.select_last(),
        _ => {}
    }
}

fn handle_body_keys(key: KeyEvent, state: &mut AppState) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => state.scroll_body(1),
        KeyCode::Up | KeyCode::Char('k') => state.scroll_body(-1),
        KeyCode::PageDown => state.scroll_body(10),
        KeyCode::PageUp => state.scroll_body(-10),
        KeyCode::Home => state.body_scroll = 0,
        _ => {}
    }
}
