use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    DismissError,
    MoveUp,
    MoveDown,
    Refresh,
    OpenBrowser,
    Push,
    DownloadOutputs,
    None,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputContext {
    pub has_error: bool,
    pub is_loading: bool,
    pub is_pushing: bool,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => {
            if ctx.has_error {
                Action::DismissError
            } else {
                Action::Quit
            }
        }
        KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
        KeyCode::Char('r') if !ctx.is_loading && !ctx.is_pushing => Action::Refresh,
        KeyCode::Char('p') if !ctx.is_pushing => Action::Push,
        KeyCode::Char('d') if !ctx.is_pushing => Action::DownloadOutputs,
        KeyCode::Char('o') | KeyCode::Enter => Action::OpenBrowser,
        _ => Action::None,
    }
}
