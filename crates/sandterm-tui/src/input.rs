//! Crossterm events to sandterm input.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind as CrosstermKind, KeyModifiers};
use sandterm_core::core::keyboard::LineEdge;
use sandterm_core::core::keymap::{KeyEventKind, PhysicalKey};

/// A terminal event as the app understands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    Key(PhysicalKey),
    Paste(String),
    Resize(u16, u16),
}

/// Editing commands bound to keys that reach no shell otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Shift+Delete
    ClearLine,
    /// Shift+Home / Shift+End
    JumpToEdge(LineEdge),
    /// Alt with an arrow, Backspace or a character
    AltNavigation,
}

pub fn shortcut(key: &PhysicalKey) -> Option<Shortcut> {
    if !key.is_keydown() || key.ctrl || key.meta {
        return None;
    }
    if key.alt {
        return Some(Shortcut::AltNavigation);
    }
    if !key.shift {
        return None;
    }
    match key.key.as_str() {
        "Delete" => Some(Shortcut::ClearLine),
        "Home" => Some(Shortcut::JumpToEdge(LineEdge::Start)),
        "End" => Some(Shortcut::JumpToEdge(LineEdge::End)),
        _ => None,
    }
}

pub fn translate_event(event: &Event) -> Option<TerminalInput> {
    match event {
        Event::Key(key) => translate_key(key).map(TerminalInput::Key),
        Event::Paste(text) => Some(TerminalInput::Paste(text.clone())),
        Event::Resize(cols, rows) => Some(TerminalInput::Resize(*cols, *rows)),
        _ => None,
    }
}

/// Maps a crossterm key to a DOM-style key name plus modifiers.
pub fn translate_key(key: &KeyEvent) -> Option<PhysicalKey> {
    let mut shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let name = match key.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => {
            shift = true;
            "Tab".to_string()
        }
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        _ => return None,
    };

    let kind = match key.kind {
        CrosstermKind::Press | CrosstermKind::Repeat => KeyEventKind::KeyDown,
        CrosstermKind::Release => KeyEventKind::KeyUp,
    };

    Some(PhysicalKey {
        key: name,
        kind,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift,
        meta: key
            .modifiers
            .intersects(KeyModifiers::SUPER | KeyModifiers::META),
    })
}
