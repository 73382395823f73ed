//! Keyboard bridge: routes key input to whichever sink owns the keyboard.
//!
//! The caller picks the `InputTarget` from the phase, so exactly one of the
//! line editor and the interactive socket ever receives a given key.

use crate::core::keymap::{
    self, Arrow, DEL, InputMode, LINE_END, LINE_START, PhysicalKey, VirtualKeyPayload,
};
use crate::core::line_editor::LineEditor;

/// Raw byte sink of an interactive session.
pub trait InteractiveInput {
    /// Sends raw input. Dropped silently unless the socket is open.
    fn send_input(&mut self, data: &str);
}

pub enum InputTarget<'a> {
    Interactive(&'a mut dyn InteractiveInput),
    LineEditor(&'a mut dyn LineEditor),
}

impl InputTarget<'_> {
    pub fn mode(&self) -> InputMode {
        match self {
            InputTarget::Interactive(_) => InputMode::Interactive,
            InputTarget::LineEditor(_) => InputMode::LineEdit,
        }
    }

    fn emit(&mut self, data: &str) {
        match self {
            InputTarget::Interactive(socket) => socket.send_input(data),
            InputTarget::LineEditor(editor) => editor.inject_raw(data),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEdge {
    Start,
    End,
}

/// Result of offering a key to the Alt-navigation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltNavigation {
    /// Not an Alt keydown; the key continues down the normal path.
    NotApplicable,
    /// Alt keydown consumed without emitting anything.
    Suppressed,
    /// Alt keydown consumed and acted upon.
    Handled,
}

impl AltNavigation {
    pub fn handled(self) -> bool {
        self == AltNavigation::Handled
    }

    /// Whether the key must not be processed any further.
    pub fn consumed(self) -> bool {
        self != AltNavigation::NotApplicable
    }
}

/// Routes an on-screen or normalized key through the active sink.
pub fn send_virtual_keyboard_input(target: &mut InputTarget<'_>, payload: &VirtualKeyPayload) {
    if payload.key.is_empty() {
        return;
    }
    if let Some(sequence) = keymap::virtual_key_sequence(payload, target.mode()) {
        target.emit(&sequence);
    }
}

/// Word/line navigation for Alt-modified keydowns.
pub fn handle_alt_navigation(target: &mut InputTarget<'_>, key: &PhysicalKey) -> AltNavigation {
    if !key.alt || !key.is_keydown() {
        return AltNavigation::NotApplicable;
    }

    match target {
        InputTarget::Interactive(socket) => match keymap::alt_interactive_sequence(&key.key) {
            Some(sequence) => {
                socket.send_input(&sequence);
                AltNavigation::Handled
            }
            None => AltNavigation::Suppressed,
        },
        InputTarget::LineEditor(editor) => alt_line_edit(&mut **editor, &key.key),
    }
}

fn alt_line_edit(editor: &mut dyn LineEditor, key: &str) -> AltNavigation {
    let buffer = editor.buffer();
    let current = editor.cursor_pos();

    match (key, Arrow::from_key(key)) {
        (_, Some(Arrow::Left)) => {
            let target = keymap::find_word_boundary_left(&buffer, current);
            if target != current {
                editor.set_cursor_pos(target);
            }
        }
        (_, Some(Arrow::Right)) => {
            let target = keymap::find_word_boundary_right(&buffer, current);
            if target != current {
                editor.set_cursor_pos(target);
            }
        }
        (_, Some(Arrow::Up)) => editor.inject_raw(LINE_START),
        (_, Some(Arrow::Down)) => editor.inject_raw(LINE_END),
        ("Backspace", None) => {
            let target = keymap::find_word_boundary_left(&buffer, current);
            // One DEL per char so the editor's own redraw stays authoritative.
            for _ in target..current {
                editor.inject_raw(DEL);
            }
        }
        _ => return AltNavigation::Suppressed,
    }
    AltNavigation::Handled
}

/// Erases the current input line.
pub fn handle_clear_line(target: &mut InputTarget<'_>) -> bool {
    match target {
        InputTarget::Interactive(socket) => {
            socket.send_input(&format!("{LINE_END}{}", keymap::KILL_TO_START));
        }
        InputTarget::LineEditor(editor) => {
            let len = editor.buffer().chars().count();
            let after_cursor = len.saturating_sub(editor.cursor_pos());
            for _ in 0..after_cursor {
                editor.inject_raw(keymap::ARROW_RIGHT);
            }
            for _ in 0..len {
                editor.inject_raw(DEL);
            }
        }
    }
    true
}

/// Moves to the start or end of the current input line.
pub fn handle_jump_to_line_edge(target: &mut InputTarget<'_>, edge: LineEdge) -> bool {
    match target {
        InputTarget::Interactive(socket) => {
            let sequence = match edge {
                LineEdge::Start => LINE_START,
                LineEdge::End => LINE_END,
            };
            socket.send_input(sequence);
        }
        InputTarget::LineEditor(editor) => {
            let pos = match edge {
                LineEdge::Start => 0,
                LineEdge::End => editor.buffer().chars().count(),
            };
            editor.set_cursor_pos(pos);
        }
    }
    true
}

/// Redraws the line editor after a viewport change. Interactive sessions
/// are told about the new size separately.
pub fn handle_resize(target: &mut InputTarget<'_>) {
    if let InputTarget::LineEditor(editor) = target {
        editor.refresh();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::line_editor::LineBuffer;

    #[derive(Default)]
    pub(crate) struct RecordingSocket {
        pub sent: Vec<String>,
    }

    impl InteractiveInput for RecordingSocket {
        fn send_input(&mut self, data: &str) {
            self.sent.push(data.to_string());
        }
    }

    fn editor_with(text: &str) -> LineBuffer {
        let mut editor = LineBuffer::new();
        editor.begin_read("$ ");
        editor.inject_raw(text);
        editor
    }

    #[test]
    fn test_virtual_ctrl_a_interactive_sends_soh() {
        let mut socket = RecordingSocket::default();
        let payload = VirtualKeyPayload::new("a").with_ctrl();
        send_virtual_keyboard_input(&mut InputTarget::Interactive(&mut socket), &payload);
        assert_eq!(socket.sent, vec!["\u{1}"]);
    }

    #[test]
    fn test_virtual_ctrl_a_line_edit_moves_home() {
        let mut editor = editor_with("echo hi");
        editor.set_cursor_pos(3);
        let payload = VirtualKeyPayload::new("a").with_ctrl();
        send_virtual_keyboard_input(&mut InputTarget::LineEditor(&mut editor), &payload);
        assert_eq!(editor.cursor_pos(), 0);
        assert_eq!(editor.buffer(), "echo hi");
    }

    #[test]
    fn test_virtual_backspace_line_edit_deletes() {
        let mut editor = editor_with("abc");
        send_virtual_keyboard_input(
            &mut InputTarget::LineEditor(&mut editor),
            &VirtualKeyPayload::new("Backspace"),
        );
        assert_eq!(editor.buffer(), "ab");
    }

    #[test]
    fn test_alt_requires_keydown() {
        let mut socket = RecordingSocket::default();
        let key = PhysicalKey::new("ArrowLeft").alt().released();
        let result = handle_alt_navigation(&mut InputTarget::Interactive(&mut socket), &key);
        assert_eq!(result, AltNavigation::NotApplicable);

        let key = PhysicalKey::new("ArrowLeft");
        let result = handle_alt_navigation(&mut InputTarget::Interactive(&mut socket), &key);
        assert_eq!(result, AltNavigation::NotApplicable);
        assert!(socket.sent.is_empty());
    }

    #[test]
    fn test_alt_interactive() {
        let mut socket = RecordingSocket::default();
        let mut target = InputTarget::Interactive(&mut socket);
        let right = PhysicalKey::new("ArrowRight").alt();
        assert!(handle_alt_navigation(&mut target, &right).handled());
        let backspace = PhysicalKey::new("Backspace").alt();
        assert!(handle_alt_navigation(&mut target, &backspace).handled());
        assert!(handle_alt_navigation(&mut target, &PhysicalKey::new("b").alt()).handled());
        let other = handle_alt_navigation(&mut target, &PhysicalKey::new("Enter").alt());
        assert_eq!(other, AltNavigation::Suppressed);
        assert!(other.consumed());
        assert_eq!(socket.sent, vec!["\u{1b}[1;3C", "\u{1b}\u{7f}", "\u{1b}b"]);
    }

    #[test]
    fn test_alt_line_edit_word_moves() {
        let mut editor = editor_with("hello world  foo");
        let mut target = InputTarget::LineEditor(&mut editor);
        let left = PhysicalKey::new("ArrowLeft").alt();
        assert!(handle_alt_navigation(&mut target, &left).handled());
        assert!(handle_alt_navigation(&mut target, &left).handled());
        assert_eq!(editor.cursor_pos(), 6);

        let mut target = InputTarget::LineEditor(&mut editor);
        handle_alt_navigation(&mut target, &PhysicalKey::new("ArrowRight").alt());
        assert_eq!(editor.cursor_pos(), 11);
    }

    #[test]
    fn test_alt_line_edit_backspace_and_edges() {
        let mut editor = editor_with("git commit -m");
        let mut target = InputTarget::LineEditor(&mut editor);
        handle_alt_navigation(&mut target, &PhysicalKey::new("Backspace").alt());
        handle_alt_navigation(&mut target, &PhysicalKey::new("ArrowUp").alt());
        assert_eq!(editor.buffer(), "git commit ");
        assert_eq!(editor.cursor_pos(), 0);

        let mut target = InputTarget::LineEditor(&mut editor);
        handle_alt_navigation(&mut target, &PhysicalKey::new("ArrowDown").alt());
        assert_eq!(editor.cursor_pos(), 11);

        let mut target = InputTarget::LineEditor(&mut editor);
        let other = handle_alt_navigation(&mut target, &PhysicalKey::new("x").alt());
        assert_eq!(other, AltNavigation::Suppressed);
        assert_eq!(editor.buffer(), "git commit ");
    }

    #[test]
    fn test_clear_line() {
        let mut socket = RecordingSocket::default();
        assert!(handle_clear_line(&mut InputTarget::Interactive(&mut socket)));
        assert_eq!(socket.sent, vec!["\u{5}\u{15}"]);

        let mut editor = editor_with("rm -rf build");
        editor.set_cursor_pos(4);
        assert!(handle_clear_line(&mut InputTarget::LineEditor(&mut editor)));
        assert_eq!(editor.buffer(), "");
        assert_eq!(editor.cursor_pos(), 0);
    }

    #[test]
    fn test_jump_to_line_edge() {
        let mut socket = RecordingSocket::default();
        let mut target = InputTarget::Interactive(&mut socket);
        handle_jump_to_line_edge(&mut target, LineEdge::Start);
        handle_jump_to_line_edge(&mut target, LineEdge::End);
        assert_eq!(socket.sent, vec!["\u{1}", "\u{5}"]);

        let mut editor = editor_with("abc");
        handle_jump_to_line_edge(&mut InputTarget::LineEditor(&mut editor), LineEdge::Start);
        assert_eq!(editor.cursor_pos(), 0);
        handle_jump_to_line_edge(&mut InputTarget::LineEditor(&mut editor), LineEdge::End);
        assert_eq!(editor.cursor_pos(), 3);
    }
}
