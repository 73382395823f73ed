//! Key → byte-sequence translation.
//!
//! Pure functions only. Which sink receives the bytes (socket or line
//! editor) is decided by `core::keyboard` from the current phase.

use serde::Deserialize;

pub const ESC: &str = "\u{1b}";
pub const DEL: &str = "\u{7f}";
pub const BS: &str = "\u{8}";
pub const CR: &str = "\r";
pub const TAB: &str = "\t";
pub const ETX: &str = "\u{3}";
/// Ctrl+A
pub const LINE_START: &str = "\u{1}";
/// Ctrl+E
pub const LINE_END: &str = "\u{5}";
/// Ctrl+U
pub const KILL_TO_START: &str = "\u{15}";
/// `ESC DEL`, delete the word left of the cursor.
pub const ALT_BACKSPACE: &str = "\u{1b}\u{7f}";
pub const ARROW_RIGHT: &str = "\u{1b}[C";

/// Which sink a sequence is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Interactive,
    LineEdit,
}

/// Arrow direction as named by DOM-style key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    Up,
    Down,
    Left,
    Right,
}

impl Arrow {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(Arrow::Up),
            "ArrowDown" => Some(Arrow::Down),
            "ArrowLeft" => Some(Arrow::Left),
            "ArrowRight" => Some(Arrow::Right),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            Arrow::Up => 'A',
            Arrow::Down => 'B',
            Arrow::Right => 'C',
            Arrow::Left => 'D',
        }
    }

    /// `ESC [ <letter>`
    pub fn sequence(self) -> String {
        format!("\u{1b}[{}", self.letter())
    }

    /// `ESC [ 1 ; 3 <letter>`
    pub fn alt_sequence(self) -> String {
        format!("\u{1b}[1;3{}", self.letter())
    }
}

/// Normalized key input shared by physical and on-screen keyboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VirtualKeyPayload {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
}

impl VirtualKeyPayload {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
        }
    }

    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Whether a physical key event is a press or a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    KeyDown,
    KeyUp,
}

/// A physical key event with DOM-style key names
/// (`"Enter"`, `"ArrowLeft"`, `"F5"`, or a single character).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalKey {
    pub key: String,
    pub kind: KeyEventKind,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl PhysicalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    #[must_use]
    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    #[must_use]
    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    #[must_use]
    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    #[must_use]
    pub fn released(mut self) -> Self {
        self.kind = KeyEventKind::KeyUp;
        self
    }

    pub fn is_keydown(&self) -> bool {
        self.kind == KeyEventKind::KeyDown
    }

    /// The key as a single character, if it is one.
    pub fn single_char(&self) -> Option<char> {
        single_char(&self.key)
    }

    pub fn to_virtual(&self) -> VirtualKeyPayload {
        VirtualKeyPayload {
            key: self.key.clone(),
            ctrl: self.ctrl,
            shift: self.shift,
        }
    }
}

pub(crate) fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Maps a key name to its control character.
///
/// Single characters map directly. Longer names only map through a
/// trailing `+<char>` (so `"Ctrl+C"` style labels work); named keys such
/// as `Enter` or `ArrowUp` have no control character.
pub fn control_char_for_key(raw_key: &str) -> Option<char> {
    let trimmed = raw_key.trim();
    let base = match single_char(trimmed) {
        Some(c) => c,
        None => {
            let (_, tail) = trimmed.rsplit_once('+')?;
            single_char(tail)?
        }
    };

    match base.to_ascii_uppercase() {
        upper @ 'A'..='Z' => char::from_u32(u32::from(upper) - 64),
        '@' => Some('\u{0}'),
        '[' => Some('\u{1b}'),
        '\\' => Some('\u{1c}'),
        ']' => Some('\u{1d}'),
        '^' => Some('\u{1e}'),
        '_' => Some('\u{1f}'),
        _ => None,
    }
}

/// Translates a virtual key payload into the bytes for `mode`.
///
/// First match wins: control char, Escape, arrows, Enter, Backspace,
/// then a single printable character.
pub fn virtual_key_sequence(payload: &VirtualKeyPayload, mode: InputMode) -> Option<String> {
    let key = payload.key.as_str();
    if key.is_empty() {
        return None;
    }

    if payload.ctrl {
        return control_char_for_key(key).map(String::from);
    }

    if key == "Escape" {
        return Some(ESC.to_string());
    }

    if let Some(arrow) = Arrow::from_key(key) {
        return Some(arrow.sequence());
    }

    match key {
        "Enter" => return Some(CR.to_string()),
        "Backspace" => {
            let erase = match mode {
                InputMode::Interactive => BS,
                InputMode::LineEdit => DEL,
            };
            return Some(erase.to_string());
        }
        _ => {}
    }

    let c = single_char(key)?;
    if payload.shift && c.is_ascii_alphabetic() {
        Some(c.to_ascii_uppercase().to_string())
    } else {
        Some(c.to_string())
    }
}

/// Bytes for an Alt-modified key while interactive.
pub fn alt_interactive_sequence(key: &str) -> Option<String> {
    if let Some(arrow) = Arrow::from_key(key) {
        return Some(arrow.alt_sequence());
    }
    if key == "Backspace" {
        return Some(ALT_BACKSPACE.to_string());
    }
    single_char(key).map(|c| format!("{ESC}{c}"))
}

/// Bytes for a plain (unmodified) physical key while interactive.
pub fn interactive_key_sequence(key: &PhysicalKey) -> Option<String> {
    if key.meta {
        return None;
    }
    if key.ctrl && key.key.eq_ignore_ascii_case("c") {
        return Some(ETX.to_string());
    }
    match key.key.as_str() {
        "Enter" => Some(CR.to_string()),
        "Backspace" => Some(BS.to_string()),
        "Tab" => Some(TAB.to_string()),
        "Escape" => Some(ESC.to_string()),
        other => Arrow::from_key(other)
            .map(Arrow::sequence)
            .or_else(|| single_char(other).map(String::from)),
    }
}

// ============================================================================
// Word boundaries
// ============================================================================

/// Start of the word left of `index` (char positions, clamped at 0).
pub fn find_word_boundary_left(buffer: &str, index: usize) -> usize {
    let chars: Vec<char> = buffer.chars().collect();
    let mut idx = index.min(chars.len());
    if idx == 0 {
        return 0;
    }
    idx -= 1;
    while idx > 0 && chars[idx].is_whitespace() {
        idx -= 1;
    }
    while idx > 0 && !chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    idx
}

/// Just past the word at or right of `index` (clamped at the buffer length).
pub fn find_word_boundary_right(buffer: &str, index: usize) -> usize {
    let chars: Vec<char> = buffer.chars().collect();
    let len = chars.len();
    let mut idx = index;
    if idx >= len {
        return len;
    }
    while idx < len && chars[idx].is_whitespace() {
        idx += 1;
    }
    while idx < len && !chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}
