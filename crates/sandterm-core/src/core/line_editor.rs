//! Line editing front-end.
//!
//! `LineEditor` is the minimal capability surface the keyboard layer needs.
//! `LineBuffer` is the in-repo implementation: a byte-driven readline that
//! renders into an ANSI output queue the caller flushes to the terminal.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;

use crate::core::keymap::{find_word_boundary_left, find_word_boundary_right};

/// Capabilities required from any line editor.
///
/// Positions are char indices into the buffer.
pub trait LineEditor {
    fn buffer(&self) -> String;
    fn cursor_pos(&self) -> usize;
    /// Moves the cursor (clamped to the buffer) and updates the display.
    fn set_cursor_pos(&mut self, pos: usize);
    /// Redraws prompt and buffer.
    fn refresh(&mut self);
    /// Feeds raw terminal input as if it had been typed.
    fn inject_raw(&mut self, data: &str);
}

/// Outcome of a read, produced while processing input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Submitted(String),
    /// Ctrl+C abandoned the read.
    Interrupted,
    /// Ctrl+D on an empty line.
    Eof,
    /// Ctrl+L; the read stays active.
    ClearScreen,
}

const HISTORY_LIMIT: usize = 500;

#[derive(Debug)]
pub struct LineBuffer {
    prompt: String,
    chars: Vec<char>,
    pos: usize,
    reading: bool,
    cols: usize,
    /// Row of the cursor relative to the prompt's first row.
    cursor_row: usize,
    history: VecDeque<String>,
    history_index: Option<usize>,
    draft: Vec<char>,
    output: String,
    events: VecDeque<LineEvent>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            prompt: String::new(),
            chars: Vec::new(),
            pos: 0,
            reading: false,
            cols: 80,
            cursor_row: 0,
            history: VecDeque::new(),
            history_index: None,
            draft: Vec::new(),
            output: String::new(),
            events: VecDeque::new(),
        }
    }

    /// Starts a new read: prints the prompt and accepts input until the
    /// line is submitted or abandoned.
    pub fn begin_read(&mut self, prompt: &str) {
        prompt.clone_into(&mut self.prompt);
        self.chars.clear();
        self.pos = 0;
        self.cursor_row = 0;
        self.history_index = None;
        self.draft.clear();
        self.reading = true;
        self.output.push_str(&self.prompt);
    }

    pub fn is_reading(&self) -> bool {
        self.reading
    }

    /// Abandons the current read without emitting an event.
    ///
    /// Returns whether a read was active.
    pub fn cancel_read(&mut self) -> bool {
        if !self.reading {
            return false;
        }
        self.move_to_end();
        self.reading = false;
        true
    }

    pub fn set_width(&mut self, cols: u16) {
        self.cols = usize::from(cols.max(1));
    }

    /// Drains the pending ANSI output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn next_event(&mut self) -> Option<LineEvent> {
        self.events.pop_front()
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    fn push_history(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.history.back().is_some_and(|last| last == line) {
            return;
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(line.to_string());
    }

    // ========================================================================
    // Input processing
    // ========================================================================

    fn process(&mut self, data: &str) {
        let mut chars = data.chars().peekable();
        while let Some(c) = chars.next() {
            if !self.reading {
                return;
            }
            match c {
                '\u{1b}' => {
                    let mut seq = String::new();
                    match chars.next() {
                        Some('[') => {
                            while let Some(&next) = chars.peek() {
                                chars.next();
                                seq.push(next);
                                if ('@'..='~').contains(&next) {
                                    break;
                                }
                            }
                            self.handle_csi(&seq);
                        }
                        Some('O') => {
                            if let Some(final_byte) = chars.next() {
                                seq.push(final_byte);
                                self.handle_csi(&seq);
                            }
                        }
                        Some('\u{7f}' | '\u{8}') => self.delete_word_left(),
                        Some('b') => self.move_word_left(),
                        Some('f') => self.move_word_right(),
                        _ => {}
                    }
                }
                '\r' | '\n' => self.submit(),
                '\u{7f}' | '\u{8}' => self.backspace(),
                '\u{1}' => self.move_to(0),
                '\u{5}' => self.move_to_end(),
                '\u{2}' => self.move_to(self.pos.saturating_sub(1)),
                '\u{6}' => self.move_to(self.pos + 1),
                '\u{15}' => self.kill_to_start(),
                '\u{b}' => self.kill_to_end(),
                '\u{17}' => self.delete_word_left(),
                '\u{c}' => self.events.push_back(LineEvent::ClearScreen),
                '\u{3}' => {
                    self.move_to_end();
                    self.reading = false;
                    self.events.push_back(LineEvent::Interrupted);
                }
                '\u{4}' => {
                    if self.chars.is_empty() {
                        self.reading = false;
                        self.events.push_back(LineEvent::Eof);
                    } else {
                        self.delete_forward();
                    }
                }
                c if c.is_control() => {}
                c => self.insert(c),
            }
        }
    }

    /// Handles the tail of `ESC [` / `ESC O` sequences.
    fn handle_csi(&mut self, seq: &str) {
        let Some(final_byte) = seq.chars().next_back() else {
            return;
        };
        let params = &seq[..seq.len() - final_byte.len_utf8()];
        let word = params.ends_with(";3") || params.ends_with(";5");
        match (final_byte, params) {
            ('A', _) => self.history_prev(),
            ('B', _) => self.history_next(),
            ('C', _) if word => self.move_word_right(),
            ('D', _) if word => self.move_word_left(),
            ('C', _) => self.move_to(self.pos + 1),
            ('D', _) => self.move_to(self.pos.saturating_sub(1)),
            ('H', _) | ('~', "1" | "7") => self.move_to(0),
            ('F', _) | ('~', "4" | "8") => self.move_to_end(),
            ('~', "3") => self.delete_forward(),
            _ => {}
        }
    }

    fn submit(&mut self) {
        self.move_to_end();
        self.output.push_str("\r\n");
        self.reading = false;
        let line: String = self.chars.iter().collect();
        self.push_history(&line);
        self.events.push_back(LineEvent::Submitted(line));
    }

    fn insert(&mut self, c: char) {
        self.chars.insert(self.pos, c);
        self.pos += 1;
        self.render();
    }

    fn backspace(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.pos -= 1;
        self.chars.remove(self.pos);
        self.render();
    }

    fn delete_forward(&mut self) {
        if self.pos >= self.chars.len() {
            return;
        }
        self.chars.remove(self.pos);
        self.render();
    }

    fn kill_to_start(&mut self) {
        if self.pos == 0 {
            return;
        }
        self.chars.drain(..self.pos);
        self.pos = 0;
        self.render();
    }

    fn kill_to_end(&mut self) {
        if self.pos >= self.chars.len() {
            return;
        }
        self.chars.truncate(self.pos);
        self.render();
    }

    fn delete_word_left(&mut self) {
        let target = find_word_boundary_left(&self.buffer(), self.pos);
        if target == self.pos {
            return;
        }
        self.chars.drain(target..self.pos);
        self.pos = target;
        self.render();
    }

    fn move_word_left(&mut self) {
        let target = find_word_boundary_left(&self.buffer(), self.pos);
        self.move_to(target);
    }

    fn move_word_right(&mut self) {
        let target = find_word_boundary_right(&self.buffer(), self.pos);
        self.move_to(target);
    }

    fn move_to_end(&mut self) {
        self.move_to(self.chars.len());
    }

    fn move_to(&mut self, pos: usize) {
        let pos = pos.min(self.chars.len());
        if pos == self.pos {
            return;
        }
        self.pos = pos;
        self.reposition();
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => {
                self.draft = self.chars.clone();
                self.history.len() - 1
            }
            Some(0) => return,
            Some(i) => i - 1,
        };
        self.history_index = Some(index);
        self.chars = self.history[index].chars().collect();
        self.pos = self.chars.len();
        self.render();
    }

    fn history_next(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_index = Some(index + 1);
            self.chars = self.history[index + 1].chars().collect();
        } else {
            self.history_index = None;
            self.chars = std::mem::take(&mut self.draft);
        }
        self.pos = self.chars.len();
        self.render();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    fn prompt_width(&self) -> usize {
        display_width(&self.prompt)
    }

    fn width_until(&self, pos: usize) -> usize {
        self.prompt_width()
            + self.chars[..pos]
                .iter()
                .map(|c| c.width().unwrap_or(0))
                .sum::<usize>()
    }

    /// Redraws prompt and buffer, leaving the cursor at `pos`.
    fn render(&mut self) {
        if self.cursor_row > 0 {
            self.output.push_str(&format!("\u{1b}[{}A", self.cursor_row));
        }
        self.output.push_str("\r\u{1b}[J");
        self.output.push_str(&self.prompt);
        self.output.extend(self.chars.iter());

        let end = self.width_until(self.chars.len());
        if end > 0 && end % self.cols == 0 {
            // Force the pending wrap so the cursor row is unambiguous.
            self.output.push_str("\r\n");
        }
        let end_row = end / self.cols;
        self.cursor_row = end_row;
        self.reposition_from(end_row);
    }

    /// Moves the cursor from its current row to `pos` without redrawing.
    fn reposition(&mut self) {
        let row = self.cursor_row;
        self.reposition_from(row);
    }

    fn reposition_from(&mut self, from_row: usize) {
        let target = self.width_until(self.pos);
        let row = target / self.cols;
        let col = target % self.cols;
        if from_row > row {
            self.output.push_str(&format!("\u{1b}[{}A", from_row - row));
        } else if row > from_row {
            self.output.push_str(&format!("\u{1b}[{}B", row - from_row));
        }
        self.output.push('\r');
        if col > 0 {
            self.output.push_str(&format!("\u{1b}[{col}C"));
        }
        self.cursor_row = row;
    }
}

impl LineEditor for LineBuffer {
    fn buffer(&self) -> String {
        self.chars.iter().collect()
    }

    fn cursor_pos(&self) -> usize {
        self.pos
    }

    fn set_cursor_pos(&mut self, pos: usize) {
        if !self.reading {
            return;
        }
        self.move_to(pos);
    }

    fn refresh(&mut self) {
        if self.reading {
            self.render();
        }
    }

    fn inject_raw(&mut self, data: &str) {
        self.process(data);
    }
}

/// Display width of `text`, skipping ANSI CSI sequences.
pub fn display_width(text: &str) -> usize {
    let mut width = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.next() == Some('[') {
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        width += c.width().unwrap_or(0);
    }
    width
}
