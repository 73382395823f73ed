//! Terminal output sink.

use crate::core::phase::Status;

/// Where terminal writes go. The real implementation drives the user's
/// terminal; `MemoryOutput` records everything.
pub trait TerminalOutput {
    fn write(&mut self, data: &str);

    fn writeln(&mut self, data: &str) {
        self.write(data);
        self.write("\r\n");
    }

    fn clear(&mut self);

    /// Current `(cols, rows)`, if known.
    fn size(&self) -> Option<(u16, u16)>;

    fn set_status(&mut self, status: &Status);

    fn flush(&mut self) {}
}

// ============================================================================
// Display helpers
// ============================================================================

pub fn display_error(out: &mut dyn TerminalOutput, message: &str) {
    out.writeln(&format!("\u{1b}[31m{message}\u{1b}[0m"));
}

pub fn display_warning(out: &mut dyn TerminalOutput, message: &str) {
    out.writeln(&format!("\u{1b}[33m{message}\u{1b}[0m"));
}

pub fn display_notice(out: &mut dyn TerminalOutput, message: &str) {
    out.writeln(&format!("\r\n\u{1b}[90m{message}\u{1b}[0m"));
}

pub fn write_stderr(out: &mut dyn TerminalOutput, data: &str) {
    out.write(&format!("\u{1b}[31m{data}\u{1b}[0m"));
}

fn code_label(code: Option<i64>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

pub fn display_process_exit(out: &mut dyn TerminalOutput, code: Option<i64>) {
    out.writeln(&format!("\r\n[process exited with code {}]", code_label(code)));
}

pub fn display_session_exit(out: &mut dyn TerminalOutput, code: Option<i64>) {
    out.writeln(&format!(
        "\r\n[interactive session exited with code {}]",
        code_label(code)
    ));
}

/// Converts lone `\n` into `\r\n`, leaving existing `\r\n` untouched.
pub fn convert_eol(data: &str) -> String {
    let mut converted = String::with_capacity(data.len());
    let mut prev = '\0';
    for c in data.chars() {
        if c == '\n' && prev != '\r' {
            converted.push('\r');
        }
        converted.push(c);
        prev = c;
    }
    converted
}

/// Records writes in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutput {
    pub written: String,
    pub clears: usize,
    pub statuses: Vec<Status>,
    pub dimensions: Option<(u16, u16)>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(cols: u16, rows: u16) -> Self {
        Self {
            dimensions: Some((cols, rows)),
            ..Self::default()
        }
    }

    /// Returns and clears everything written so far.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.written)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.written.contains(needle)
    }

    pub fn last_status(&self) -> Option<&Status> {
        self.statuses.last()
    }
}

impl TerminalOutput for MemoryOutput {
    fn write(&mut self, data: &str) {
        self.written.push_str(data);
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.written.clear();
    }

    fn size(&self) -> Option<(u16, u16)> {
        self.dimensions
    }

    fn set_status(&mut self, status: &Status) {
        self.statuses.push(status.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_eol() {
        assert_eq!(convert_eol("a\nb\r\nc\n"), "a\r\nb\r\nc\r\n");
        assert_eq!(convert_eol("no newline"), "no newline");
    }

    #[test]
    fn test_exit_notices() {
        let mut out = MemoryOutput::new();
        display_process_exit(&mut out, Some(2));
        display_session_exit(&mut out, None);
        assert_eq!(
            out.take(),
            "\r\n[process exited with code 2]\r\n\r\n[interactive session exited with code unknown]\r\n"
        );
    }

    #[test]
    fn test_error_is_red_line() {
        let mut out = MemoryOutput::new();
        display_error(&mut out, "boom");
        assert_eq!(out.take(), "\u{1b}[31mboom\u{1b}[0m\r\n");
    }
}
