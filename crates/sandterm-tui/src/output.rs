//! `TerminalOutput` backed by the real terminal.

use std::io::{self, Stdout, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, SetTitle};
use sandterm_core::core::output::{TerminalOutput, convert_eol};
use sandterm_core::core::phase::{Status, StatusMode};

/// Writes to stdout, converting lone `\n` to `\r\n` since raw mode does
/// not. The status is shown in the window title.
pub struct CrosstermOutput {
    stdout: Stdout,
}

impl CrosstermOutput {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    fn report(result: io::Result<()>) {
        if let Err(err) = result {
            tracing::debug!(error = %err, "terminal write failed");
        }
    }
}

impl Default for CrosstermOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput for CrosstermOutput {
    fn write(&mut self, data: &str) {
        Self::report(queue!(self.stdout, Print(convert_eol(data))));
    }

    fn clear(&mut self) {
        Self::report(queue!(self.stdout, Clear(ClearType::All), MoveTo(0, 0)));
    }

    fn size(&self) -> Option<(u16, u16)> {
        terminal::size().ok().filter(|(cols, rows)| *cols > 0 && *rows > 0)
    }

    fn set_status(&mut self, status: &Status) {
        Self::report(queue!(self.stdout, SetTitle(window_title(status))));
    }

    fn flush(&mut self) {
        Self::report(self.stdout.flush());
    }
}

pub fn window_title(status: &Status) -> String {
    let badge = match status.mode {
        StatusMode::Online => "online",
        StatusMode::Offline => "offline",
        StatusMode::Interactive => "interactive",
        StatusMode::Error => "error",
    };
    format!("sandterm [{badge}] {}", status.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_title_shows_mode_and_message() {
        let status = Status {
            mode: StatusMode::Interactive,
            message: "Interactive: node".to_string(),
        };
        assert_eq!(window_title(&status), "sandterm [interactive] Interactive: node");
    }
}
