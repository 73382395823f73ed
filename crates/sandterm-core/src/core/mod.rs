//! Terminal orchestration primitives.
//!
//! Everything in here is synchronous and owned by a single `TerminalApp`;
//! network I/O lives in `sandbox` and `interactive`.

pub mod command;
pub mod keyboard;
pub mod keymap;
pub mod line_editor;
pub mod output;
pub mod phase;
pub mod session_id;
pub mod utf8;
