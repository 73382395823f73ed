//! Terminal front-end for sandterm: drives the user's terminal in raw mode.

pub mod input;
pub mod output;
pub mod runtime;
pub mod terminal;

use std::io::{IsTerminal, stdin, stdout};

use anyhow::Result;
pub use runtime::TerminalRuntime;
use sandterm_core::app::AppOptions;
use sandterm_core::config::WarmupConfig;
use sandterm_core::dispatch::Dispatcher;

/// Runs the interactive terminal until the user quits.
///
/// # Errors
/// Returns an error when stdin/stdout is not a terminal or the terminal
/// cannot be set up.
pub async fn run_terminal(
    dispatcher: Dispatcher,
    options: AppOptions,
    warmup: &WarmupConfig,
) -> Result<()> {
    if !stdin().is_terminal() || !stdout().is_terminal() {
        anyhow::bail!(
            "The interactive terminal requires a TTY.\n\
             Use `sandterm exec <COMMAND>` for non-interactive execution."
        );
    }

    TerminalRuntime::new(dispatcher, options, warmup)
        .run()
        .await
}
