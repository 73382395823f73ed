//! Terminal runtime - owns the app, runs the event loop.
//!
//! Event sources:
//! - crossterm `EventStream` (keys, paste, resize)
//! - the active interactive session's bridge events
//! - warmup results
//! - the interactive session's completion
//!
//! Requests queued by the app (commands, reset) are driven to completion
//! before the next event is read. While one runs, keystrokes are discarded
//! and only the latest resize is kept.

use std::future;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use sandterm_core::app::{AppOptions, AppRequest, TerminalApp};
use sandterm_core::config::WarmupConfig;
use sandterm_core::dispatch::Dispatcher;
use sandterm_core::interactive::{InteractiveError, SessionCompletion, SessionOutcome};
use sandterm_core::sandbox::warmup::{WarmupController, WarmupEvent, start_sandbox_warmup};
use tokio::sync::mpsc;

use crate::input::{Shortcut, TerminalInput, shortcut, translate_event};
use crate::output::CrosstermOutput;
use crate::terminal;

pub struct TerminalRuntime {
    app: TerminalApp<CrosstermOutput>,
    warmup: Option<WarmupController>,
    warmup_rx: mpsc::UnboundedReceiver<WarmupEvent>,
    completion: Option<SessionCompletion>,
}

impl TerminalRuntime {
    /// Builds the app and starts the warmup loop when enabled.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(dispatcher: Dispatcher, options: AppOptions, warmup: &WarmupConfig) -> Self {
        let (warmup_tx, warmup_rx) = mpsc::unbounded_channel();
        let controller = warmup.enabled.then(|| {
            start_sandbox_warmup(
                dispatcher.client().clone(),
                options.tab_id.clone(),
                warmup.interval(),
                false,
                warmup_tx,
            )
        });

        Self {
            app: TerminalApp::new(CrosstermOutput::new(), dispatcher, options),
            warmup: controller,
            warmup_rx,
            completion: None,
        }
    }

    /// Runs the event loop with the terminal in raw mode.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be set up or read.
    pub async fn run(mut self) -> Result<()> {
        terminal::install_panic_hook();
        terminal::setup_terminal().context("Failed to setup terminal")?;

        let result = self.event_loop().await;

        if let Some(warmup) = self.warmup.take() {
            warmup.stop();
        }
        let _ = terminal::restore_terminal();
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut events = EventStream::new();
        self.app.start_input_loop();

        while !self.app.should_quit() {
            if let Some(request) = self.app.next_request() {
                self.execute(request, &mut events).await;
                continue;
            }

            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_terminal_event(&event),
                    Some(Err(err)) => return Err(err).context("Failed to read terminal event"),
                    None => break,
                },
                event = self.app.next_bridge_event() => self.app.handle_bridge_event(event),
                Some(event) = self.warmup_rx.recv() => self.app.handle_warmup_event(&event),
                outcome = wait_for_completion(&mut self.completion) => match outcome {
                    Ok(()) => tracing::debug!("interactive session completed"),
                    Err(err) => {
                        tracing::debug!(error = %err, "interactive session completed with error");
                    }
                },
            }
        }

        tracing::info!("terminal closed");
        Ok(())
    }

    fn handle_terminal_event(&mut self, event: &Event) {
        match translate_event(event) {
            Some(TerminalInput::Key(key)) => match shortcut(&key) {
                Some(Shortcut::ClearLine) => {
                    self.app.handle_clear_line();
                }
                Some(Shortcut::JumpToEdge(edge)) => {
                    self.app.handle_jump_to_line_edge(edge);
                }
                Some(Shortcut::AltNavigation) => {
                    self.app.handle_alt_navigation(&key);
                }
                None => self.app.handle_key(&key),
            },
            Some(TerminalInput::Paste(text)) => self.app.handle_paste(&text),
            Some(TerminalInput::Resize(cols, rows)) => self.app.handle_resize(cols, rows),
            None => {}
        }
    }

    async fn execute(&mut self, request: AppRequest, events: &mut EventStream) {
        let mut resized = None;
        let completion = {
            let run = self.app.execute(request);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    completion = &mut run => break completion,
                    Some(Ok(event)) = events.next() => {
                        if let Event::Resize(cols, rows) = event {
                            resized = Some((cols, rows));
                        }
                    }
                }
            }
        };

        if let Some((cols, rows)) = resized {
            self.app.handle_resize(cols, rows);
        }
        if completion.is_some() {
            self.completion = completion;
        }
    }
}

/// Resolves with the session outcome; pends while no session is tracked.
async fn wait_for_completion(slot: &mut Option<SessionCompletion>) -> SessionOutcome {
    let Some(receiver) = slot.as_mut() else {
        return future::pending().await;
    };
    // A dropped sender means the session vanished without a clean end.
    let outcome = receiver
        .await
        .unwrap_or_else(|_closed| Err(InteractiveError::ended_with_error()));
    *slot = None;
    outcome
}
