//! Command routing and the request/response and streaming executors.

use futures_util::StreamExt;

use crate::core::command::{CommandKind, CommandSets};
use crate::core::output::{
    TerminalOutput, display_error, display_process_exit, write_stderr,
};
use crate::core::phase::TerminalState;
use crate::sandbox::{ExecResult, ExecStream, SandboxClient, SandboxResult, StreamEvent};

const COMMAND_FAILED: &str = "Command failed";
const STREAM_ERROR: &str = "Stream error";

pub struct Dispatcher {
    client: SandboxClient,
    sets: CommandSets,
}

impl Dispatcher {
    pub fn new(client: SandboxClient, sets: CommandSets) -> Self {
        Self { client, sets }
    }

    pub fn client(&self) -> &SandboxClient {
        &self.client
    }

    pub fn classify(&self, command: &str) -> CommandKind {
        self.sets.classify(command)
    }

    /// One request, one JSON result.
    ///
    /// # Errors
    /// Transport, HTTP status and parse errors from the sandbox.
    pub async fn run_simple(
        &self,
        command: &str,
        out: &mut dyn TerminalOutput,
        state: &mut TerminalState,
    ) -> SandboxResult<()> {
        let result = self.client.exec(command).await?;
        render_exec_result(out, state, &result);
        Ok(())
    }

    /// Streams events as they arrive; falls back to JSON rendering when
    /// the server does not answer with an event stream.
    ///
    /// # Errors
    /// Errors of the initial request and transport errors mid-stream.
    /// Malformed event blocks are skipped, not reported.
    pub async fn run_streaming(
        &self,
        command: &str,
        out: &mut dyn TerminalOutput,
        state: &mut TerminalState,
    ) -> SandboxResult<()> {
        match self.client.exec_streaming(command).await? {
            ExecStream::Json(result) => render_exec_result(out, state, &result),
            ExecStream::Events(mut events) => {
                while let Some(event) = events.next().await {
                    handle_stream_event(out, state, &event?);
                    out.flush();
                }
            }
        }
        Ok(())
    }
}

/// Writes a JSON exec result and projects its outcome onto the status.
pub fn render_exec_result(
    out: &mut dyn TerminalOutput,
    state: &mut TerminalState,
    result: &ExecResult,
) {
    if let Some(stdout) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
        out.write(stdout);
        if !stdout.ends_with('\n') {
            out.write("\r\n");
        }
    }

    let stderr = result.stderr.as_deref().filter(|s| !s.is_empty());
    if let Some(stderr) = stderr {
        display_error(out, stderr);
    }

    if result.success {
        state.set_online();
    } else {
        let message = result
            .error
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(COMMAND_FAILED);
        // Shown once when `error` repeats stderr.
        if stderr != Some(message) {
            display_error(out, message);
        }
        state.set_error(message);
    }

    if let Some(code) = result.exit_code.filter(|code| *code != 0) {
        display_process_exit(out, Some(code));
        if result.success {
            state.set_error(&format!("Exited with code {code}"));
        }
    }
}

pub fn handle_stream_event(
    out: &mut dyn TerminalOutput,
    state: &mut TerminalState,
    event: &StreamEvent,
) {
    match event {
        StreamEvent::Start => state.set_online(),
        StreamEvent::Stdout(data) => out.write(data),
        StreamEvent::Stderr(data) => write_stderr(out, data),
        StreamEvent::Error { message } => {
            let message = message.as_deref().unwrap_or(STREAM_ERROR);
            display_error(out, message);
            state.set_error(message);
        }
        StreamEvent::Complete { exit_code } => {
            if *exit_code != Some(0) {
                display_process_exit(out, *exit_code);
            }
        }
    }
}
