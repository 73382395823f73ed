//! Terminal orchestrator.
//!
//! `TerminalApp` glues the phase machine, the line editor, the dispatcher
//! and the interactive bridge together. It never blocks: the runtime feeds
//! it key, paste, resize, socket and warmup events, and drives the requests
//! it queues (`next_request` / `execute`).

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::Config;
use crate::core::command::{CommandKind, LocalCommand};
use crate::core::keyboard::{self, AltNavigation, InputTarget, InteractiveInput, LineEdge};
use crate::core::keymap::{self, Arrow, InputMode, PhysicalKey, VirtualKeyPayload};
use crate::core::line_editor::{LineBuffer, LineEditor, LineEvent};
use crate::core::output::{
    TerminalOutput, display_error, display_notice, display_session_exit, display_warning,
};
use crate::core::phase::{Phase, Status, StatusMode, TerminalState};
use crate::dispatch::Dispatcher;
use crate::interactive::{
    BridgeEvent, InboundFrame, InteractiveError, InteractiveSession, ServerControl,
    SessionCompletion,
};
use crate::sandbox::warmup::WarmupEvent;

const ALREADY_INTERACTIVE: &str = "Interactive session already active. Type `exit` to close it.";
const OPENING_INTERACTIVE: &str = "Opening interactive shell...";
const RESET_FAILED: &str = "Reset failed";
const RESET_KEY: &str = "F5";

/// Knobs the orchestrator needs from config and the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub prompt: String,
    /// Inserted into the first read only.
    pub prefill: Option<String>,
    /// Submit `prefill` right away.
    pub autorun: bool,
    pub init_delay: Duration,
    pub default_size: (u16, u16),
    pub tab_id: String,
}

impl AppOptions {
    pub fn from_config(config: &Config, tab_id: impl Into<String>) -> Self {
        Self {
            prompt: config.prompt.clone(),
            prefill: None,
            autorun: false,
            init_delay: config.interactive_init_delay(),
            default_size: (config.default_cols, config.default_rows),
            tab_id: tab_id.into(),
        }
    }
}

/// Work the runtime has to drive to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRequest {
    Run(String),
    Reset,
}

pub struct TerminalApp<O: TerminalOutput> {
    state: TerminalState,
    editor: LineBuffer,
    output: O,
    dispatcher: Dispatcher,
    interactive: Option<InteractiveSession>,
    options: AppOptions,
    prefill_used: bool,
    requests: VecDeque<AppRequest>,
    quit: bool,
    published: Option<Status>,
}

impl<O: TerminalOutput> TerminalApp<O> {
    pub fn new(output: O, dispatcher: Dispatcher, options: AppOptions) -> Self {
        let mut editor = LineBuffer::new();
        let (cols, _) = output.size().unwrap_or(options.default_size);
        editor.set_width(cols);

        Self {
            state: TerminalState::new(),
            editor,
            output,
            dispatcher,
            interactive: None,
            options,
            prefill_used: false,
            requests: VecDeque::new(),
            quit: false,
            published: None,
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn editor(&self) -> &LineBuffer {
        &self.editor
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn interactive(&self) -> Option<&InteractiveSession> {
        self.interactive.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn next_request(&mut self) -> Option<AppRequest> {
        self.requests.pop_front()
    }

    // ========================================================================
    // Read loop
    // ========================================================================

    /// Begins a line read unless one is active or input is not accepted
    /// (running, interactive, recovering, broken).
    pub fn start_input_loop(&mut self) {
        if self.editor.is_reading() || !self.state.can_accept_input() {
            self.sync();
            return;
        }

        self.state.set_awaiting_input();
        self.editor.begin_read(&self.options.prompt);

        if !self.prefill_used {
            self.prefill_used = true;
            if let Some(prefill) = self.options.prefill.clone() {
                let line = prefill.replace(['\r', '\n'], " ");
                self.editor.inject_raw(line.trim_end());
                if self.options.autorun {
                    self.editor.inject_raw(keymap::CR);
                }
            }
        }

        self.drain_editor_events();
        self.sync();
    }

    /// Abandons an active read, leaving the cursor on a fresh line.
    fn end_read(&mut self) {
        if self.editor.cancel_read() {
            self.flush_editor();
            self.output.write("\r\n");
        }
    }

    fn drain_editor_events(&mut self) {
        while let Some(event) = self.editor.next_event() {
            match event {
                LineEvent::Submitted(line) => {
                    tracing::debug!(line = %line, "line submitted");
                    self.requests.push_back(AppRequest::Run(line));
                }
                LineEvent::Interrupted => {
                    self.flush_editor();
                    self.output.writeln("^C");
                    self.state.set_online();
                    self.start_input_loop();
                }
                LineEvent::Eof => {
                    self.flush_editor();
                    self.output.writeln("");
                    self.quit = true;
                }
                LineEvent::ClearScreen => {
                    self.flush_editor();
                    self.output.clear();
                    self.editor.refresh();
                }
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Runs one queued request. Returns the completion of an interactive
    /// session when the request opened one.
    pub async fn execute(&mut self, request: AppRequest) -> Option<SessionCompletion> {
        match request {
            AppRequest::Run(line) => self.process_command(&line).await,
            AppRequest::Reset => {
                self.reset_sandbox().await;
                None
            }
        }
    }

    /// Routes a submitted line: local, interactive, streaming or simple.
    pub async fn process_command(&mut self, line: &str) -> Option<SessionCompletion> {
        self.end_read();
        self.sync();
        let command = line.trim();

        let completion = if command.is_empty() {
            self.state.set_online();
            None
        } else {
            match self.dispatcher.classify(command) {
                CommandKind::Local(LocalCommand::Clear) => {
                    self.output.clear();
                    self.state.set_online();
                    None
                }
                CommandKind::Interactive => self.start_interactive_session(line),
                kind @ (CommandKind::Simple | CommandKind::Streaming) => {
                    self.run_remote(kind, command).await;
                    None
                }
            }
        };

        self.start_input_loop();
        completion
    }

    async fn run_remote(&mut self, kind: CommandKind, command: &str) {
        self.state.set_running_command(command);
        self.sync();

        let result = if kind == CommandKind::Streaming {
            self.dispatcher
                .run_streaming(command, &mut self.output, &mut self.state)
                .await
        } else {
            self.dispatcher
                .run_simple(command, &mut self.output, &mut self.state)
                .await
        };

        if let Err(err) = result {
            tracing::warn!(command, error = %err, "command failed");
            display_error(&mut self.output, &err.message);
            self.state.set_error(&err.message);
        }
        self.state.finish_command();
    }

    fn start_interactive_session(&mut self, line: &str) -> Option<SessionCompletion> {
        if self.interactive.is_some() {
            display_warning(&mut self.output, ALREADY_INTERACTIVE);
            return None;
        }

        let url = match self.dispatcher.client().websocket_url() {
            Ok(url) => url,
            Err(err) => {
                display_error(&mut self.output, &err.message);
                self.state.set_error(&err.message);
                return None;
            }
        };

        let command = line.trim();
        self.state.set_interactive(command);
        display_notice(&mut self.output, OPENING_INTERACTIVE);

        let queued = format!("{}\n", line.trim_end_matches(['\r', '\n']));
        let size = self.output.size().unwrap_or(self.options.default_size);
        tracing::info!(command, url = %url, "opening interactive session");

        let (session, completion) =
            InteractiveSession::open(url, queued, self.options.init_delay, size);
        self.interactive = Some(session);
        self.sync();
        Some(completion)
    }

    // ========================================================================
    // Interactive sessions
    // ========================================================================

    /// Next event of the active session; pends forever without one.
    pub async fn next_bridge_event(&mut self) -> BridgeEvent {
        match self.interactive.as_mut() {
            Some(session) => session.next_event().await,
            None => std::future::pending().await,
        }
    }

    pub fn handle_bridge_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Opened => tracing::debug!("interactive socket open"),
            BridgeEvent::FlushInitialInput => {
                if let Some(session) = self.interactive.as_mut() {
                    session.flush_initial_input();
                }
            }
            BridgeEvent::Frame(InboundFrame::Output(text)) => self.output.write(&text),
            BridgeEvent::Frame(InboundFrame::Control(
                ServerControl::Pong | ServerControl::Ready,
            )) => {}
            BridgeEvent::Frame(InboundFrame::Control(ServerControl::ProcessExit {
                exit_code,
            })) => {
                display_session_exit(&mut self.output, exit_code);
                self.reset_interactive_state(StatusMode::Online);
            }
            BridgeEvent::Closed => {
                self.reset_interactive_state(StatusMode::Online);
            }
            BridgeEvent::Error(message) => {
                tracing::warn!(error = %message, "interactive socket error");
                self.reset_interactive_state(StatusMode::Error);
            }
        }
        self.sync();
    }

    /// Single exit from interactive mode. Returns `false` when there was
    /// nothing to tear down.
    pub fn reset_interactive_state(&mut self, mode: StatusMode) -> bool {
        if !self.teardown_interactive(mode) {
            return false;
        }
        self.start_input_loop();
        true
    }

    fn teardown_interactive(&mut self, mode: StatusMode) -> bool {
        let Some(mut session) = self.interactive.take() else {
            return false;
        };

        session.close();
        self.state.leave_interactive(mode);
        if let Some(completion) = session.take_completion() {
            let outcome = if mode == StatusMode::Error {
                Err(InteractiveError::ended_with_error())
            } else {
                Ok(())
            };
            // Nobody waiting is fine.
            let _ = completion.send(outcome);
        }
        tracing::info!(command = session.command(), %mode, "interactive session ended");
        true
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Resets the remote sandbox. Failure leaves the terminal broken until
    /// a later reset succeeds.
    pub async fn reset_sandbox(&mut self) {
        self.teardown_interactive(StatusMode::Online);
        self.end_read();
        self.state.set_recovering();
        self.sync();

        let tab_id = self.options.tab_id.clone();
        match self.dispatcher.client().reset(Some(&tab_id)).await {
            Ok(response) if response.success => {
                tracing::info!("sandbox reset");
                self.output.clear();
                self.state.set_recovered();
            }
            Ok(response) => {
                let message = response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| RESET_FAILED.to_string());
                tracing::warn!(error = %message, "sandbox reset rejected");
                display_error(&mut self.output, &message);
                self.state.set_broken(&message);
            }
            Err(err) => {
                tracing::warn!(error = %err, "sandbox reset failed");
                display_error(&mut self.output, &err.message);
                self.state.set_broken(&err.message);
            }
        }

        self.start_input_loop();
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Physical key entry point. Precedence is Ctrl, then Alt, then plain.
    pub fn handle_key(&mut self, key: &PhysicalKey) {
        if !key.is_keydown() {
            return;
        }
        let reset = key.key == RESET_KEY && !key.ctrl && !key.alt && !key.meta;

        match self.state.phase() {
            Phase::Broken => {
                if reset {
                    self.requests.push_back(AppRequest::Reset);
                } else if key.ctrl && key.key.eq_ignore_ascii_case("d") {
                    self.quit = true;
                }
                return;
            }
            Phase::RunningCommand | Phase::Recovering => return,
            Phase::Idle | Phase::AwaitingInput | Phase::Interactive => {}
        }

        if reset {
            self.requests.push_back(AppRequest::Reset);
            return;
        }

        if self.state.is_interactive() {
            self.interactive_key(key);
        } else {
            self.line_edit_key(key);
        }
        self.drain_editor_events();
        self.sync();
    }

    fn interactive_key(&mut self, key: &PhysicalKey) {
        let Some(session) = self.interactive.as_mut() else {
            return;
        };
        if key.meta {
            return;
        }

        if key.ctrl
            && let Some(control) = key.single_char().and_then(|c| {
                keymap::control_char_for_key(c.encode_utf8(&mut [0; 4]))
            })
        {
            session.send_input(&control.to_string());
            return;
        }

        if key.alt {
            keyboard::handle_alt_navigation(&mut InputTarget::Interactive(session), key);
            return;
        }

        if let Some(sequence) = keymap::interactive_key_sequence(key) {
            session.send_input(&sequence);
        }
    }

    fn line_edit_key(&mut self, key: &PhysicalKey) {
        if !self.editor.is_reading() || key.meta {
            return;
        }

        if key.ctrl {
            if let Some(control) = key
                .single_char()
                .and_then(|c| keymap::control_char_for_key(c.encode_utf8(&mut [0; 4])))
            {
                self.editor.inject_raw(&control.to_string());
                return;
            }
            // Ctrl+Left/Right move by word.
            let word_move = match Arrow::from_key(&key.key) {
                Some(Arrow::Left) => Some("\u{1b}[1;5D"),
                Some(Arrow::Right) => Some("\u{1b}[1;5C"),
                _ => None,
            };
            if let Some(sequence) = word_move {
                self.editor.inject_raw(sequence);
                return;
            }
        }

        if key.alt {
            keyboard::handle_alt_navigation(&mut InputTarget::LineEditor(&mut self.editor), key);
            return;
        }

        let sequence = match key.key.as_str() {
            "Home" => Some("\u{1b}[H".to_string()),
            "End" => Some("\u{1b}[F".to_string()),
            "Delete" => Some("\u{1b}[3~".to_string()),
            "Tab" => None,
            _ => keymap::virtual_key_sequence(
                &VirtualKeyPayload {
                    ctrl: false,
                    ..key.to_virtual()
                },
                InputMode::LineEdit,
            ),
        };
        if let Some(sequence) = sequence {
            self.editor.inject_raw(&sequence);
        }
    }

    /// Pasted text: raw to the socket while interactive, into the editor
    /// otherwise (a newline submits).
    pub fn handle_paste(&mut self, text: &str) {
        if let Some(session) = self.interactive.as_mut() {
            session.send_input(text);
        } else if self.editor.is_reading() {
            let normalized = text.replace("\r\n", "\r").replace('\n', "\r");
            self.editor.inject_raw(&normalized);
            self.drain_editor_events();
        }
        self.sync();
    }

    pub fn handle_resize(&mut self, cols: u16, rows: u16) {
        self.editor.set_width(cols);
        if let Some(session) = self.interactive.as_mut() {
            session.send_resize(cols, rows);
        } else if self.editor.is_reading() {
            keyboard::handle_resize(&mut InputTarget::LineEditor(&mut self.editor));
        }
        self.sync();
    }

    fn input_target(&mut self) -> Option<InputTarget<'_>> {
        if self.state.is_interactive() {
            return self
                .interactive
                .as_mut()
                .map(|session| InputTarget::Interactive(session));
        }
        if self.editor.is_reading() {
            Some(InputTarget::LineEditor(&mut self.editor))
        } else {
            None
        }
    }

    pub fn send_virtual_keyboard_input(&mut self, payload: &VirtualKeyPayload) {
        if let Some(mut target) = self.input_target() {
            keyboard::send_virtual_keyboard_input(&mut target, payload);
        }
        self.drain_editor_events();
        self.sync();
    }

    pub fn handle_alt_navigation(&mut self, key: &PhysicalKey) -> AltNavigation {
        let result = match self.input_target() {
            Some(mut target) => keyboard::handle_alt_navigation(&mut target, key),
            None => AltNavigation::NotApplicable,
        };
        self.sync();
        result
    }

    pub fn handle_clear_line(&mut self) -> bool {
        let handled = self
            .input_target()
            .is_some_and(|mut target| keyboard::handle_clear_line(&mut target));
        self.sync();
        handled
    }

    pub fn handle_jump_to_line_edge(&mut self, edge: LineEdge) -> bool {
        let handled = self
            .input_target()
            .is_some_and(|mut target| keyboard::handle_jump_to_line_edge(&mut target, edge));
        self.sync();
        handled
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    /// Warmup results are the connectivity signal.
    pub fn handle_warmup_event(&mut self, event: &WarmupEvent) {
        let online = match event {
            WarmupEvent::Healthy => true,
            WarmupEvent::Failed(message) => {
                tracing::warn!(error = %message, "sandbox warmup failed");
                false
            }
        };
        self.set_network_online(online);
    }

    pub fn set_network_online(&mut self, online: bool) {
        self.state.update_online_status(online);
        self.sync();
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn flush_editor(&mut self) {
        let pending = self.editor.take_output();
        if !pending.is_empty() {
            self.output.write(&pending);
        }
    }

    /// Flushes editor output and publishes the status when it changed.
    fn sync(&mut self) {
        self.flush_editor();
        let status = self.state.status();
        if self.published.as_ref() != Some(status) {
            self.output.set_status(status);
            self.published = Some(status.clone());
        }
        self.output.flush();
    }
}

#[cfg(test)]
mod tests {
    use futures_util::SinkExt;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::core::command::CommandSets;
    use crate::core::output::MemoryOutput;
    use crate::interactive::SocketState;
    use crate::sandbox::SandboxClient;
    use crate::test_support::{next_frame, ws_server};

    fn options() -> AppOptions {
        AppOptions {
            prompt: "$ ".to_string(),
            prefill: None,
            autorun: false,
            init_delay: Duration::from_millis(10),
            default_size: (120, 32),
            tab_id: "tab-test".to_string(),
        }
    }

    fn app_for(base: &str) -> TerminalApp<MemoryOutput> {
        app_with(base, options())
    }

    fn app_with(base: &str, options: AppOptions) -> TerminalApp<MemoryOutput> {
        let client = SandboxClient::new(Url::parse(base).unwrap(), "session-abc1234");
        let dispatcher = Dispatcher::new(client, CommandSets::new(["anvil"], ["chisel", "node"]));
        TerminalApp::new(MemoryOutput::with_size(100, 30), dispatcher, options)
    }

    fn type_line(app: &mut TerminalApp<MemoryOutput>, line: &str) {
        for c in line.chars() {
            app.handle_key(&PhysicalKey::new(c.to_string()));
        }
        app.handle_key(&PhysicalKey::new("Enter"));
    }

    /// Pumps socket events until the session is gone.
    async fn drive_until_closed(app: &mut TerminalApp<MemoryOutput>) {
        while app.interactive().is_some() {
            let event = app.next_bridge_event().await;
            app.handle_bridge_event(event);
        }
    }

    #[test]
    fn test_start_prints_prompt_and_awaits_input() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();

        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert!(app.editor().is_reading());
        assert!(app.output().contains("$ "));
        assert_eq!(app.output().last_status().unwrap().message, "Ready");
    }

    #[test]
    fn test_submitted_line_becomes_request() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        type_line(&mut app, "ls -la");

        assert_eq!(app.next_request(), Some(AppRequest::Run("ls -la".to_string())));
        assert!(!app.editor().is_reading());
        assert_eq!(app.next_request(), None);
    }

    #[test]
    fn test_prefill_autorun_submits_first_read_only() {
        let mut app = app_with(
            "http://127.0.0.1:9",
            AppOptions {
                prefill: Some("echo hi".to_string()),
                autorun: true,
                ..options()
            },
        );
        app.start_input_loop();
        assert_eq!(app.next_request(), Some(AppRequest::Run("echo hi".to_string())));

        app.start_input_loop();
        assert_eq!(app.editor().buffer(), "");
    }

    #[test]
    fn test_prefill_without_autorun_waits() {
        let mut app = app_with(
            "http://127.0.0.1:9",
            AppOptions {
                prefill: Some("echo hi".to_string()),
                ..options()
            },
        );
        app.start_input_loop();
        assert_eq!(app.editor().buffer(), "echo hi");
        assert_eq!(app.next_request(), None);
    }

    #[test]
    fn test_ctrl_c_in_line_edit_restarts_read() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.handle_key(&PhysicalKey::new("x"));
        app.handle_key(&PhysicalKey::new("c").ctrl());

        assert!(app.output().contains("^C\r\n"));
        assert!(app.editor().is_reading());
        assert_eq!(app.editor().buffer(), "");
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        assert_eq!(app.next_request(), None);
    }

    #[test]
    fn test_ctrl_d_on_empty_line_quits() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.handle_key(&PhysicalKey::new("a"));
        app.handle_key(&PhysicalKey::new("d").ctrl());
        assert!(!app.should_quit());

        app.handle_key(&PhysicalKey::new("Backspace"));
        app.handle_key(&PhysicalKey::new("d").ctrl());
        assert!(app.should_quit());
    }

    #[test]
    fn test_ctrl_a_is_control_char_in_line_edit() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        for c in ["a", "b", "c"] {
            app.handle_key(&PhysicalKey::new(c));
        }
        app.handle_key(&PhysicalKey::new("a").ctrl());
        assert_eq!(app.editor().cursor_pos(), 0);

        app.handle_key(&PhysicalKey::new("ArrowRight").alt());
        assert_eq!(app.editor().cursor_pos(), 3);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.handle_key(&PhysicalKey::new("a").released());
        assert_eq!(app.editor().buffer(), "");
    }

    #[test]
    fn test_paste_with_newline_submits() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.handle_paste("echo one\n");
        assert_eq!(app.next_request(), Some(AppRequest::Run("echo one".to_string())));
    }

    #[test]
    fn test_keyboard_surface_targets_line_editor() {
        let mut app = app_for("http://127.0.0.1:9");
        assert!(!app.handle_clear_line());

        app.start_input_loop();
        app.send_virtual_keyboard_input(&VirtualKeyPayload::new("h"));
        app.send_virtual_keyboard_input(&VirtualKeyPayload::new("i").with_shift());
        assert_eq!(app.editor().buffer(), "hI");

        assert!(app.handle_jump_to_line_edge(LineEdge::Start));
        assert_eq!(app.editor().cursor_pos(), 0);

        assert!(app.handle_clear_line());
        assert_eq!(app.editor().buffer(), "");
    }

    #[tokio::test]
    async fn test_clear_runs_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        app.process_command("  CLEAR ").await;

        assert_eq!(app.output().clears, 1);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        assert!(app.editor().is_reading());
    }

    #[tokio::test]
    async fn test_simple_command_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/exec"))
            .and(body_json(json!({"command": "ls", "sessionId": "session-abc1234"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "stdout": "file.txt",
                "stderr": "",
                "exitCode": 0
            })))
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        type_line(&mut app, "ls");
        let request = app.next_request().unwrap();
        assert!(app.execute(request).await.is_none());

        assert!(app.output().contains("file.txt\r\n"));
        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        assert!(app.editor().is_reading());
        assert!(
            app.output()
                .statuses
                .iter()
                .any(|status| status.message == "Running: ls")
        );
    }

    #[tokio::test]
    async fn test_failed_command_shows_error_and_exit_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "stdout": "",
                "stderr": "boom",
                "error": "boom",
                "exitCode": 1
            })))
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        app.process_command("false").await;

        let output = app.output().written.clone();
        assert_eq!(output.matches("\u{1b}[31mboom\u{1b}[0m").count(), 1);
        assert!(output.contains("[process exited with code 1]"));
        assert_eq!(app.state().status_mode(), StatusMode::Error);
        assert_eq!(app.state().phase(), Phase::AwaitingInput);
    }

    #[tokio::test]
    async fn test_transport_error_prints_one_line() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.process_command("ls").await;

        assert_eq!(app.state().status_mode(), StatusMode::Error);
        assert_eq!(app.output().written.matches("\u{1b}[31m").count(), 1);
        assert!(app.editor().is_reading());
    }

    #[tokio::test]
    async fn test_streaming_command_writes_events() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"type\":\"start\"}\n\n",
            "data: {\"type\":\"stdout\",\"data\":\"hi\"}\n\n",
            "data: {\"type\":\"complete\",\"exitCode\":0}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        app.process_command("anvil").await;

        assert!(app.output().contains("hi"));
        assert!(!app.output().contains("process exited"));
        assert_eq!(app.state().status_mode(), StatusMode::Online);
    }

    #[tokio::test]
    async fn test_interactive_session_flow() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let addr = ws_server(move |mut ws| async move {
            // init, then the queued line
            for _ in 0..2 {
                let frame = next_frame(&mut ws).await.unwrap();
                seen_tx.send(frame).unwrap();
            }
            ws.send(Message::text("Welcome\r\n")).await.unwrap();
            let key = next_frame(&mut ws).await.unwrap();
            seen_tx.send(key).unwrap();
            ws.send(Message::text(r#"{"type":"process-exit","exitCode":0}"#))
                .await
                .unwrap();
            let _ = next_frame(&mut ws).await;
        })
        .await;

        let mut app = app_for(&format!("http://{addr}"));
        app.start_input_loop();
        let completion = app.process_command("node").await.unwrap();

        assert_eq!(app.state().phase(), Phase::Interactive);
        assert_eq!(app.state().status_message(), "Interactive: node");
        assert!(app.output().contains(OPENING_INTERACTIVE));
        assert!(!app.editor().is_reading());

        loop {
            let event = app.next_bridge_event().await;
            let output = matches!(event, BridgeEvent::Frame(InboundFrame::Output(_)));
            app.handle_bridge_event(event);
            if output {
                break;
            }
        }
        assert!(app.output().contains("Welcome\r\n"));
        app.handle_key(&PhysicalKey::new("c").ctrl());

        drive_until_closed(&mut app).await;

        assert_eq!(
            seen_rx.recv().await.unwrap(),
            Message::text(r#"{"type":"init","cols":100,"rows":30}"#)
        );
        assert_eq!(
            seen_rx.recv().await.unwrap(),
            Message::binary(b"node\n".to_vec())
        );
        assert_eq!(
            seen_rx.recv().await.unwrap(),
            Message::binary(vec![0x03])
        );

        assert_eq!(completion.await.unwrap(), Ok(()));
        assert!(
            app.output()
                .contains("[interactive session exited with code 0]")
        );
        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        assert!(app.editor().is_reading());
    }

    #[tokio::test]
    async fn test_second_interactive_start_only_warns() {
        let addr = ws_server(|mut ws| async move {
            while next_frame(&mut ws).await.is_some() {}
        })
        .await;

        let mut app = app_for(&format!("http://{addr}"));
        app.start_input_loop();
        let _completion = app.process_command("chisel").await.unwrap();

        assert!(app.process_command("node").await.is_none());
        assert!(app.output().contains(ALREADY_INTERACTIVE));
        assert_eq!(app.state().phase(), Phase::Interactive);
        assert_eq!(app.interactive().unwrap().command(), "chisel");
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        let mut completion = app.process_command("node").await.unwrap();

        assert!(app.reset_interactive_state(StatusMode::Error));
        assert!(!app.reset_interactive_state(StatusMode::Online));

        assert_eq!(
            completion.try_recv().unwrap(),
            Err(InteractiveError::ended_with_error())
        );
        assert_eq!(app.state().status_mode(), StatusMode::Error);
        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert!(app.editor().is_reading());
    }

    #[tokio::test]
    async fn test_socket_error_returns_to_line_edit() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        let completion = app.process_command("node").await.unwrap();
        assert_eq!(
            app.interactive().map(InteractiveSession::state),
            Some(SocketState::Connecting)
        );

        drive_until_closed(&mut app).await;

        assert_eq!(completion.await.unwrap(), Err(InteractiveError::ended_with_error()));
        assert_eq!(app.state().status_mode(), StatusMode::Error);
        assert!(!app.state().is_session_broken());
    }

    #[tokio::test]
    async fn test_reset_success_clears_screen() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/reset"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "message": "ok"})),
            )
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        app.handle_key(&PhysicalKey::new(RESET_KEY));
        let request = app.next_request().unwrap();
        assert_eq!(request, AppRequest::Reset);
        app.execute(request).await;

        assert_eq!(app.output().clears, 1);
        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert!(app.editor().is_reading());
        assert!(
            app.output()
                .statuses
                .iter()
                .any(|status| status.message == "Resetting...")
        );
    }

    #[tokio::test]
    async fn test_reset_failure_breaks_until_reset_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/reset"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "message": "container gone"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/reset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let mut app = app_for(&server.uri());
        app.start_input_loop();
        app.reset_sandbox().await;

        assert!(app.output().contains("container gone"));
        assert_eq!(app.state().phase(), Phase::Broken);
        assert!(app.state().is_session_broken());
        assert!(!app.editor().is_reading());

        app.handle_key(&PhysicalKey::new("x"));
        app.handle_paste("ls\n");
        assert_eq!(app.next_request(), None);

        app.handle_key(&PhysicalKey::new(RESET_KEY));
        let request = app.next_request().unwrap();
        app.execute(request).await;

        assert_eq!(app.state().phase(), Phase::AwaitingInput);
        assert!(!app.state().is_session_broken());
        assert!(app.editor().is_reading());
    }

    #[test]
    fn test_ctrl_d_quits_while_broken() {
        let mut app = app_for("http://127.0.0.1:9");
        app.state.set_broken("gone");
        app.handle_key(&PhysicalKey::new("d").ctrl());
        assert!(app.should_quit());
    }

    #[test]
    fn test_warmup_events_update_status() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();

        app.handle_warmup_event(&WarmupEvent::Failed("down".to_string()));
        assert_eq!(app.state().status_mode(), StatusMode::Offline);

        app.handle_warmup_event(&WarmupEvent::Healthy);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
    }

    #[test]
    fn test_network_status_published_once_per_change() {
        let mut app = app_for("http://127.0.0.1:9");
        app.start_input_loop();
        app.set_network_online(true);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        let before = app.output().statuses.len();

        app.set_network_online(false);
        app.set_network_online(false);
        assert!(!app.state().is_network_online());
        assert_eq!(app.state().status_mode(), StatusMode::Offline);
        assert_eq!(app.output().statuses.len(), before + 1);

        app.set_network_online(true);
        assert_eq!(app.state().status_mode(), StatusMode::Online);
        assert_eq!(app.output().statuses.len(), before + 2);
    }
}
