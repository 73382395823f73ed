//! Session phase state machine.
//!
//! The phase decides who owns keyboard input: the line editor while idle or
//! awaiting input, the socket bridge while interactive, nobody otherwise.

use std::fmt;

/// The single authoritative phase of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingInput,
    RunningCommand,
    Interactive,
    Recovering,
    Broken,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingInput => "awaiting_input",
            Phase::RunningCommand => "running_command",
            Phase::Interactive => "interactive",
            Phase::Recovering => "recovering",
            Phase::Broken => "broken",
        };
        f.write_str(name)
    }
}

/// Status indicator projected from the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Online,
    Offline,
    Interactive,
    Error,
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusMode::Online => "online",
            StatusMode::Offline => "offline",
            StatusMode::Interactive => "interactive",
            StatusMode::Error => "error",
        };
        f.write_str(name)
    }
}

/// Indicator plus the human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub mode: StatusMode,
    pub message: String,
}

const READY: &str = "Ready";

/// Owned phase/status state for one terminal.
///
/// Transitions only happen through the action methods below.
#[derive(Debug, Clone)]
pub struct TerminalState {
    phase: Phase,
    status: Status,
    session_broken: bool,
    network_online: bool,
}

impl Default for TerminalState {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            status: Status {
                mode: StatusMode::Offline,
                message: READY.to_string(),
            },
            session_broken: false,
            network_online: true,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn status_mode(&self) -> StatusMode {
        self.status.mode
    }

    pub fn status_message(&self) -> &str {
        &self.status.message
    }

    pub fn is_session_broken(&self) -> bool {
        self.session_broken
    }

    pub fn is_network_online(&self) -> bool {
        self.network_online
    }

    /// True while the line editor may take a new read.
    pub fn can_accept_input(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::AwaitingInput)
    }

    pub fn is_command_in_progress(&self) -> bool {
        matches!(self.phase, Phase::RunningCommand | Phase::Interactive)
    }

    pub fn is_interactive(&self) -> bool {
        self.phase == Phase::Interactive
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub fn set_idle(&mut self) {
        self.phase = Phase::Idle;
        self.status.mode = self.connectivity_mode();
        READY.clone_into(&mut self.status.message);
    }

    /// Starts a read. No-op while interactive or broken.
    pub fn set_awaiting_input(&mut self) {
        if matches!(self.phase, Phase::Interactive | Phase::Broken) {
            return;
        }
        self.phase = Phase::AwaitingInput;
    }

    pub fn set_running_command(&mut self, command: &str) {
        self.phase = Phase::RunningCommand;
        self.status.mode = StatusMode::Online;
        self.status.message = format!("Running: {command}");
    }

    pub fn set_interactive(&mut self, command: &str) {
        self.phase = Phase::Interactive;
        self.status.mode = StatusMode::Interactive;
        self.status.message = format!("Interactive: {command}");
    }

    /// Returns to idle after a command without touching the status,
    /// so an error indicator set while running stays visible.
    pub fn finish_command(&mut self) {
        if self.phase == Phase::RunningCommand {
            self.phase = Phase::Idle;
        }
    }

    /// Leaves interactive mode, projecting `mode` as the new status.
    pub fn leave_interactive(&mut self, mode: StatusMode) {
        if self.phase == Phase::Interactive {
            self.phase = Phase::Idle;
        }
        self.status.mode = mode;
        READY.clone_into(&mut self.status.message);
    }

    pub fn set_recovering(&mut self) {
        self.phase = Phase::Recovering;
        self.status.mode = StatusMode::Error;
        "Resetting...".clone_into(&mut self.status.message);
    }

    /// Successful external recovery: clears the broken flag and goes idle.
    pub fn set_recovered(&mut self) {
        self.session_broken = false;
        self.set_idle();
    }

    pub fn set_broken(&mut self, message: &str) {
        self.phase = Phase::Broken;
        self.session_broken = true;
        self.status.mode = StatusMode::Error;
        message.clone_into(&mut self.status.message);
    }

    pub fn set_error(&mut self, message: &str) {
        self.status.mode = StatusMode::Error;
        self.status.message = if message.is_empty() {
            "Error".to_string()
        } else {
            message.to_string()
        };
    }

    pub fn set_online(&mut self) {
        if self.phase != Phase::Interactive {
            self.status.mode = StatusMode::Online;
        }
    }

    pub fn set_offline(&mut self) {
        self.status.mode = StatusMode::Offline;
    }

    /// Records a connectivity change. Only idle phases project it; the
    /// others keep their own indicator until they end.
    pub fn update_online_status(&mut self, online: bool) {
        self.network_online = online;
        if !matches!(self.phase, Phase::Idle | Phase::AwaitingInput) {
            return;
        }
        self.status.mode = self.connectivity_mode();
    }

    fn connectivity_mode(&self) -> StatusMode {
        if self.network_online {
            StatusMode::Online
        } else {
            StatusMode::Offline
        }
    }
}
