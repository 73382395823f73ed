//! Command classification.

use std::collections::HashSet;

use crate::config::Config;

/// Commands handled without a network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Local(LocalCommand),
    Simple,
    Streaming,
    Interactive,
}

/// Token sets used to route submitted lines.
#[derive(Debug, Clone, Default)]
pub struct CommandSets {
    streaming: HashSet<String>,
    interactive: HashSet<String>,
}

impl CommandSets {
    pub fn new<S, I>(streaming: S, interactive: I) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            streaming: streaming
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
            interactive: interactive
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.streaming_commands, &config.interactive_commands)
    }

    /// Classifies a trimmed, non-empty command by its first token.
    pub fn classify(&self, command: &str) -> CommandKind {
        let trimmed = command.trim();
        if trimmed.eq_ignore_ascii_case("clear") {
            return CommandKind::Local(LocalCommand::Clear);
        }

        let binary = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if self.interactive.contains(&binary) {
            CommandKind::Interactive
        } else if self.streaming.contains(&binary) {
            CommandKind::Streaming
        } else {
            CommandKind::Simple
        }
    }
}
