//! Exec command handler.
//!
//! Runs one command without the terminal UI: stdout and stderr go to the
//! process streams and the remote exit code becomes ours.

use std::io::{self, Write};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use sandterm_core::config::Config;
use sandterm_core::core::command::{CommandKind, CommandSets};
use sandterm_core::sandbox::{ExecResult, ExecStream, SandboxClient, StreamEvent};

pub async fn run(config: &Config, client: SandboxClient, command: &str) -> Result<i32> {
    let command = command.trim();
    if command.is_empty() {
        anyhow::bail!("No command given");
    }

    match CommandSets::from_config(config).classify(command) {
        CommandKind::Interactive => anyhow::bail!(
            "`{command}` opens an interactive session.\n\
             Run it from the interactive terminal (`sandterm`)."
        ),
        CommandKind::Local(_) => Ok(0),
        CommandKind::Simple => {
            let result = client.exec(command).await.context("execute command")?;
            Ok(print_result(&result))
        }
        CommandKind::Streaming => {
            match client
                .exec_streaming(command)
                .await
                .context("execute command")?
            {
                ExecStream::Json(result) => Ok(print_result(&result)),
                ExecStream::Events(mut events) => {
                    let mut code = 0;
                    while let Some(event) = events.next().await {
                        code = print_event(&event.context("read event stream")?, code);
                    }
                    Ok(code)
                }
            }
        }
    }
}

fn print_result(result: &ExecResult) -> i32 {
    let stdout = result.stdout.as_deref().unwrap_or_default();
    let stderr = result.stderr.as_deref().unwrap_or_default();
    print!("{stdout}");
    if !stdout.is_empty() && !stdout.ends_with('\n') {
        println!();
    }
    eprint!("{stderr}");
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        eprintln!();
    }

    if !result.success
        && let Some(error) = result.error.as_deref().filter(|e| !e.is_empty())
        && error.trim() != stderr.trim()
    {
        eprintln!("{error}");
    }
    let _ = io::stdout().flush();

    match result.exit_code {
        Some(code) if code != 0 => to_exit_code(code),
        _ if !result.success => 1,
        _ => 0,
    }
}

/// Prints one event and returns the exit code seen so far.
fn print_event(event: &StreamEvent, code: i32) -> i32 {
    match event {
        StreamEvent::Start => code,
        StreamEvent::Stdout(data) => {
            print!("{data}");
            let _ = io::stdout().flush();
            code
        }
        StreamEvent::Stderr(data) => {
            eprint!("{data}");
            code
        }
        StreamEvent::Error { message } => {
            eprintln!("{}", message.as_deref().unwrap_or("Stream error"));
            1
        }
        StreamEvent::Complete { exit_code } => match exit_code {
            Some(0) => code,
            Some(other) => to_exit_code(*other),
            None => 1,
        },
    }
}

fn to_exit_code(code: i64) -> i32 {
    i32::try_from(code).unwrap_or(1)
}
