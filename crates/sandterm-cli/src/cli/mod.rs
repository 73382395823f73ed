//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use sandterm_core::config::{self, Config};
use sandterm_core::core::session_id;
use sandterm_core::logging;
use sandterm_core::sandbox::SandboxClient;

mod commands;

#[derive(Parser)]
#[command(name = "sandterm")]
#[command(version)]
#[command(about = "Terminal client for remote sandbox shells")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Prefill the first prompt with a command line
    #[arg(long, value_name = "LINE")]
    cmd: Option<String>,

    /// Submit the --cmd line immediately
    #[arg(long, requires = "cmd")]
    autorun: bool,
}

/// Arguments shared by every command that talks to the server.
#[derive(clap::Args, Debug, Clone, Default)]
struct ConnectionArgs {
    /// Sandbox server URL (overrides SANDTERM_URL and the config file)
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Use this session id instead of the persisted one
    #[arg(long, value_name = "ID", global = true)]
    session: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run one command non-interactively
    Exec {
        /// The command line to run
        #[arg(
            value_name = "COMMAND",
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        command: Vec<String>,
    },
    /// Reset the sandbox behind the current session
    Reset,
    /// Show the current session id
    Session {
        /// Replace the persisted session id with a fresh one
        #[arg(long)]
        new: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

/// Parses arguments and runs the command. Returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let Cli {
        command,
        connection,
        cmd,
        autorun,
    } = cli;

    match command {
        Some(Commands::Config { command }) => {
            match command {
                ConfigCommands::Path => commands::config::path(),
                ConfigCommands::Init => commands::config::init()?,
            }
            return Ok(0);
        }
        Some(Commands::Session { new }) => {
            commands::session::run(new)?;
            return Ok(0);
        }
        _ => {}
    }

    let _log_guard = logging::init_logging();
    let config = Config::load().context("load config")?;
    let client = connect(&config, &connection)?;

    match command {
        None => {
            commands::run::run(&config, client, cmd, autorun).await?;
            Ok(0)
        }
        Some(Commands::Exec { command }) => {
            commands::exec::run(&config, client, &command.join(" ")).await
        }
        Some(Commands::Reset) => {
            commands::reset::run(&client).await?;
            Ok(0)
        }
        Some(Commands::Session { .. } | Commands::Config { .. }) => Ok(0),
    }
}

fn connect(config: &Config, connection: &ConnectionArgs) -> Result<SandboxClient> {
    let env_url = std::env::var(config::SERVER_URL_ENV).ok();
    let base_url = config.resolve_server_url(connection.url.as_deref(), env_url.as_deref())?;
    let session_id = session_id::resolve(
        connection.session.as_deref(),
        &config::paths::session_path(),
    )
    .context("resolve session id")?;

    tracing::info!(url = %base_url, session_id = %session_id, "connecting");
    Ok(SandboxClient::new(base_url, session_id).with_timeout(config.request_timeout()))
}
