//! Default mode: the interactive terminal.

use anyhow::Result;
use sandterm_core::app::AppOptions;
use sandterm_core::config::Config;
use sandterm_core::core::command::CommandSets;
use sandterm_core::core::session_id;
use sandterm_core::dispatch::Dispatcher;
use sandterm_core::sandbox::SandboxClient;

pub async fn run(
    config: &Config,
    client: SandboxClient,
    prefill: Option<String>,
    autorun: bool,
) -> Result<()> {
    let options = AppOptions {
        prefill: prefill.filter(|line| !line.trim().is_empty()),
        autorun,
        ..AppOptions::from_config(config, session_id::generate_tab_id())
    };
    let dispatcher = Dispatcher::new(client, CommandSets::from_config(config));

    sandterm_tui::run_terminal(dispatcher, options, &config.warmup).await
}
