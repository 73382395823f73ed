//! Reset command handler.

use anyhow::{Context, Result};
use sandterm_core::sandbox::SandboxClient;

pub async fn run(client: &SandboxClient) -> Result<()> {
    let response = client.reset(None).await.context("reset sandbox")?;
    let message = response.message.filter(|m| !m.is_empty());
    if !response.success {
        anyhow::bail!(message.unwrap_or_else(|| "Reset failed".to_string()));
    }
    println!("{}", message.as_deref().unwrap_or("Sandbox reset"));
    Ok(())
}
