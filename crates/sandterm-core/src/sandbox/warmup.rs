//! Keep-alive loop that keeps the session's sandbox container warm.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sandbox::SandboxClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupEvent {
    Healthy,
    /// Only reported for the initial attempt.
    Failed(String),
}

/// Handle to a running warmup loop. Dropping it stops the loop.
pub struct WarmupController {
    ready: watch::Receiver<bool>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl WarmupController {
    /// Resolves once the initial attempt finished (immediately when skipped).
    pub async fn ready(&mut self) {
        // A closed channel means the task is gone; nothing left to wait for.
        let _ = self.ready.wait_for(|ready| *ready).await;
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for WarmupController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts the loop: one health ping now (unless `skip_immediate`), then
/// one every `interval`.
pub fn start_sandbox_warmup(
    client: SandboxClient,
    tab_id: String,
    interval: Duration,
    skip_immediate: bool,
    events: mpsc::UnboundedSender<WarmupEvent>,
) -> WarmupController {
    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = watch::channel(false);

    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        if !skip_immediate {
            tokio::select! {
                () = task_cancel.cancelled() => return,
                () = warmup_once(&client, &tab_id, false, &events) => {}
            }
        }
        let _ = ready_tx.send(true);

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = task_cancel.cancelled() => break,
                _ = ticker.tick() => warmup_once(&client, &tab_id, true, &events).await,
            }
        }
        tracing::debug!("warmup loop stopped");
    });

    WarmupController {
        ready: ready_rx,
        cancel,
        handle,
    }
}

async fn warmup_once(
    client: &SandboxClient,
    tab_id: &str,
    recurring: bool,
    events: &mpsc::UnboundedSender<WarmupEvent>,
) {
    match client.health(tab_id).await {
        Ok(()) => {
            let _ = events.send(WarmupEvent::Healthy);
        }
        Err(err) if recurring => {
            tracing::debug!(error = %err, "recurring sandbox warmup failed");
        }
        Err(err) => {
            tracing::debug!(error = %err, "sandbox warmup failed");
            let _ = events.send(WarmupEvent::Failed(err.message));
        }
    }
}
