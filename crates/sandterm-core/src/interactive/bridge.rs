//! Socket bridge for one interactive session.
//!
//! A single I/O task owns the websocket. The session handle talks to it
//! through two channels: outbound frames in, `BridgeEvent`s out. Teardown
//! is driven by the owner (see `TerminalApp::reset_interactive_state`),
//! which also fulfils the completion channel.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::core::keyboard::InteractiveInput;
use crate::core::utf8::Utf8Decoder;
use crate::interactive::frame::{ClientControl, InboundFrame, decode_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

/// Lifecycle and data events reported by the I/O task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Opened,
    /// The post-open delay elapsed; the queued command line may be sent.
    FlushInitialInput,
    Frame(InboundFrame),
    Closed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveError {
    pub message: String,
}

impl InteractiveError {
    pub fn ended_with_error() -> Self {
        Self {
            message: "Interactive session ended with error".to_string(),
        }
    }
}

impl fmt::Display for InteractiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for InteractiveError {}

pub type SessionOutcome = Result<(), InteractiveError>;

/// Resolves when the session ends: `Ok` on a clean end, `Err` on error.
pub type SessionCompletion = oneshot::Receiver<SessionOutcome>;

#[derive(Debug)]
enum Outbound {
    Input(String),
    Control(ClientControl),
    Close,
}

pub struct InteractiveSession {
    command: String,
    state: SocketState,
    init_queued: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<BridgeEvent>,
    completion: Option<oneshot::Sender<SessionOutcome>>,
    task: JoinHandle<()>,
}

impl InteractiveSession {
    /// Connects to `url` in the background.
    ///
    /// `initial_input` is queued and sent once, `init_delay` after the
    /// socket opened. The `init` control message carries `size`.
    pub fn open(
        url: Url,
        initial_input: String,
        init_delay: Duration,
        size: (u16, u16),
    ) -> (Self, SessionCompletion) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        let init = ClientControl::Init {
            cols: size.0,
            rows: size.1,
        };
        let command = initial_input.trim().to_string();
        let task = tokio::spawn(run_socket(url, init, init_delay, outbound_rx, events_tx));

        let session = Self {
            command,
            state: SocketState::Connecting,
            init_queued: initial_input,
            outbound: outbound_tx,
            events: events_rx,
            completion: Some(completion_tx),
            task,
        };
        (session, completion_rx)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn init_queued(&self) -> &str {
        &self.init_queued
    }

    /// Waits for the next event, tracking socket state.
    ///
    /// A vanished I/O task reads as `Closed`.
    pub async fn next_event(&mut self) -> BridgeEvent {
        let event = self.events.recv().await.unwrap_or(BridgeEvent::Closed);
        match &event {
            BridgeEvent::Opened => self.state = SocketState::Open,
            BridgeEvent::Closed | BridgeEvent::Error(_) => self.state = SocketState::Closed,
            BridgeEvent::FlushInitialInput | BridgeEvent::Frame(_) => {}
        }
        event
    }

    /// Sends the queued command line once and clears it.
    pub fn flush_initial_input(&mut self) {
        if self.state != SocketState::Open || self.init_queued.is_empty() {
            return;
        }
        let queued = std::mem::take(&mut self.init_queued);
        self.send_input(&queued);
    }

    pub fn send_resize(&mut self, cols: u16, rows: u16) {
        if self.state == SocketState::Open {
            let _ = self
                .outbound
                .send(Outbound::Control(ClientControl::Resize { cols, rows }));
        }
    }

    /// Takes the completion sender; only the first caller gets it.
    pub fn take_completion(&mut self) -> Option<oneshot::Sender<SessionOutcome>> {
        self.completion.take()
    }

    /// Closes the socket if still open and drops any queued input.
    pub fn close(&mut self) {
        match self.state {
            SocketState::Open => {
                let _ = self.outbound.send(Outbound::Close);
            }
            SocketState::Connecting => self.task.abort(),
            SocketState::Closed => {}
        }
        self.state = SocketState::Closed;
        self.init_queued.clear();
    }
}

impl InteractiveInput for InteractiveSession {
    fn send_input(&mut self, data: &str) {
        if data.is_empty() || self.state != SocketState::Open {
            return;
        }
        let _ = self.outbound.send(Outbound::Input(data.to_string()));
    }
}

impl Drop for InteractiveSession {
    fn drop(&mut self) {
        if self.state == SocketState::Connecting {
            self.task.abort();
        }
    }
}

async fn run_socket(
    url: Url,
    init: ClientControl,
    init_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<BridgeEvent>,
) {
    tracing::info!(url = %url, "opening interactive socket");
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::warn!(error = %e, "interactive socket failed to connect");
            let _ = events.send(BridgeEvent::Error(e.to_string()));
            return;
        }
    };
    let (mut writer, mut reader) = ws_stream.split();
    let _ = events.send(BridgeEvent::Opened);

    if let Err(e) = writer.send(Message::text(init.to_json())).await {
        tracing::warn!(error = %e, "failed to send init frame");
        let _ = events.send(BridgeEvent::Error(e.to_string()));
        return;
    }

    let flush = tokio::time::sleep(init_delay);
    tokio::pin!(flush);
    let mut flushed = false;
    let mut utf8 = Utf8Decoder::new();

    loop {
        tokio::select! {
            () = &mut flush, if !flushed => {
                flushed = true;
                let _ = events.send(BridgeEvent::FlushInitialInput);
            }
            message = outbound.recv() => {
                let frame = match message {
                    Some(Outbound::Input(data)) => Message::binary(data.into_bytes()),
                    Some(Outbound::Control(control)) => Message::text(control.to_json()),
                    Some(Outbound::Close) | None => {
                        tracing::debug!("closing interactive socket");
                        let _ = writer.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = writer.send(frame).await {
                    tracing::warn!(error = %e, "interactive socket write failed");
                    let _ = events.send(BridgeEvent::Error(e.to_string()));
                    break;
                }
            }
            incoming = reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(BridgeEvent::Frame(decode_text(text.as_str())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let mut text = String::new();
                    utf8.decode(&bytes, &mut text);
                    if !text.is_empty() {
                        let _ = events.send(BridgeEvent::Frame(InboundFrame::Output(text)));
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("interactive socket closed by remote");
                    let _ = events.send(BridgeEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "interactive socket read error");
                    let _ = events.send(BridgeEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }
}
