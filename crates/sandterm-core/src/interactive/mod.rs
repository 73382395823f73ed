//! Interactive shell sessions over a websocket.

pub mod bridge;
pub mod frame;

pub use self::bridge::{
    BridgeEvent, InteractiveError, InteractiveSession, SessionCompletion, SessionOutcome,
    SocketState,
};
pub use self::frame::{ClientControl, InboundFrame, ServerControl, decode_text};
