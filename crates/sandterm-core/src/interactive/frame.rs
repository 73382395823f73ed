//! Websocket frame encoding and decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Control messages the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerControl {
    Pong,
    Ready,
    ProcessExit {
        #[serde(rename = "exitCode", default, deserialize_with = "lenient_exit_code")]
        exit_code: Option<i64>,
    },
}

/// Control messages the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientControl {
    Init { cols: u16, rows: u16 },
    Resize { cols: u16, rows: u16 },
}

impl ClientControl {
    pub fn to_json(self) -> String {
        // Two u16 fields and a tag; serialization cannot fail.
        serde_json::to_string(&self).unwrap_or_default()
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Control(ServerControl),
    Output(String),
}

/// Text frames are control frames only when they parse as a known control
/// object; anything else is shell output.
pub fn decode_text(text: &str) -> InboundFrame {
    match serde_json::from_str::<ServerControl>(text) {
        Ok(control) => InboundFrame::Control(control),
        Err(_) => InboundFrame::Output(text.to_string()),
    }
}

fn lenient_exit_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))))
}
