//! Core sandterm library (state machine, key mapping, dispatcher, sandbox client, socket bridge).

pub mod app;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod interactive;
pub mod logging;
pub mod sandbox;

#[cfg(test)]
mod test_support;
