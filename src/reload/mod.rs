//! Live reload for the dev server.
//!
//! - `message` - JSON protocol spoken with `hotreload.js`
//! - `output` - generation directories and the published tree
//! - `server` - WebSocket listener feeding the `WsActor`

pub mod message;
pub mod output;
pub mod server;

pub use output::{LiveOutput, Staging};

/// Default WebSocket port for live reload.
pub const DEFAULT_WS_PORT: u16 = 35729;
