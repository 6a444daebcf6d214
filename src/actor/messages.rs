//! Actor message definitions.
//!
//! ```text
//! FsActor --Rebuild--> BuildActor --Reload/Error/Clear--> WsActor
//! ```

use std::net::TcpStream;
use std::path::PathBuf;

/// Messages to the `BuildActor`.
#[derive(Debug)]
pub enum BuildMsg {
    /// Source files changed; rebuild once for all of them.
    Rebuild { changed: Vec<PathBuf> },
    Shutdown,
}

/// Messages to the `WsActor`.
#[derive(Debug)]
pub enum WsMsg {
    /// A new generation is live.
    Reload { reason: String },
    /// A rebuild failed; the overlay shows `message`.
    Error { stage: String, message: String },
    /// A rebuild succeeded after a failure.
    Clear,
    /// Freshly accepted connection, handshake pending.
    AddClient(TcpStream),
    Shutdown,
}
