//! Process-wide server state.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)
//! - `STATE`: where the dev server is in its lifecycle
//! - `SERVER`: HTTP listener to unblock on shutdown
//! - `SHUTDOWN_TX`: signal for the actor system

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

static STATE: AtomicU8 = AtomicU8::new(ServerState::Idle as u8);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for actor system
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

/// Dev server lifecycle.
///
/// `Idle → Watching → (Rebuilding → Watching)* → Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    /// Bound, initial build not finished.
    Idle = 0,
    Watching = 1,
    Rebuilding = 2,
    Terminated = 3,
}

impl ServerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Watching,
            2 => Self::Rebuilding,
            _ => Self::Terminated,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Watching => "watching",
            Self::Rebuilding => "rebuilding",
            Self::Terminated => "terminated",
        }
    }

    /// Whether `self → next` is an edge of the lifecycle.
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Watching)
                | (Self::Watching, Self::Rebuilding)
                | (Self::Rebuilding, Self::Watching)
                | (Self::Idle | Self::Watching | Self::Rebuilding, Self::Terminated)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Move to `next`, logging the transition.
///
/// Returns `false` and leaves the state alone when `next` is not reachable
/// from the current state, e.g. any transition after `Terminated`.
pub fn transition(next: ServerState) -> bool {
    let result = STATE.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
        ServerState::from_u8(raw)
            .can_become(next)
            .then_some(next as u8)
    });
    match result {
        Ok(raw) => {
            crate::log!("serve"; "{} -> {}", ServerState::from_u8(raw), next);
            crate::logger::status_detach();
            true
        }
        Err(_) => false,
    }
}

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The handler behavior depends on whether a server has been registered:
/// - Before `register_server()`: exit immediately (one-shot build)
/// - After `register_server()`: graceful shutdown (unblock server, notify actors)
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(130);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
