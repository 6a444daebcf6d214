//! WebSocket Actor - live-reload broadcast
//!
//! ```text
//! BuildActor --[Reload/Error/Clear]--> WsActor --[broadcast]--> Clients
//! ```
//!
//! The last build error is kept and replayed to clients that connect while
//! it is still current, so a page opened after a failed rebuild shows the
//! overlay too.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::messages::WsMsg;
use crate::reload::message::ReloadMessage;
use crate::{debug, log};

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    /// Shared with the reader thread, which drops closed connections
    clients: Clients,
    pending_error: Option<ReloadMessage>,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            pending_error: None,
        }
    }

    pub async fn run(mut self) {
        let reader = Arc::clone(&self.clients);
        std::thread::spawn(move || client_reader_loop(reader));

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::Reload { reason } => {
                    debug!("ws"; "reload: {}", reason);
                    self.broadcast(&ReloadMessage::reload(reason));
                }
                WsMsg::Error { stage, message } => {
                    let msg = ReloadMessage::error(stage, message);
                    self.broadcast(&msg);
                    self.pending_error = Some(msg);
                }
                WsMsg::Clear => {
                    self.pending_error = None;
                    self.broadcast(&ReloadMessage::Clear);
                }
                WsMsg::AddClient(stream) => self.add_client(stream).await,
                WsMsg::Shutdown => {
                    debug!("ws"; "shutting down");
                    for mut ws in self.clients.lock().drain(..) {
                        let _ = ws.close(None);
                    }
                    break;
                }
            }
        }
    }

    async fn add_client(&self, stream: TcpStream) {
        let pending = self.pending_error.as_ref().map(ReloadMessage::to_json);
        let ws = match tokio::task::spawn_blocking(move || handshake(stream, pending)).await {
            Ok(Some(ws)) => ws,
            Ok(None) => return,
            Err(e) => {
                log!("ws"; "handshake task failed: {}", e);
                return;
            }
        };

        let mut clients = self.clients.lock();
        clients.push(ws);
        debug!("ws"; "client connected (total: {})", clients.len());
    }

    fn broadcast(&self, msg: &ReloadMessage) {
        let text = msg.to_json();
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            debug!("ws"; "no clients connected");
            return;
        }

        clients.retain_mut(|ws| match ws.send(Message::Text(text.clone().into())) {
            Ok(()) => true,
            Err(e) => {
                debug!("ws"; "client disconnected: {}", e);
                false
            }
        });
        debug!("ws"; "broadcast to {} clients", clients.len());
    }
}

/// Blocking handshake, then switch the socket to polled reads.
///
/// A client that stalls mid-handshake is dropped after [`HANDSHAKE_TIMEOUT`].
fn handshake(stream: TcpStream, pending: Option<String>) -> Option<WebSocket<TcpStream>> {
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            log!("ws"; "handshake failed: {}", e);
            return None;
        }
    };
    let _ = ws.get_ref().set_read_timeout(None);
    let _ = ws.get_ref().set_nonblocking(true);

    if let Some(error) = pending
        && let Err(e) = ws.send(Message::Text(error.into()))
    {
        debug!("ws"; "failed to send pending error: {}", e);
        return None;
    }
    Some(ws)
}

/// Drain incoming frames so pings are answered and closed sockets dropped.
///
/// Ends once the actor is gone.
fn client_reader_loop(clients: Clients) {
    while Arc::strong_count(&clients) > 1 {
        std::thread::sleep(Duration::from_millis(100));

        clients.lock().retain_mut(|ws| match ws.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // Flush a queued pong, if any
                !matches!(ws.flush(), Err(ref e) if !is_would_block(e))
            }
            Err(_) => false,
        });
    }
}

fn is_would_block(error: &tungstenite::Error) -> bool {
    matches!(error, tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::WouldBlock)
}
