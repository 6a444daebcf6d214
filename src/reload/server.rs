//! WebSocket listener for live reload.
//!
//! Accepts TCP connections and hands them to the `WsActor`, which does the
//! handshake and owns the clients.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::actor::messages::WsMsg;
use crate::{debug, log};

const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Bind `127.0.0.1:port` and start the acceptor thread.
///
/// Returns the bound port. The thread stops once the process is shutting
/// down or the actor is gone.
pub fn start_ws_server(port: u16, ws_tx: mpsc::Sender<WsMsg>) -> Result<u16> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .with_context(|| format!("failed to bind live-reload socket on {addr}"))?;
    listener.set_nonblocking(true)?;
    let port = listener.local_addr()?.port();

    thread::spawn(move || {
        while !crate::core::is_shutdown() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("reload"; "client connected: {}", peer);
                    let _ = stream.set_nonblocking(false);
                    if ws_tx.blocking_send(WsMsg::AddClient(stream)).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    log!("reload"; "accept error: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
    });

    Ok(port)
}
