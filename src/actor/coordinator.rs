//! Actor Coordinator - wires up the dev-server actor system.
//!
//! A thin orchestrator: it creates channels, builds the actors and runs them
//! until the shutdown signal. Build logic lives in `pipeline/`.
//!
//! ```text
//! FsActor --> BuildActor --> WsActor
//!  (watch)    (rebuild)     (broadcast)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::build::BuildActor;
use super::fs::FsActor;
use super::messages::{BuildMsg, WsMsg};
use super::ws::WsActor;
use crate::pipeline::PipelineAssembler;
use crate::reload::{LiveOutput, Staging};
use crate::debug;
use crate::stages::Toolchain;

/// Channel buffer size
const CHANNEL_BUFFER: usize = 32;

/// Channel feeding the `WsActor`, created before the actors so the
/// WebSocket listener can be bound up front.
pub fn ws_channel() -> (mpsc::Sender<WsMsg>, mpsc::Receiver<WsMsg>) {
    mpsc::channel(CHANNEL_BUFFER)
}

pub struct Coordinator {
    assembler: Arc<PipelineAssembler>,
    toolchain: Arc<Toolchain>,
    staging: Arc<Staging>,
    live: Arc<LiveOutput>,
    watch_dirs: Vec<PathBuf>,
    ws_tx: mpsc::Sender<WsMsg>,
    ws_rx: mpsc::Receiver<WsMsg>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(
        assembler: Arc<PipelineAssembler>,
        toolchain: Arc<Toolchain>,
        staging: Arc<Staging>,
        live: Arc<LiveOutput>,
        (ws_tx, ws_rx): (mpsc::Sender<WsMsg>, mpsc::Receiver<WsMsg>),
    ) -> Self {
        Self {
            assembler,
            toolchain,
            staging,
            live,
            watch_dirs: Vec::new(),
            ws_tx,
            ws_rx,
            shutdown_rx: None,
        }
    }

    pub fn with_watch_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.watch_dirs = dirs;
        self
    }

    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub async fn run(self) -> Result<()> {
        let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);
        let cancel = Arc::new(AtomicBool::new(false));

        // Our own writes must not trigger rebuilds
        let ignore = vec![
            self.assembler.inputs().output.clone(),
            self.staging.root().to_path_buf(),
        ];
        let fs = FsActor::new(&self.watch_dirs, ignore, build_tx.clone(), Arc::clone(&cancel))
            .map_err(|e| anyhow!("watcher failed: {}", e))?;
        let build = BuildActor::new(
            build_rx,
            self.ws_tx.clone(),
            self.assembler,
            self.toolchain,
            self.staging,
            self.live,
            Arc::clone(&cancel),
        );
        let ws = WsActor::new(self.ws_rx);

        debug!("actor"; "start");
        let build_handle = tokio::spawn(build.run());
        let fs_handle = tokio::spawn(fs.run());
        let ws_handle = tokio::spawn(ws.run());

        match self.shutdown_rx {
            Some(rx) => loop {
                if rx.try_recv().is_ok() || crate::core::is_shutdown() {
                    debug!("actor"; "shutdown signal received");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            None => {
                tokio::select! {
                    _ = fs_handle => {}
                    _ = ws_handle => {}
                }
            }
        }

        // A running build stops after its current stage
        cancel.store(true, Ordering::Release);
        let _ = build_tx.send(BuildMsg::Shutdown).await;
        let _ = self.ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_secs(2), build_handle).await;

        debug!("actor"; "stopped");
        Ok(())
    }
}
