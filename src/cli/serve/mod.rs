//! Development server with live reload.
//!
//! ```text
//! tiny_http + rayon ──reads──> LiveOutput <──publishes── BuildActor
//!                                                            ^
//!                                  FsActor ──Rebuild─────────┘
//! ```
//!
//! Requests are answered from the latest published generation. Until the
//! first build succeeds they get a self-refreshing loading page.

mod content;
mod lifecycle;
mod response;

pub use content::HOTRELOAD_URL;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::actor::{Coordinator, ws_channel};
use crate::config::ServeConfig;
use crate::core::{ServerState, register_server, transition};
use crate::pipeline::PipelineAssembler;
use crate::reload::{LiveOutput, Staging};
use crate::stages::Toolchain;
use crate::{debug, log};

/// Threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// What a request handler needs to answer.
struct ServeContext {
    live: Arc<LiveOutput>,
    ws_port: u16,
    /// Shown on the loading page.
    title: String,
}

/// Runs the development pipeline continuously and serves its output.
pub struct DevServerController {
    assembler: PipelineAssembler,
    serve: ServeConfig,
    toolchain: Toolchain,
    watch_dirs: Vec<PathBuf>,
}

impl DevServerController {
    pub fn new(assembler: PipelineAssembler, serve: ServeConfig) -> Self {
        let watch_dirs = vec![assembler.inputs().root.clone()];
        Self {
            assembler,
            serve,
            toolchain: Toolchain::builtin(),
            watch_dirs,
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_watch_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.watch_dirs = dirs;
        self
    }

    /// Serve until Ctrl+C.
    ///
    /// Both listeners are bound before the initial build starts; failing to
    /// bind either is an error.
    pub fn start(self) -> Result<()> {
        let inputs = self.assembler.inputs();
        let staging = Staging::for_output(&inputs.output)?;
        let title = inputs.manifest.name.clone();

        let (server, addr) = lifecycle::bind(self.serve.interface, self.serve.port)?;
        let server = Arc::new(server);

        let (ws_tx, ws_rx) = ws_channel();
        let ws_port = crate::reload::server::start_ws_server(self.serve.ws_port, ws_tx.clone())
            .context("live reload unavailable")?;
        debug!("reload"; "ws://127.0.0.1:{}", ws_port);

        let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
        register_server(Arc::clone(&server), shutdown_tx);
        log!("serve"; "http://{}", addr);

        let live = Arc::new(LiveOutput::new());
        let coordinator = Coordinator::new(
            Arc::new(self.assembler),
            Arc::new(self.toolchain),
            Arc::new(staging),
            Arc::clone(&live),
            (ws_tx, ws_rx),
        )
        .with_watch_dirs(self.watch_dirs)
        .with_shutdown_signal(shutdown_rx);
        let actors = lifecycle::spawn_actors(coordinator);

        let ctx = Arc::new(ServeContext {
            live,
            ws_port,
            title,
        });
        run_request_loop(&server, &ctx)?;

        transition(ServerState::Terminated);
        lifecycle::wait_for_shutdown(actors);
        Ok(())
    }
}

/// Blocks until the server is unblocked by the shutdown handler.
fn run_request_loop(server: &Server, ctx: &Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("failed to create request pool")?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    if request.url() == HOTRELOAD_URL {
        return response::respond_hotreload_js(request, ctx.ws_port);
    }

    // Held for the whole response: a newer publish cannot remove this tree
    let Some(generation) = ctx.live.current() else {
        return response::respond_loading(request, &ctx.title);
    };

    match crate::utils::path::resolve_url(request.url(), generation.dir()) {
        Some(path) => response::respond_file(request, &path),
        None => response::respond_not_found(request),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::thread;

    use super::*;

    /// One-shot GET; returns the status code and the body.
    fn get(addr: SocketAddr, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();

        let status = raw[9..12].parse().unwrap();
        let body = raw.split_once("\r\n\r\n").map(|(_, b)| b.to_string()).unwrap_or_default();
        (status, body)
    }

    fn serve(ctx: ServeContext) -> SocketAddr {
        let (server, addr) =
            lifecycle::bind(std::net::Ipv4Addr::LOCALHOST.into(), 0).unwrap();
        let ctx = Arc::new(ctx);
        thread::spawn(move || {
            for request in server.incoming_requests() {
                handle_request(request, &ctx).unwrap();
            }
        });
        addr
    }

    #[test]
    fn test_loading_page_until_first_generation() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::for_output(&dir.path().join("dist")).unwrap();
        let live = Arc::new(LiveOutput::new());
        let addr = serve(ServeContext {
            live: Arc::clone(&live),
            ws_port: 35729,
            title: "Demo".into(),
        });

        let (status, body) = get(addr, "/");
        assert_eq!(status, 503);
        assert!(body.contains("Building Demo"));

        let generation = staging.next().unwrap();
        fs::create_dir_all(generation.dir().join("about")).unwrap();
        fs::write(
            generation.dir().join("index.html"),
            "<html><body>home</body></html>",
        )
        .unwrap();
        fs::write(generation.dir().join("about/index.html"), "<p>about</p>").unwrap();
        fs::write(generation.dir().join("index.js"), "let a;").unwrap();
        live.publish(generation);

        let (status, body) = get(addr, "/");
        assert_eq!(status, 200);
        assert!(body.contains(&format!(r#"<script src="{HOTRELOAD_URL}"></script></body>"#)));

        let (status, body) = get(addr, "/about/");
        assert_eq!(status, 200);
        assert!(body.starts_with("<p>about</p>"));

        let (status, body) = get(addr, "/index.js");
        assert_eq!(status, 200);
        assert_eq!(body, "let a;");

        assert_eq!(get(addr, "/missing.png").0, 404);
        assert_eq!(get(addr, "/../secret").0, 404);
    }

    #[test]
    fn test_hotreload_script_served_from_memory() {
        let addr = serve(ServeContext {
            live: Arc::new(LiveOutput::new()),
            ws_port: 40000,
            title: "Demo".into(),
        });

        let (status, body) = get(addr, HOTRELOAD_URL);
        assert_eq!(status, 200);
        assert!(body.contains(":40000"));
    }
}
