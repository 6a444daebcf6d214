//! `prerender-routes`: write an HTML snapshot for every route.
//!
//! All routes are rendered before any snapshot is written, so a renderer
//! fetching `/` always sees the original shell.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow, bail};
use tiny_http::{Header, Request, Response, Server};

use super::shell::{self, insert_before};
use super::{Prerenderer, RenderRequest, write_atomic};
use crate::config::URL_PLACEHOLDER;
use crate::core::Route;
use crate::debug;
use crate::embed::escape_html;
use crate::pipeline::{PipelineConfig, StageError, StageKind};
use crate::utils::exec::Cmd;
use crate::utils::{mime, path::resolve_url};

pub fn run(config: &PipelineConfig, prerenderer: &dyn Prerenderer) -> Result<usize> {
    let Some(settings) = config.prerender() else {
        return Ok(0);
    };

    let shell_path = shell::shell_path(config);
    let shell = fs::read_to_string(&shell_path).map_err(|_| {
        StageError::new(StageKind::PrerenderRoutes, "HTML shell is missing").at(&shell_path)
    })?;

    let server = if prerenderer.needs_server() {
        Some(PreviewServer::start(config.output().to_path_buf())?)
    } else {
        None
    };

    let mut pages = Vec::with_capacity(settings.routes.len());
    for route in &settings.routes {
        let request = RenderRequest {
            route,
            url: server.as_ref().map(|s| s.url(route)),
            shell: &shell,
            render_after_event: &settings.render_after_event,
        };
        debug!("prerender"; "{}", route);
        let html = prerenderer.render(&request).map_err(|err| {
            StageError::new(StageKind::PrerenderRoutes, format!("{route}: {err:#}"))
        })?;
        pages.push((route.output_file(), html));
    }
    drop(server);

    let output = config.output();
    for (file, html) in &pages {
        write_atomic(&output.join(file), html.as_bytes())?;
    }
    Ok(pages.len())
}

// ============================================================================
// renderers
// ============================================================================

/// Marks the shell with the route it stands for. Needs no browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellPrerenderer;

impl Prerenderer for ShellPrerenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String> {
        let marker = format!(
            "<meta name=\"prerendered-route\" content=\"{}\">\n",
            escape_html(request.route.as_str())
        );
        Ok(insert_before(request.shell, "</head>", &marker))
    }
}

/// Runs a headless renderer command per route and takes its stdout.
///
/// `{url}` in the argv is replaced with the page URL on a temporary server.
/// The command is told which document event ends rendering through
/// `PAGESMITH_RENDER_AFTER_EVENT`.
#[derive(Debug, Clone)]
pub struct CommandPrerenderer {
    argv: Vec<String>,
}

impl CommandPrerenderer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Prerenderer for CommandPrerenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String> {
        let url = request
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("no server URL for {}", request.route))?;
        let argv: Vec<String> = self
            .argv
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, url))
            .collect();

        let output = Cmd::from_slice(&argv)
            .envs([
                ("PAGESMITH_RENDER_AFTER_EVENT", request.render_after_event),
                ("PAGESMITH_ROUTE", request.route.as_str()),
            ])
            .quiet(true)
            .run()?;

        let html = String::from_utf8(output.stdout).context("renderer printed invalid UTF-8")?;
        if html.trim().is_empty() {
            bail!("`{}` printed no HTML", self.argv[0]);
        }
        Ok(html)
    }

    fn needs_server(&self) -> bool {
        true
    }
}

// ============================================================================
// preview server
// ============================================================================

/// Serves the output tree on an ephemeral localhost port, falling back to
/// `index.html` for unknown paths like a single-page app host would.
struct PreviewServer {
    server: Arc<Server>,
    addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl PreviewServer {
    fn start(root: PathBuf) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|err| anyhow!("failed to start prerender server: {err}"))?;
        let addr = server
            .server_addr()
            .to_ip()
            .context("prerender server is not bound to an IP address")?;
        let server = Arc::new(server);

        let incoming = Arc::clone(&server);
        let worker = thread::spawn(move || {
            for request in incoming.incoming_requests() {
                if let Err(err) = respond(request, &root) {
                    debug!("prerender"; "response failed: {}", err);
                }
            }
        });

        Ok(Self {
            server,
            addr,
            worker: Some(worker),
        })
    }

    fn url(&self, route: &Route) -> String {
        format!("http://{}{}", self.addr, route)
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn respond(request: Request, root: &Path) -> std::io::Result<()> {
    let file = resolve_url(request.url(), root).or_else(|| {
        let index = root.join(shell::SHELL_FILE);
        index.is_file().then_some(index)
    });
    let Some(file) = file else {
        return request.respond(Response::from_string("not found").with_status_code(404));
    };

    let body = fs::read(&file)?;
    let mut response = Response::from_data(body);
    if let Ok(header) = Header::from_bytes("Content-Type", mime::from_path(&file)) {
        response = response.with_header(header);
    }
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpStream;

    use super::*;

    fn fetch(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_shell_renderer_marks_route() {
        let route = Route::parse("/about").unwrap();
        let html = ShellPrerenderer
            .render(&RenderRequest {
                route: &route,
                url: None,
                shell: "<html><head></head><body></body></html>",
                render_after_event: "prerender-trigger",
            })
            .unwrap();
        assert!(html.contains("<meta name=\"prerendered-route\" content=\"/about\">\n</head>"));
    }

    #[test]
    fn test_preview_server_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>shell</p>").unwrap();
        fs::write(dir.path().join("app.js"), "let a;").unwrap();

        let server = PreviewServer::start(dir.path().to_path_buf()).unwrap();
        let js = fetch(server.addr, "/app.js");
        assert!(js.contains("text/javascript"));
        assert!(js.ends_with("let a;"));
        // Unknown route falls back to the shell
        assert!(fetch(server.addr, "/blog/post").ends_with("<p>shell</p>"));
        drop(server);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_renderer_substitutes_url() {
        let route = Route::parse("/about").unwrap();
        let renderer = CommandPrerenderer::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo \"<html>$0 $PAGESMITH_RENDER_AFTER_EVENT</html>\"".to_string(),
            "{url}".to_string(),
        ]);
        let html = renderer
            .render(&RenderRequest {
                route: &route,
                url: Some("http://127.0.0.1:9/about".to_string()),
                shell: "",
                render_after_event: "prerender-trigger",
            })
            .unwrap();
        assert_eq!(html.trim(), "<html>http://127.0.0.1:9/about prerender-trigger</html>");
    }
}
