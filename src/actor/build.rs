//! Build Actor - runs the development pipeline into fresh generations.
//!
//! ```text
//! FsActor --Rebuild--> BuildActor --Reload/Error/Clear--> WsActor
//!                          |
//!                     LiveOutput (publish on success)
//! ```
//!
//! Requests that queue up while a build runs are merged into one. A build
//! whose cancel flag is raised is discarded, and its changes carry over to
//! the next one. Only a successful build replaces what the server answers
//! with; after a failure the previous generation stays live.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::messages::{BuildMsg, WsMsg};
use crate::core::{ServerState, transition};
use crate::logger::{status_error, status_success, status_warning};
use crate::pipeline::{BuildExecutor, BuildResult, PipelineAssembler, PipelineError};
use crate::reload::{LiveOutput, Staging};
use crate::stages::Toolchain;
use crate::utils::fmt::{format_duration, plural_count};
use crate::{debug, log};

/// How a single dev build ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Published,
    Failed,
    Superseded,
}

pub struct BuildActor {
    rx: mpsc::Receiver<BuildMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    assembler: Arc<PipelineAssembler>,
    toolchain: Arc<Toolchain>,
    staging: Arc<Staging>,
    live: Arc<LiveOutput>,
    /// Raised by the `FsActor` when newer changes arrive
    cancel: Arc<AtomicBool>,
    /// The last finished build failed; the next success clears the overlay
    failing: bool,
}

impl BuildActor {
    pub fn new(
        rx: mpsc::Receiver<BuildMsg>,
        ws_tx: mpsc::Sender<WsMsg>,
        assembler: Arc<PipelineAssembler>,
        toolchain: Arc<Toolchain>,
        staging: Arc<Staging>,
        live: Arc<LiveOutput>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx,
            ws_tx,
            assembler,
            toolchain,
            staging,
            live,
            cancel,
            failing: false,
        }
    }

    /// Initial build, then one build per batch of changes until shutdown.
    pub async fn run(mut self) {
        self.build(&[]).await;
        transition(ServerState::Watching);

        while let Some(msg) = self.rx.recv().await {
            let BuildMsg::Rebuild { mut changed } = msg else {
                break;
            };

            loop {
                if !self.drain_into(&mut changed) {
                    return;
                }
                // Cleared after the drain: a later flag has its request queued
                self.cancel.store(false, Ordering::Release);

                transition(ServerState::Rebuilding);
                if self.build(&changed).await != Outcome::Superseded {
                    transition(ServerState::Watching);
                    break;
                }

                // The superseding request is on its way
                match self.rx.recv().await {
                    Some(BuildMsg::Rebuild { changed: more }) => changed.extend(more),
                    _ => return,
                }
            }
        }
        debug!("build"; "stopped");
    }

    /// Merge every queued request into `changed`. `false` on shutdown.
    fn drain_into(&mut self, changed: &mut Vec<PathBuf>) -> bool {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BuildMsg::Rebuild { changed: more } => changed.extend(more),
                BuildMsg::Shutdown => return false,
            }
        }
        changed.sort();
        changed.dedup();
        true
    }

    async fn build(&mut self, changed: &[PathBuf]) -> Outcome {
        let generation = match self.staging.next() {
            Ok(generation) => generation,
            Err(err) => {
                self.fail("io", &err.to_string()).await;
                return Outcome::Failed;
            }
        };
        let output = generation.dir().to_path_buf();
        let assembler = Arc::clone(&self.assembler);
        let toolchain = Arc::clone(&self.toolchain);
        let cancel = Arc::clone(&self.cancel);

        let joined = tokio::task::spawn_blocking(move || -> Result<BuildResult, PipelineError> {
            let config = assembler.assemble_into(&output)?;
            Ok(BuildExecutor::new(&toolchain)
                .with_cancel(&cancel)
                .run(&config, |reports| {
                    for r in reports {
                        let files = plural_count(r.files, "file");
                        debug!("build"; "{}: {} in {}", r.stage, files, format_duration(r.duration));
                    }
                }))
        })
        .await;

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                let stage = if err.is_configuration() { "config" } else { "io" };
                self.fail(stage, &err.to_string()).await;
                return Outcome::Failed;
            }
            Err(err) => {
                self.fail("build", &format!("build task panicked: {err}")).await;
                return Outcome::Failed;
            }
        };

        if result.is_cancelled() {
            debug!("build"; "generation {} superseded", generation.id());
            status_warning("files changed during the build, restarting");
            return Outcome::Superseded;
        }

        if let Some(error) = result.first_error() {
            self.fail(error.stage.name(), &error.to_string()).await;
            return Outcome::Failed;
        }

        let id = generation.id();
        self.live.publish(generation);
        if std::mem::take(&mut self.failing) {
            let _ = self.ws_tx.send(WsMsg::Clear).await;
        }
        let _ = self
            .ws_tx
            .send(WsMsg::Reload {
                reason: describe(changed),
            })
            .await;

        debug!("build"; "generation {} live", id);
        status_success(&format!(
            "built {} in {}",
            plural_count(result.files_written(), "file"),
            format_duration(result.duration)
        ));
        Outcome::Published
    }

    async fn fail(&mut self, stage: &str, message: &str) {
        self.failing = true;
        if !self.live.is_ready() {
            log!("build"; "initial build failed, nothing to serve yet");
        }
        status_error(&format!("build failed in {stage}"), message);
        let _ = self
            .ws_tx
            .send(WsMsg::Error {
                stage: stage.to_string(),
                message: message.to_string(),
            })
            .await;
    }
}

/// Short reload reason: the first changed file and how many more.
fn describe(changed: &[PathBuf]) -> String {
    let Some(first) = changed.first() else {
        return "initial build".to_string();
    };
    let name = first
        .file_name()
        .map_or_else(|| first.display().to_string(), |n| n.to_string_lossy().into_owned());
    match changed.len() {
        1 => name,
        n => format!("{name} (+{} more)", n - 1),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::core::ModeProfile;
    use crate::pipeline::{BuildInputs, PipelineConfig};
    use crate::stages::testing::{BuiltinBundler, toolchain, write_site};
    use crate::stages::{BundleOutput, Bundler};

    struct Harness {
        build_tx: mpsc::Sender<BuildMsg>,
        ws_rx: mpsc::Receiver<WsMsg>,
        live: Arc<LiveOutput>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn(root: &Path) -> Harness {
        let (build_tx, build_rx) = mpsc::channel(8);
        let (ws_tx, ws_rx) = mpsc::channel(8);
        let inputs = BuildInputs::for_tests(root);
        let staging = Staging::for_output(&inputs.output).unwrap();
        let assembler = PipelineAssembler::new(inputs, ModeProfile::development(false));
        let live = Arc::new(LiveOutput::new());

        let actor = BuildActor::new(
            build_rx,
            ws_tx,
            Arc::new(assembler),
            Arc::new(toolchain()),
            Arc::new(staging),
            Arc::clone(&live),
            Arc::new(AtomicBool::new(false)),
        );
        Harness {
            build_tx,
            ws_rx,
            live,
            handle: tokio::spawn(actor.run()),
        }
    }

    async fn next(rx: &mut mpsc::Receiver<WsMsg>) -> WsMsg {
        tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[]), "initial build");
        assert_eq!(describe(&[PathBuf::from("/site/index.js")]), "index.js");
        assert_eq!(
            describe(&[PathBuf::from("/site/a.js"), PathBuf::from("/site/b.css")]),
            "a.js (+1 more)"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_initial_build_is_published() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let mut h = spawn(dir.path());

        assert!(matches!(next(&mut h.ws_rx).await, WsMsg::Reload { .. }));
        let generation = h.live.current().unwrap();
        assert!(generation.dir().join("index.html").is_file());
        assert!(generation.dir().starts_with(dir.path().join(".pagesmith")));
        // The configured output is never written in watch mode
        assert!(!dir.path().join("dist").exists());

        h.build_tx.send(BuildMsg::Shutdown).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let mut h = spawn(dir.path());
        assert!(matches!(next(&mut h.ws_rx).await, WsMsg::Reload { .. }));
        let first = h.live.current().unwrap().id();

        let entry = dir.path().join("index.js");
        fs::write(&entry, "const = ;").unwrap();
        h.build_tx
            .send(BuildMsg::Rebuild {
                changed: vec![entry.clone()],
            })
            .await
            .unwrap();

        match next(&mut h.ws_rx).await {
            WsMsg::Error { stage, message } => {
                assert_eq!(stage, "transform-modules");
                assert!(message.contains("index.js"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(h.live.current().unwrap().id(), first);

        // Fixing the file clears the overlay, then reloads
        fs::write(&entry, "console.log('fixed');").unwrap();
        h.build_tx
            .send(BuildMsg::Rebuild {
                changed: vec![entry],
            })
            .await
            .unwrap();
        assert!(matches!(next(&mut h.ws_rx).await, WsMsg::Clear));
        match next(&mut h.ws_rx).await {
            WsMsg::Reload { reason } => assert_eq!(reason, "index.js"),
            other => panic!("expected reload, got {other:?}"),
        }
        assert!(h.live.current().unwrap().id() > first);

        h.build_tx.send(BuildMsg::Shutdown).await.unwrap();
        h.handle.await.unwrap();
    }

    /// Bundles normally, except that on its `nth` call it behaves like an
    /// edit landing mid-build: raises the cancel flag and queues `change`.
    struct EditDuringBuild {
        nth: usize,
        calls: std::sync::atomic::AtomicUsize,
        cancel: Arc<AtomicBool>,
        tx: mpsc::Sender<BuildMsg>,
        change: PathBuf,
    }

    impl Bundler for EditDuringBuild {
        fn bundle(&self, config: &PipelineConfig) -> anyhow::Result<BundleOutput> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.nth {
                self.cancel.store(true, Ordering::Release);
                self.tx
                    .blocking_send(BuildMsg::Rebuild {
                        changed: vec![self.change.clone()],
                    })
                    .unwrap();
            }
            BuiltinBundler.bundle(config)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_superseded_build_is_discarded_and_changes_carry_over() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let (build_tx, build_rx) = mpsc::channel(8);
        let (ws_tx, mut ws_rx) = mpsc::channel(8);
        let cancel = Arc::new(AtomicBool::new(false));
        let inputs = BuildInputs::for_tests(dir.path());
        let staging = Staging::for_output(&inputs.output).unwrap();
        let live = Arc::new(LiveOutput::new());

        // Call 0 is the initial build, call 1 the first rebuild
        let bundler = EditDuringBuild {
            nth: 1,
            calls: Default::default(),
            cancel: Arc::clone(&cancel),
            tx: build_tx.clone(),
            change: dir.path().join("b.css"),
        };
        let actor = BuildActor::new(
            build_rx,
            ws_tx,
            Arc::new(PipelineAssembler::new(inputs, ModeProfile::development(false))),
            Arc::new(toolchain().with_bundler(bundler)),
            Arc::new(staging),
            Arc::clone(&live),
            Arc::clone(&cancel),
        );
        let handle = tokio::spawn(actor.run());

        match next(&mut ws_rx).await {
            WsMsg::Reload { reason } => assert_eq!(reason, "initial build"),
            other => panic!("expected reload, got {other:?}"),
        }

        build_tx
            .send(BuildMsg::Rebuild {
                changed: vec![dir.path().join("a.js")],
            })
            .await
            .unwrap();

        // One reload for the union; the superseded build sends nothing
        match next(&mut ws_rx).await {
            WsMsg::Reload { reason } => assert_eq!(reason, "a.js (+1 more)"),
            other => panic!("expected reload, got {other:?}"),
        }
        let current = live.current().unwrap();
        assert_eq!(current.id(), 3);
        assert!(!dir.path().join(".pagesmith/gen-2").exists());
        assert!(!cancel.load(Ordering::Acquire));

        build_tx.send(BuildMsg::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_queued_requests_merge() {
        let dir = tempfile::tempdir().unwrap();
        let (build_tx, build_rx) = mpsc::channel(8);
        let (ws_tx, _ws_rx) = mpsc::channel(8);
        let inputs = BuildInputs::for_tests(dir.path());
        let staging = Staging::for_output(&inputs.output).unwrap();
        let mut actor = BuildActor::new(
            build_rx,
            ws_tx,
            Arc::new(PipelineAssembler::new(inputs, ModeProfile::development(false))),
            Arc::new(toolchain()),
            Arc::new(staging),
            Arc::new(LiveOutput::new()),
            Arc::new(AtomicBool::new(false)),
        );

        for name in ["b.js", "a.js", "b.js"] {
            build_tx
                .send(BuildMsg::Rebuild {
                    changed: vec![dir.path().join(name)],
                })
                .await
                .unwrap();
        }
        let mut changed = vec![dir.path().join("c.css")];
        assert!(actor.drain_into(&mut changed));
        assert_eq!(
            changed,
            ["a.js", "b.js", "c.css"].map(|n| dir.path().join(n))
        );

        build_tx.send(BuildMsg::Shutdown).await.unwrap();
        assert!(!actor.drain_into(&mut changed));
    }
}
