//! FileSystem Actor
//!
//! Watches the project and turns bursts of file events into one rebuild
//! request after a quiet window.
//!
//! ```text
//! Watcher → Debouncer (timing, dedup) → BuildMsg::Rebuild
//! ```
//!
//! Flushing a batch also raises the shared cancel flag, so a rebuild still
//! running for older changes stops at its next stage boundary.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::messages::BuildMsg;
use crate::utils::path::normalize_path;
use crate::{debug, log};

/// Quiet window before a batch of changes is flushed.
pub const DEBOUNCE_MS: u64 = 300;

/// Editor artifacts and hidden files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Paths that never trigger a rebuild: build output, dependencies and
/// anything inside a hidden directory below a watched root.
fn is_ignored(path: &Path, roots: &[PathBuf], ignore: &[PathBuf]) -> bool {
    if ignore.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name == "node_modules" || name.starts_with('.')
        }
        _ => false,
    })
}

pub struct FsActor {
    /// Sync → async bridge for notify
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Must stay alive while watching
    _watcher: RecommendedWatcher,
    build_tx: mpsc::Sender<BuildMsg>,
    cancel: Arc<AtomicBool>,
    debouncer: Debouncer,
}

impl FsActor {
    /// Start watching `paths` right away; events buffer until `run`.
    pub fn new(
        paths: &[PathBuf],
        ignore: Vec<PathBuf>,
        build_tx: mpsc::Sender<BuildMsg>,
        cancel: Arc<AtomicBool>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        for path in paths.iter().filter(|p| p.exists()) {
            watcher.watch(path, RecursiveMode::Recursive)?;
            debug!("watch"; "{}", path.display());
        }

        let roots = paths.iter().map(|p| normalize_path(p)).collect();
        let ignore = ignore.iter().map(|p| normalize_path(p)).collect();
        Ok(Self {
            notify_rx,
            _watcher: watcher,
            build_tx,
            cancel,
            debouncer: Debouncer::new(roots, ignore),
        })
    }

    pub async fn run(self) {
        let Self {
            notify_rx,
            _watcher,
            build_tx,
            cancel,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(changed) = debouncer.take_if_ready() else {
                        continue;
                    };
                    // Supersede whatever is building now
                    cancel.store(true, Ordering::Release);
                    if build_tx.send(BuildMsg::Rebuild { changed }).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

// =============================================================================
// Debouncer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Collects events until none arrived for `DEBOUNCE_MS`.
struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    roots: Vec<PathBuf>,
    ignore: Vec<PathBuf>,
}

impl Debouncer {
    fn new(roots: Vec<PathBuf>, ignore: Vec<PathBuf>) -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            roots,
            ignore,
        }
    }

    /// Record an event. Per path:
    /// - removed, then created or modified: restored, keep the new kind
    /// - modified, then removed: removed
    /// - created, then removed: nothing happened
    /// - otherwise the first kind wins
    fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            // mtime/chmod noise
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };

        for path in &event.paths {
            let path = normalize_path(path);
            if is_temp_file(&path) || is_ignored(&path, &self.roots, &self.ignore) {
                continue;
            }

            match self.changes.get(&path).copied() {
                None => {
                    debug!("watch"; "{}: {}", kind.label(), path.display());
                    self.changes.insert(path, kind);
                }
                Some(ChangeKind::Removed) if kind != ChangeKind::Removed => {
                    self.changes.insert(path, kind);
                }
                Some(ChangeKind::Modified) if kind == ChangeKind::Removed => {
                    self.changes.insert(path, ChangeKind::Removed);
                }
                Some(ChangeKind::Created) if kind == ChangeKind::Removed => {
                    self.changes.remove(&path);
                }
                Some(_) => {}
            }
            self.last_event = Some(Instant::now());
        }
    }

    fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|at| at.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Changed paths, sorted, once the window has passed.
    fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let mut changed: Vec<_> = std::mem::take(&mut self.changes).into_keys().collect();
        if changed.is_empty() {
            return None;
        }
        changed.sort();
        Some(changed)
    }

    fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(at) => Duration::from_millis(DEBOUNCE_MS)
                .saturating_sub(at.elapsed())
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(86400),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(paths: &[&str], kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    fn elapse(debouncer: &mut Debouncer) {
        debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS + 1));
    }

    #[test]
    fn test_burst_collapses_into_one_batch() {
        let mut debouncer = Debouncer::new(vec![], vec![]);
        debouncer.add_event(&event(&["/site/index.js"], modify()));
        debouncer.add_event(&event(&["/site/main.css"], modify()));
        debouncer.add_event(&event(&["/site/index.js"], modify()));

        // Still inside the quiet window
        assert!(debouncer.take_if_ready().is_none());

        elapse(&mut debouncer);
        let batch = debouncer.take_if_ready().unwrap();
        assert_eq!(
            batch,
            [PathBuf::from("/site/index.js"), PathBuf::from("/site/main.css")]
        );
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_ignored_paths_never_arm_the_timer() {
        let mut debouncer =
            Debouncer::new(vec![PathBuf::from("/site")], vec![PathBuf::from("/site/dist")]);
        debouncer.add_event(&event(&["/site/dist/index.js"], create()));
        debouncer.add_event(&event(&["/site/.pagesmith/gen-3/index.js"], create()));
        debouncer.add_event(&event(&["/site/node_modules/x/index.js"], modify()));
        debouncer.add_event(&event(&["/site/.index.js.swp"], modify()));
        debouncer.add_event(&event(&["/site/index.js~"], modify()));

        assert!(debouncer.last_event.is_none());
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_hidden_parent_of_root_is_fine() {
        let mut debouncer = Debouncer::new(vec![PathBuf::from("/home/me/.sites/blog")], vec![]);
        debouncer.add_event(&event(&["/home/me/.sites/blog/index.js"], modify()));
        debouncer.add_event(&event(&["/home/me/.sites/blog/.git/index"], modify()));
        assert_eq!(debouncer.changes.len(), 1);
    }

    #[test]
    fn test_metadata_changes_ignored() {
        let mut debouncer = Debouncer::new(vec![], vec![]);
        let kind = notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::Any,
        ));
        debouncer.add_event(&event(&["/site/index.js"], kind));
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_kind_transitions() {
        let mut debouncer = Debouncer::new(vec![], vec![]);
        let a = PathBuf::from("/site/a.js");
        let b = PathBuf::from("/site/b.js");
        let c = PathBuf::from("/site/c.js");

        debouncer.add_event(&event(&["/site/a.js"], remove()));
        debouncer.add_event(&event(&["/site/a.js"], create()));
        assert_eq!(debouncer.changes[&a], ChangeKind::Created);

        debouncer.add_event(&event(&["/site/b.js"], modify()));
        debouncer.add_event(&event(&["/site/b.js"], remove()));
        assert_eq!(debouncer.changes[&b], ChangeKind::Removed);

        debouncer.add_event(&event(&["/site/c.js"], create()));
        debouncer.add_event(&event(&["/site/c.js"], remove()));
        assert!(!debouncer.changes.contains_key(&c));
    }

    #[test]
    fn test_sleep_duration() {
        let mut debouncer = Debouncer::new(vec![], vec![]);
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));

        debouncer.last_event = Some(Instant::now());
        let wait = debouncer.sleep_duration();
        assert!(wait <= Duration::from_millis(DEBOUNCE_MS));
        assert!(wait >= Duration::from_millis(DEBOUNCE_MS - 50));
    }

    #[tokio::test]
    async fn test_flush_raises_cancel_flag() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = Arc::new(AtomicBool::new(false));
        let actor = FsActor::new(&[dir.path().to_path_buf()], vec![], tx, Arc::clone(&cancel)).unwrap();
        let handle = tokio::spawn(actor.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(dir.path().join("index.js"), "let a;").unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(msg, BuildMsg::Rebuild { ref changed } if !changed.is_empty()));
        assert!(cancel.load(Ordering::Acquire));
        handle.abort();
    }
}
