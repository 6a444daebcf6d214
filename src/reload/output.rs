//! Generation directories and the tree the dev server currently serves.
//!
//! Every dev rebuild writes a fresh directory under `<output>/../.pagesmith/`.
//! A successful one is published with a single pointer swap; readers holding
//! the previous generation keep reading it until they drop their handle.
//! The directory of a generation is removed when its last handle goes away,
//! so failed and superseded builds clean up after themselves.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;

use crate::debug;
use crate::pipeline::PipelineError;

/// Name of the staging directory next to the configured output.
pub const STAGING_DIR: &str = ".pagesmith";

/// One dev build's output tree.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    dir: PathBuf,
}

impl Generation {
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("reload"; "removed generation {}", self.id),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => debug!("reload"; "failed to remove {}: {}", self.dir.display(), err),
        }
    }
}

/// Hands out generation directories under one staging root.
#[derive(Debug)]
pub struct Staging {
    root: PathBuf,
    next: AtomicU64,
}

impl Staging {
    /// Staging area for builds configured to write to `output`.
    ///
    /// Leftovers from an earlier session are removed.
    pub fn for_output(output: &Path) -> Result<Self, PipelineError> {
        let parent = output.parent().unwrap_or(output);
        let root = parent.join(STAGING_DIR);
        if root.exists() {
            fs::remove_dir_all(&root)
                .map_err(|err| PipelineError::io(format!("failed to clear {}", root.display()), err))?;
        }
        fs::create_dir_all(&root)
            .map_err(|err| PipelineError::io(format!("failed to create {}", root.display()), err))?;
        Ok(Self {
            root,
            next: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve the next generation and create its directory.
    pub fn next(&self) -> Result<Generation, PipelineError> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let dir = self.root.join(format!("gen-{id}"));
        fs::create_dir_all(&dir)
            .map_err(|err| PipelineError::io(format!("failed to create {}", dir.display()), err))?;
        Ok(Generation { id, dir })
    }
}

/// The generation the dev server answers requests from.
#[derive(Debug, Default)]
pub struct LiveOutput {
    current: ArcSwapOption<Generation>,
}

impl LiveOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first successful build.
    pub fn current(&self) -> Option<Arc<Generation>> {
        self.current.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Make `generation` visible to every new request at once.
    pub fn publish(&self, generation: Generation) {
        debug!("reload"; "publishing generation {}", generation.id);
        self.current.store(Some(Arc::new(generation)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_lives_next_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(".pagesmith/gen-9");
        fs::create_dir_all(&stale).unwrap();

        let staging = Staging::for_output(&dir.path().join("dist")).unwrap();
        assert_eq!(staging.root(), dir.path().join(".pagesmith"));
        assert!(!stale.exists());

        let first = staging.next().unwrap();
        let second = staging.next().unwrap();
        assert_eq!(first.id() + 1, second.id());
        assert_ne!(first.dir(), second.dir());
    }

    #[test]
    fn test_dropped_generation_removes_its_tree() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::for_output(&dir.path().join("dist")).unwrap();
        let generation = staging.next().unwrap();
        fs::write(generation.dir().join("index.html"), "x").unwrap();

        let path = generation.dir().to_path_buf();
        drop(generation);
        assert!(!path.exists());
    }

    #[test]
    fn test_publish_keeps_old_tree_for_readers() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::for_output(&dir.path().join("dist")).unwrap();
        let live = LiveOutput::new();
        assert!(!live.is_ready());

        let first = staging.next().unwrap();
        live.publish(first);
        let reader = live.current().unwrap();

        let second = staging.next().unwrap();
        live.publish(second);

        // The in-flight reader still sees its tree
        assert!(reader.dir().exists());
        assert_eq!(live.current().unwrap().id(), reader.id() + 1);

        let old = reader.dir().to_path_buf();
        drop(reader);
        assert!(!old.exists());
    }

    #[test]
    fn test_unwritable_staging_is_transient_io() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::for_output(&dir.path().join("dist")).unwrap();
        fs::remove_dir_all(staging.root()).unwrap();
        fs::write(staging.root(), "not a directory").unwrap();

        let err = staging.next().unwrap_err();
        assert!(matches!(err, PipelineError::TransientIo { .. }));
        assert!(err.to_string().contains("gen-1"));
    }
}
