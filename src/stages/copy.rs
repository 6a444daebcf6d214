//! `copy-static-assets`: mirror the static directory into the output root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;

use crate::debug;
use crate::pipeline::PipelineConfig;

pub fn run(config: &PipelineConfig) -> Result<usize> {
    let Some(static_dir) = config.static_dir() else {
        return Ok(0);
    };
    let source = config.root().join(static_dir);
    if !source.is_dir() {
        debug!("copy"; "no static directory at {}", source.display());
        return Ok(0);
    }

    let files = static_files(config.root(), &source);
    let output = config.output();

    files.par_iter().try_for_each(|relative| {
        let Some(stripped) = strip_first_segment(relative) else {
            return Ok(());
        };
        let from = config.root().join(relative);
        let to = output.join(stripped);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(&from, &to)
            .map(|_| ())
            .with_context(|| format!("failed to copy {}", from.display()))
    })?;

    Ok(files.len())
}

/// Project-relative paths of every file under `dir`, sorted.
fn static_files(root: &Path, dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Drop exactly the first segment of a project-relative path.
///
/// `static/img/logo.png` → `img/logo.png`. A nested static directory keeps
/// its remaining segments: `assets/static/a.txt` → `static/a.txt`.
pub fn strip_first_segment(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let rest = components.as_path();
    (!rest.as_os_str().is_empty()).then(|| rest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModeProfile;
    use crate::pipeline::{BuildInputs, PipelineAssembler};
    use crate::stages::testing::write_site;

    #[test]
    fn test_strip_first_segment() {
        assert_eq!(
            strip_first_segment(Path::new("static/img/logo.png")),
            Some(PathBuf::from("img/logo.png"))
        );
        assert_eq!(
            strip_first_segment(Path::new("static/robots.txt")),
            Some(PathBuf::from("robots.txt"))
        );
        assert_eq!(
            strip_first_segment(Path::new("assets/static/a.txt")),
            Some(PathBuf::from("static/a.txt"))
        );
        assert_eq!(strip_first_segment(Path::new("lonely.txt")), None);
    }

    #[test]
    fn test_copy_maps_into_output_root() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        let config = PipelineAssembler::new(
            BuildInputs::for_tests(dir.path()),
            ModeProfile::development(false),
        )
        .assemble()
        .unwrap();

        let copied = run(&config).unwrap();
        assert_eq!(copied, 2);
        assert!(config.output().join("robots.txt").is_file());
        assert!(config.output().join("img/logo.png").is_file());
        assert!(!config.output().join("static").exists());
    }

    #[test]
    fn test_missing_static_dir_copies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("icon.png"), b"png").unwrap();
        let config = PipelineAssembler::new(
            BuildInputs::for_tests(dir.path()),
            ModeProfile::development(false),
        )
        .assemble()
        .unwrap();
        assert_eq!(config.static_dir(), Some(Path::new("static")));
        assert_eq!(run(&config).unwrap(), 0);
    }
}
