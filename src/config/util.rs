//! Configuration utility functions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::GeneratedFile;

/// Find config file by searching upward from `start`
///
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/site/src/pages/     ← start
/// /home/user/site/pagesmith.toml ← found!
/// ```
pub fn find_config_file(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.exists())
}

/// Read every file under `dir` as a generated file keyed by its relative path.
///
/// Paths use `/` separators and are sorted for a stable injection order.
pub fn read_generated_dir(dir: &Path) -> Result<Vec<GeneratedFile>> {
    let mut files = Vec::new();
    for entry in jwalk::WalkDir::new(dir).sort(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(dir)
            .with_context(|| format!("{} escapes {}", path.display(), dir.display()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("generated file {} is not UTF-8 text", path.display()))?;
        files.push(GeneratedFile::new(key, content));
    }
    Ok(files)
}

// ============================================================================
// tests
// ============================================================================
