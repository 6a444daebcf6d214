//! `generate-service-worker`: precache the finished output tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use jwalk::WalkDir;
use serde::Serialize;

use super::shell::public_url;
use super::write_atomic;
use crate::embed::build::{SERVICE_WORKER_JS, ServiceWorkerVars};
use crate::log;
use crate::pipeline::{PipelineConfig, ServiceWorkerSettings};
use crate::utils::fmt::plural_count;
use crate::utils::hash;
use crate::utils::path::relative_key;

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct PrecacheEntry {
    url: String,
    revision: String,
}

pub fn run(config: &PipelineConfig) -> Result<usize> {
    let Some(sw) = config.service_worker() else {
        return Ok(0);
    };

    let entries = precache_entries(config, sw)?;
    let precache = serde_json::to_string(&entries)?;
    let runtime = serde_json::to_string(&sw.runtime_caching)?;
    let cache_id = cache_id(&config.manifest().name, &precache);

    let js = SERVICE_WORKER_JS.render(&ServiceWorkerVars {
        cache_id: &cache_id,
        precache: &precache,
        runtime: &runtime,
        navigate_fallback: &public_url(config.public_path(), &sw.navigate_fallback),
    });
    write_atomic(&config.output().join(&sw.dest), js.as_bytes())?;

    log!("sw"; "precaching {}", plural_count(entries.len(), "file"));
    Ok(1)
}

fn precache_entries(config: &PipelineConfig, sw: &ServiceWorkerSettings) -> Result<Vec<PrecacheEntry>> {
    let output = config.output();
    let files: Vec<(String, PathBuf)> = WalkDir::new(output)
        .sort(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let key = relative_key(&path, output)?;
            sw.should_cache(&key).then_some((key, path))
        })
        .collect();

    let mut entries = files
        .into_iter()
        .map(|(key, path)| {
            let revision = hash::file_revision(&path)
                .with_context(|| format!("failed to hash {}", path.display()))?;
            Ok(PrecacheEntry {
                url: public_url(config.public_path(), &key),
                revision,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// `<site-slug>-<fingerprint of the precache list>`, so the cache rolls
/// over exactly when the output changes.
fn cache_id(name: &str, precache: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "site" } else { slug };
    format!("{slug}-{}", hash::fingerprint(precache))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::ModeProfile;
    use crate::pipeline::{BuildInputs, PipelineAssembler};

    fn production() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("icon.png"), b"png").unwrap();
        let config = PipelineAssembler::new(
            BuildInputs::for_tests(dir.path()),
            ModeProfile::production(vec![]),
        )
        .assemble()
        .unwrap();
        let out = config.output();
        fs::create_dir_all(out.join("img")).unwrap();
        fs::write(out.join("index.html"), "<html></html>").unwrap();
        fs::write(out.join("index.js"), "let a;").unwrap();
        fs::write(out.join("img/logo.png"), "png").unwrap();
        (dir, config)
    }

    #[test]
    fn test_cache_id() {
        assert!(cache_id("Test Site", "[]").starts_with("test-site-"));
        assert!(cache_id("!!!", "[]").starts_with("site-"));
        assert_ne!(cache_id("a", "[1]"), cache_id("a", "[2]"));
    }

    #[test]
    fn test_precache_is_sorted_and_skips_itself() {
        let (_dir, config) = production();
        let sw = config.service_worker().unwrap();
        fs::write(config.output().join(&sw.dest), "old").unwrap();

        let entries = precache_entries(&config, sw).unwrap();
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert!(urls.contains(&"/index.html"));
        assert!(urls.contains(&"/index.js"));
        assert!(!urls.iter().any(|u| u.ends_with(sw.dest.as_str())));
        assert!(urls.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_run_writes_worker() {
        let (_dir, config) = production();
        assert_eq!(run(&config).unwrap(), 1);

        let sw = config.service_worker().unwrap();
        let js = fs::read_to_string(config.output().join(&sw.dest)).unwrap();
        assert!(js.contains("\"url\":\"/index.js\""));
        assert!(js.contains("google-fonts-webfonts"));
        assert!(js.contains("const FALLBACK = '/index.html';"));
        assert!(!js.contains("__PRECACHE__"));

        // Same output, same worker
        let again = {
            run(&config).unwrap();
            fs::read_to_string(config.output().join(&sw.dest)).unwrap()
        };
        assert_eq!(js, again);
    }

    #[test]
    fn test_disabled_stage_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("icon.png"), b"png").unwrap();
        let mut inputs = BuildInputs::for_tests(dir.path());
        inputs.stage_order = Some(vec![crate::pipeline::StageKind::TransformModules]);
        let config = PipelineAssembler::new(inputs, ModeProfile::development(false))
            .assemble()
            .unwrap();
        assert!(config.service_worker().is_none());
        assert_eq!(run(&config).unwrap(), 0);
    }
}
