//! Stage implementations.
//!
//! Each stage reads the resolved [`PipelineConfig`] and writes into its output
//! directory; none of them sees another stage's state. The executor calls
//! [`run_stage`] for each active stage in order.
//!
//! | Stage                    | Module            |
//! |--------------------------|-------------------|
//! | `copy-static-assets`     | `copy`            |
//! | `optimize-images`        | `images`          |
//! | `inject-generated-files` | `inject`          |
//! | `transform-modules`      | `bundle`, `shell` |
//! | `generate-icons`         | `icons`           |
//! | `prerender-routes`       | `prerender`       |
//! | `generate-service-worker`| `service_worker`  |

mod bundle;
mod copy;
mod icons;
mod images;
mod inject;
mod minify;
mod prerender;
mod service_worker;
mod shell;
mod toolchain;

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

pub use toolchain::{
    BundleOutput, Bundler, IconFile, IconGenerator, IconKind, ImageOptimizer, Prerenderer,
    RenderRequest, Toolchain,
};

use crate::pipeline::{PipelineConfig, StageKind};

/// Run one stage. Returns the number of files it wrote.
pub fn run_stage(kind: StageKind, config: &PipelineConfig, toolchain: &Toolchain) -> Result<usize> {
    match kind {
        StageKind::CopyStaticAssets => copy::run(config),
        StageKind::OptimizeImages => images::run(config, toolchain.images.as_ref()),
        StageKind::InjectGeneratedFiles => inject::run(config),
        StageKind::TransformModules => bundle::run(config, toolchain.bundler.as_ref()),
        StageKind::GenerateIcons => icons::run(config, toolchain.icons.as_ref()),
        StageKind::PrerenderRoutes => prerender::run(config, toolchain.prerenderer.as_ref()),
        StageKind::GenerateServiceWorker => service_worker::run(config),
    }
}

/// Write `data` through a sibling temp file and rename it into place.
///
/// Readers (the dev server, a prerender server) never see a half-written
/// file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let tmp = parent.join(format!(".{name}.tmp"));
    let mut file =
        fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    file.write_all(data)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    drop(file);
    fs::rename(&tmp, path).with_context(|| format!("failed to write {}", path.display()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(!dir.path().join("a/b/.c.txt.tmp").exists());
    }
}
