//! Per-invocation build inputs and the base configuration they imply.

use std::path::PathBuf;
use std::sync::Arc;

use super::fragment::{ConfigFragment, Loader, TransformRule};
use super::stage::StageKind;
use crate::config::{ManifestConfig, SiteConfig};
use crate::core::Route;

/// Read-only inputs shared by the base configuration and every stage.
#[derive(Debug, Clone)]
pub struct BuildInputs {
    /// Project root. Static paths are mapped relative to it.
    pub root: PathBuf,
    pub routes: Arc<[Route]>,
    pub manifest: Arc<ManifestConfig>,
    /// Absolute entry points.
    pub entries: Vec<PathBuf>,
    /// Absolute output directory.
    pub output: PathBuf,
    /// Static directory, relative to `root`.
    pub static_dir: PathBuf,
    pub public_path: String,
    /// Custom HTML shell, built-in template otherwise.
    pub template: Option<PathBuf>,
    /// Regex selecting files handled by the app module loader.
    pub module_test: String,
    /// Caller-supplied stage order.
    pub stage_order: Option<Vec<StageKind>>,
}

impl BuildInputs {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            root: config.root.clone(),
            routes: config.routes.clone().into(),
            manifest: Arc::new(config.manifest.clone()),
            entries: config.build.entry.clone(),
            output: config.build.output.clone(),
            static_dir: config.build.static_dir.clone(),
            public_path: config.build.public_path.clone(),
            template: config.build.template.clone(),
            module_test: config.build.module.clone(),
            stage_order: config.pipeline.stages.clone(),
        }
    }

    /// Same inputs, different output root.
    pub fn with_output(&self, output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..self.clone()
        }
    }

    /// The common base every mode and stage builds on.
    ///
    /// Flags default to off so that an unset mode never enables anything.
    pub fn base_fragment(&self) -> ConfigFragment {
        ConfigFragment {
            output_path: Some(self.output.clone()),
            public_path: Some(self.public_path.clone()),
            minify: Some(false),
            watch: Some(false),
            hot_reload: Some(false),
            debug: Some(false),
            transform_rules: base_rules(),
            ..ConfigFragment::default()
        }
    }

    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            root: root.to_path_buf(),
            routes: vec![Route::root()].into(),
            manifest: Arc::new(ManifestConfig {
                name: "Test Site".to_string(),
                source_icon: Some(root.join("icon.png")),
                ..ManifestConfig::default()
            }),
            entries: vec![root.join("index.js")],
            output: root.join("dist"),
            static_dir: PathBuf::from("static"),
            public_path: "/".to_string(),
            template: None,
            module_test: r"\.js$".to_string(),
            stage_order: None,
        }
    }
}

/// Module-transform rules shared by both modes.
fn base_rules() -> Vec<TransformRule> {
    vec![
        TransformRule::new(r"\.js$", vec![Loader::Script]).exclude(["node_modules"]),
        TransformRule::new(r"\.css$", vec![Loader::Style]),
        TransformRule::new(r"\.(ttf|eot|woff2?|svg)$", vec![Loader::Asset]),
        TransformRule::new(r"\.(png|jpe?g|gif|ico|webp|html)$", vec![Loader::Asset]),
    ]
}
