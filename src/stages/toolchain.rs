//! External collaborators behind traits.
//!
//! The pipeline only sequences and configures these; each has a built-in
//! implementation and most have a command-line alternative configured in
//! `[build]`.

use std::path::Path;

use anyhow::Result;

use super::bundle::{BuiltinBundler, CommandBundler};
use super::icons::BuiltinIconGenerator;
use super::images::BuiltinImageOptimizer;
use super::prerender::{CommandPrerenderer, ShellPrerenderer};
use crate::config::{BuildConfig, ManifestConfig};
use crate::core::Route;
use crate::pipeline::{ImageSettings, PipelineConfig};

// ============================================================================
// traits
// ============================================================================

/// Files emitted by a bundler, as URLs relative to the public path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOutput {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    /// Files written into the output directory.
    pub files: usize,
}

/// Transforms entry points into output bundles.
pub trait Bundler: Send + Sync {
    fn bundle(&self, config: &PipelineConfig) -> Result<BundleOutput>;
}

/// Recompresses a single image.
pub trait ImageOptimizer: Send + Sync {
    /// Re-encoded bytes, or `None` when the format is left untouched.
    ///
    /// The caller keeps the result only if it is smaller.
    fn optimize(&self, path: &Path, data: &[u8], settings: &ImageSettings)
    -> Result<Option<Vec<u8>>>;
}

/// Purpose of a generated icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    /// Listed in `manifest.json`.
    AndroidChrome,
    /// `<link rel="apple-touch-icon">`, flattened onto the background.
    AppleTouch,
    /// `<link rel="icon">`.
    Favicon,
    /// Multi-size `favicon.ico`.
    FaviconIco,
}

/// One rendered icon file.
#[derive(Debug, Clone)]
pub struct IconFile {
    /// File name in the output root.
    pub name: String,
    pub size: u32,
    pub kind: IconKind,
    pub data: Vec<u8>,
}

/// Derives the icon set from the manifest's source icon.
pub trait IconGenerator: Send + Sync {
    fn generate(&self, source: &Path, manifest: &ManifestConfig) -> Result<Vec<IconFile>>;
}

/// What a prerenderer gets for one route.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    pub route: &'a Route,
    /// Page URL on the temporary server, when the renderer asked for one.
    pub url: Option<String>,
    /// The built HTML shell.
    pub shell: &'a str,
    /// Document event signalling that the page finished rendering.
    pub render_after_event: &'a str,
}

/// Produces the HTML snapshot of a route.
pub trait Prerenderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String>;

    /// Serve the output tree over HTTP while rendering.
    fn needs_server(&self) -> bool {
        false
    }
}

// ============================================================================
// Toolchain
// ============================================================================

/// The set of collaborators a build runs with.
pub struct Toolchain {
    pub(crate) bundler: Box<dyn Bundler>,
    pub(crate) images: Box<dyn ImageOptimizer>,
    pub(crate) icons: Box<dyn IconGenerator>,
    pub(crate) prerenderer: Box<dyn Prerenderer>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Toolchain {
    /// Pure-Rust implementations of every collaborator.
    pub fn builtin() -> Self {
        Self {
            bundler: Box::new(BuiltinBundler),
            images: Box::new(BuiltinImageOptimizer),
            icons: Box::new(BuiltinIconGenerator),
            prerenderer: Box::new(ShellPrerenderer),
        }
    }

    /// Built-ins, replaced by the external commands `[build]` configures.
    pub fn from_config(build: &BuildConfig) -> Self {
        let mut toolchain = Self::builtin();
        if let Some(argv) = &build.bundler {
            toolchain = toolchain.with_bundler(CommandBundler::new(argv.clone()));
        }
        if let Some(argv) = &build.prerender {
            toolchain = toolchain.with_prerenderer(CommandPrerenderer::new(argv.clone()));
        }
        toolchain
    }

    pub fn with_bundler(mut self, bundler: impl Bundler + 'static) -> Self {
        self.bundler = Box::new(bundler);
        self
    }

    pub fn with_prerenderer(mut self, prerenderer: impl Prerenderer + 'static) -> Self {
        self.prerenderer = Box::new(prerenderer);
        self
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("server_rendering", &self.prerenderer.needs_server())
            .finish_non_exhaustive()
    }
}
