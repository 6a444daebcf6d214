//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! entry = ["index.js", "styles.css"]   # Entry points (relative to site root)
//! output = "dist"                      # Output directory
//! static = "static"                    # Copied into the output root
//! public_path = "/"                    # URL prefix of emitted bundles
//! template = "shell.html"              # HTML shell (default: built-in)
//! module = '\.js$'                     # Files handled by the app module loader
//! watch = ["src", "static"]            # Watched in `serve` (default: site root)
//!
//! # External tools (optional, built-in implementations otherwise)
//! bundler = ["esbuild", "--bundle"]
//! prerender = ["chromium", "--headless", "--dump-dom", "{url}"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Placeholder substituted with the page URL in the prerender command.
pub const URL_PLACEHOLDER: &str = "{url}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Module entry points.
    pub entry: Vec<PathBuf>,

    /// Build output directory.
    pub output: PathBuf,

    /// Static files directory.
    #[serde(rename = "static")]
    pub static_dir: PathBuf,

    /// URL prefix for bundle references in the HTML shell.
    pub public_path: String,

    /// Custom HTML shell template.
    pub template: Option<PathBuf>,

    /// Regex selecting files handled by the app module loader.
    pub module: String,

    /// Directories watched by the dev server.
    pub watch: Vec<PathBuf>,

    /// External bundler command (argv).
    pub bundler: Option<Vec<String>>,

    /// External prerender command (argv, `{url}` is substituted).
    pub prerender: Option<Vec<String>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry: vec!["index.js".into()],
            output: "dist".into(),
            static_dir: "static".into(),
            public_path: "/".to_string(),
            template: None,
            module: r"\.js$".to_string(),
            watch: Vec::new(),
            bundler: None,
            prerender: None,
        }
    }
}

impl BuildConfig {
    /// Resolve paths against the project root.
    ///
    /// `static_dir` stays project-relative: the static copy maps paths by
    /// their project-relative form.
    pub(crate) fn normalize(&mut self, root: &Path) {
        use crate::utils::path::{expand_tilde, normalize_path};

        let resolve = |p: &Path| normalize_path(&root.join(expand_tilde(p)));
        self.entry = self.entry.iter().map(|p| resolve(p)).collect();
        self.output = resolve(&self.output);
        self.template = self.template.take().map(|p| resolve(&p));
        self.watch = self.watch.iter().map(|p| resolve(p)).collect();
    }

    pub fn validate(&self, root: &Path, diag: &mut ConfigDiagnostics) {
        if self.entry.is_empty() {
            diag.error(FieldPath::new("build.entry"), "at least one entry point is required");
        }
        for entry in &self.entry {
            if !entry.is_file() {
                diag.error(
                    FieldPath::new("build.entry"),
                    format!("entry point `{}` not found", entry.display()),
                );
            }
        }

        let static_dir = root.join(&self.static_dir);
        let holds_sources = root.starts_with(&self.output)
            || static_dir.starts_with(&self.output)
            || self.entry.iter().any(|entry| entry.starts_with(&self.output))
            || self.template.as_ref().is_some_and(|t| t.starts_with(&self.output));
        if holds_sources {
            diag.error_with_hint(
                FieldPath::new("build.output"),
                format!(
                    "output directory `{}` would be emptied along with project sources",
                    self.output.display()
                ),
                "use a dedicated directory such as `dist`",
            );
        } else if self.output.starts_with(&static_dir) {
            diag.error(
                FieldPath::new("build.output"),
                "output directory must not be inside the static directory",
            );
        }

        if self.static_dir.is_absolute() {
            diag.error(
                FieldPath::new("build.static"),
                "static directory must be relative to the project root",
            );
        } else if !root.join(&self.static_dir).is_dir() {
            diag.warn(
                FieldPath::new("build.static"),
                format!("directory `{}` not found, nothing to copy", self.static_dir.display()),
            );
        }

        if !(self.public_path.starts_with('/') && self.public_path.ends_with('/')) {
            diag.error_with_hint(
                FieldPath::new("build.public_path"),
                format!("invalid public path `{}`", self.public_path),
                "public_path must start and end with `/`",
            );
        }

        if let Err(err) = regex::Regex::new(&self.module) {
            diag.error(FieldPath::new("build.module"), format!("invalid regex: {err}"));
        }

        if let Some(template) = &self.template
            && !template.is_file()
        {
            diag.error(
                FieldPath::new("build.template"),
                format!("template `{}` not found", template.display()),
            );
        }

        for dir in &self.watch {
            if !dir.exists() {
                diag.warn(
                    FieldPath::new("build.watch"),
                    format!("`{}` not found, not watched", dir.display()),
                );
            }
        }

        if matches!(&self.bundler, Some(argv) if argv.is_empty()) {
            diag.error(FieldPath::new("build.bundler"), "bundler command is empty");
        }

        match &self.prerender {
            Some(argv) if argv.is_empty() => {
                diag.error(FieldPath::new("build.prerender"), "prerender command is empty");
            }
            Some(argv) if !argv.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) => {
                diag.error_with_hint(
                    FieldPath::new("build.prerender"),
                    "prerender command never receives the page URL",
                    format!("add a `{URL_PLACEHOLDER}` argument"),
                );
            }
            _ => {}
        }
    }
}
