//! Site configuration management for `pagesmith.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── manifest   # [manifest]
//! │   ├── pipeline   # [pipeline]
//! │   └── serve      # [serve]
//! ├── types/         # ConfigError, diagnostics, field paths
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! Top-level keys carry the per-invocation inputs:
//!
//! ```toml
//! routes = ["/", "/about"]
//!
//! [[files]]
//! path = "content.txt"
//! content = "hello"
//! ```

pub mod section;
pub mod types;
mod util;

use util::{find_config_file, read_generated_dir};

pub use section::{
    BuildConfig, DisplayMode, ManifestConfig, Orientation, PipelineSection, ServeConfig,
    URL_PLACEHOLDER,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{
    cli::{Cli, Commands},
    core::{GeneratedFile, Route, dedup_routes},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing pagesmith.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Page routes to prerender
    #[serde(default = "default_routes")]
    pub routes: Vec<Route>,

    /// Generated files injected verbatim in production
    #[serde(default)]
    pub files: Vec<GeneratedFile>,

    /// Web-app manifest metadata
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Stage order override
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

fn default_routes() -> Vec<Route> {
    vec![Route::root()]
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            routes: default_routes(),
            files: Vec::new(),
            manifest: ManifestConfig::default(),
            build: BuildConfig::default(),
            pipeline: PipelineSection::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project root is
    /// the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = find_config_file(&cli.config, &cwd)
            .ok_or_else(|| ConfigError::NotFound(cli.config.clone()))?;

        let mut config = Self::from_path(&config_path)?;
        config.config_path = crate::utils::path::normalize_path(&config_path);
        config.finalize(cli)?;
        config.validate()?;
        Ok(config)
    }

    /// Finalize configuration after loading.
    fn finalize(&mut self, cli: &Cli) -> Result<()> {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.root = crate::utils::path::normalize_path(&root);

        if let Some(output) = &cli.output {
            self.build.output = output.clone();
        }
        self.apply_command_options(cli)?;

        let root = self.root.clone();
        self.build.normalize(&root);
        self.manifest.normalize(&root);
        self.routes = dedup_routes(std::mem::take(&mut self.routes));
        Ok(())
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) -> Result<()> {
        match &cli.command {
            Commands::Build { generated } => {
                if let Some(dir) = generated {
                    let dir = crate::utils::path::resolve_path(dir, &self.root);
                    let files = read_generated_dir(&dir)
                        .with_context(|| format!("failed to read {}", dir.display()))?;
                    self.files.extend(files);
                }
            }
            Commands::Serve {
                interface, port, ..
            } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
        }
        Ok(())
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Generated files as owned values, in declaration order.
    pub fn generated_files(&self) -> Vec<GeneratedFile> {
        self.files.clone()
    }

    /// Directories the dev server watches.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        if self.build.watch.is_empty() {
            vec![self.root.clone()]
        } else {
            self.build.watch.iter().filter(|p| p.exists()).cloned().collect()
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.manifest.validate(&mut diag);
        self.build.validate(&self.root, &mut diag);
        self.serve.validate(&mut diag);
        self.validate_files(&mut diag);

        diag.print_warnings();
        diag.into_result()
            .map_err(|e| ConfigError::Invalid(e).into())
    }

    /// Every `[[files]]` entry must stay inside the output tree, once.
    fn validate_files(&self, diag: &mut ConfigDiagnostics) {
        let mut seen = rustc_hash::FxHashSet::default();
        for file in &self.files {
            if file.destination(&self.build.output).is_none() {
                diag.error(
                    FieldPath::new("files.path"),
                    format!("`{}` must be a relative path inside the output", file.path),
                );
            } else if !seen.insert(file.path.trim_start_matches("./")) {
                diag.error(
                    FieldPath::new("files.path"),
                    format!("`{}` is declared twice", file.path),
                );
            }
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse a config snippet.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
