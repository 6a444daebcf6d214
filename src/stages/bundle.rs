//! `transform-modules`: run the bundler, then write the HTML shell.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};

use super::shell::{self, public_url};
use super::{BundleOutput, Bundler, minify, write_atomic};
use crate::embed::build::{DEBUG_PRELUDE_JS, HOT_PRELUDE_JS};
use crate::pipeline::{BuildFlags, Loader, PipelineConfig, StageError, StageKind};
use crate::utils::exec::Cmd;
use crate::{debug, log};

pub fn run(config: &PipelineConfig, bundler: &dyn Bundler) -> Result<usize> {
    let bundle = bundler.bundle(config)?;
    debug!("bundle"; "scripts: {:?}, styles: {:?}", bundle.scripts, bundle.styles);

    let html = shell::render(config, &bundle)?;
    write_atomic(&shell::shell_path(config), html.as_bytes())?;
    Ok(bundle.files + 1)
}

// ============================================================================
// built-in bundler
// ============================================================================

/// What an entry becomes, decided by its loader chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Script,
    Style,
    Asset,
}

impl Emit {
    fn of(loaders: &[Loader]) -> Self {
        if loaders.contains(&Loader::Style) {
            Self::Style
        } else if loaders
            .iter()
            .any(|l| matches!(l, Loader::Script | Loader::Hot | Loader::App { .. }))
        {
            Self::Script
        } else {
            Self::Asset
        }
    }
}

/// Transforms each entry on its own: no module resolution, no splitting.
///
/// Each entry is written to the output root under its file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinBundler;

impl Bundler for BuiltinBundler {
    fn bundle(&self, config: &PipelineConfig) -> Result<BundleOutput> {
        let mut output = BundleOutput::default();
        let mut names = FxHashSet::default();

        for entry in config.entries() {
            let loaders = config.loaders_for(entry);
            if loaders.is_empty() {
                return Err(stage_error("no transform rule matches this entry", entry).into());
            }
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| stage_error("entry has no file name", entry))?;
            if !names.insert(name.clone()) {
                return Err(stage_error(format!("another entry is also named `{name}`"), entry).into());
            }

            let emit = Emit::of(&loaders);
            let dest = config.output().join(&name);
            match emit {
                Emit::Asset => {
                    fs::copy(entry, &dest)
                        .with_context(|| format!("failed to copy {}", entry.display()))?;
                }
                Emit::Script | Emit::Style => {
                    let source = fs::read_to_string(entry)
                        .with_context(|| format!("failed to read {}", entry.display()))?;
                    let code = transform(emit, &source, &loaders, config.flags())
                        .map_err(|err| stage_error(format!("{err:#}"), entry))?;
                    write_atomic(&dest, code.as_bytes())?;
                }
            }

            let url = public_url(config.public_path(), &name);
            match emit {
                Emit::Script => output.scripts.push(url),
                Emit::Style => output.styles.push(url),
                Emit::Asset => {}
            }
            output.files += 1;
        }
        Ok(output)
    }
}

fn transform(emit: Emit, source: &str, loaders: &[Loader], flags: BuildFlags) -> Result<String> {
    if emit == Emit::Style {
        return minify::process_css(source, flags.minify);
    }

    minify::check_js(source)?;

    let mut code = String::new();
    for loader in loaders {
        match loader {
            Loader::Hot => code.push_str(HOT_PRELUDE_JS),
            Loader::App { debug: true, .. } => code.push_str(DEBUG_PRELUDE_JS),
            _ => {}
        }
    }
    code.push_str(source);

    // Scripts outside the app loader follow the minify flag alone
    let optimize = loaders.iter().all(|l| !matches!(l, Loader::App { .. }))
        || loaders
            .iter()
            .any(|l| matches!(l, Loader::App { optimize: true, .. }));
    if flags.minify && optimize {
        code = minify::minify_js(&code)?;
    }
    Ok(code)
}

fn stage_error(message: impl Into<String>, path: &Path) -> StageError {
    StageError::new(StageKind::TransformModules, message).at(path)
}

// ============================================================================
// external bundler
// ============================================================================

/// Runs a bundler command over the entries.
///
/// The command receives the entries as trailing arguments and must write into
/// `$PAGESMITH_OUTPUT`. Top-level `.js` and `.css` files it creates or
/// rewrites are linked from the shell.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    argv: Vec<String>,
}

impl CommandBundler {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self, config: &PipelineConfig) -> Result<BundleOutput> {
        let output = config.output();
        fs::create_dir_all(output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let before: FxHashMap<_, _> = top_level_modules(output).into_iter().collect();

        let flags = config.flags();
        let flag = |on: bool| if on { "1" } else { "0" };
        Cmd::from_slice(&self.argv)
            .args(config.entries())
            .cwd(config.root())
            .envs([
                ("PAGESMITH_MODE", config.mode().label().to_string()),
                ("PAGESMITH_OUTPUT", output.display().to_string()),
                ("PAGESMITH_PUBLIC_PATH", config.public_path().to_string()),
                ("PAGESMITH_MINIFY", flag(flags.minify).to_string()),
                ("PAGESMITH_WATCH", flag(flags.watch).to_string()),
                ("PAGESMITH_HOT", flag(flags.hot_reload).to_string()),
                ("PAGESMITH_DEBUG", flag(flags.debug).to_string()),
            ])
            .run()?;

        let mut bundle = BundleOutput::default();
        for (name, modified) in top_level_modules(output) {
            if before.get(&name) == Some(&modified) {
                continue;
            }
            let url = public_url(config.public_path(), &name);
            if name.ends_with(".css") {
                bundle.styles.push(url);
            } else {
                bundle.scripts.push(url);
            }
            bundle.files += 1;
        }
        if bundle.files == 0 {
            log!("bundle"; "`{}` wrote no .js or .css files", self.argv.join(" "));
        }
        Ok(bundle)
    }
}

/// `.js`/`.css` files directly under `dir`, sorted by name, with mtimes.
fn top_level_modules(dir: &Path) -> Vec<(String, Option<SystemTime>)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let is_module = name.ends_with(".js") || name.ends_with(".css");
            is_module.then(|| (name, e.metadata().and_then(|m| m.modified()).ok()))
        })
        .collect();
    files.sort();
    files
}
