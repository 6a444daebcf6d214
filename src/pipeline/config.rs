//! The fully resolved, read-only pipeline configuration.
//!
//! Built once per build by [`super::PipelineAssembler`]. There are no setters:
//! a changed input means assembling a new one.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use super::error::PipelineError;
use super::fragment::{Fold, Loader, RuntimeCaching, TransformRule};
use super::inputs::BuildInputs;
use super::stage::StageKind;
use crate::config::ManifestConfig;
use crate::core::{GeneratedFile, ModeKind, Route};

/// Mode-controlled switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFlags {
    pub minify: bool,
    pub watch: bool,
    pub hot_reload: bool,
    pub debug: bool,
}

/// A transform rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: TransformRule,
    test: Regex,
}

impl CompiledRule {
    fn compile(rule: TransformRule) -> Result<Self, PipelineError> {
        let test = compile_pattern("transform rule", &rule.test)?;
        Ok(Self { rule, test })
    }

    pub fn rule(&self) -> &TransformRule {
        &self.rule
    }

    /// Whether `path` is handled by this rule.
    pub fn matches(&self, path: &Path) -> bool {
        let excluded = path.components().any(|c| match c {
            Component::Normal(part) => self.rule.exclude.iter().any(|dir| part == dir.as_str()),
            _ => false,
        });
        !excluded && self.test.is_match(&path.to_string_lossy())
    }
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub test: Regex,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone)]
pub struct PrerenderSettings {
    pub routes: Vec<Route>,
    pub render_after_event: String,
}

#[derive(Debug, Clone)]
pub struct ServiceWorkerSettings {
    pub dest: String,
    pub navigate_fallback: String,
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
    pub runtime_caching: Vec<RuntimeCaching>,
}

impl ServiceWorkerSettings {
    /// Precache filter over an output-relative path with `/` separators.
    pub fn should_cache(&self, relative: &str) -> bool {
        relative != self.dest
            && self.include.iter().any(|re| re.is_match(relative))
            && !self.exclude.iter().any(|re| re.is_match(relative))
    }
}

/// Resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    mode: ModeKind,
    root: PathBuf,
    entries: Vec<PathBuf>,
    stages: Vec<StageKind>,
    output: PathBuf,
    public_path: String,
    template: Option<PathBuf>,
    rules: Vec<CompiledRule>,
    flags: BuildFlags,
    static_dir: Option<PathBuf>,
    images: Option<ImageSettings>,
    generated_files: Vec<GeneratedFile>,
    manifest: Arc<ManifestConfig>,
    icon_source: Option<PathBuf>,
    prerender: Option<PrerenderSettings>,
    service_worker: Option<ServiceWorkerSettings>,
}

impl PipelineConfig {
    /// Turn a finished fold into a configuration.
    ///
    /// Fails on unset required fields, invalid patterns and a missing icon
    /// source, all before any stage runs.
    pub(super) fn resolve(
        inputs: &BuildInputs,
        mode: ModeKind,
        stages: Vec<StageKind>,
        mut fold: Fold,
    ) -> Result<Self, PipelineError> {
        let has = |kind: StageKind| stages.contains(&kind);
        let include = fold.take_cache_include();
        let exclude = fold.take_cache_exclude();

        let output = fold
            .output_path
            .into_value()
            .ok_or_else(|| PipelineError::config("no output path configured"))?;

        check_output(inputs, &output)?;

        let flags = BuildFlags {
            minify: fold.minify.into_value().unwrap_or(false),
            watch: fold.watch.into_value().unwrap_or(false),
            hot_reload: fold.hot_reload.into_value().unwrap_or(false),
            debug: fold.debug.into_value().unwrap_or(false),
        };

        let rules = std::mem::take(&mut fold.transform_rules)
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        if has(StageKind::TransformModules) && inputs.entries.is_empty() {
            return Err(PipelineError::config("no entry points to transform"));
        }

        let images = match (fold.image_test.into_value(), fold.jpeg_quality.into_value()) {
            (Some(test), quality) => Some(ImageSettings {
                test: compile_pattern("image filter", &test)?,
                jpeg_quality: quality.unwrap_or(75).clamp(1, 100),
            }),
            (None, _) => None,
        };

        let icon_source = fold.icon_source.into_value();
        if has(StageKind::GenerateIcons) {
            match &icon_source {
                None => {
                    return Err(PipelineError::config(
                        "manifest.source_icon is required to generate icons",
                    ));
                }
                Some(path) if !path.is_file() => {
                    return Err(PipelineError::config(format!(
                        "source icon `{}` does not exist",
                        path.display()
                    )));
                }
                Some(_) => {}
            }
        }

        let prerender = fold
            .render_after_event
            .into_value()
            .map(|render_after_event| PrerenderSettings {
                routes: std::mem::take(&mut fold.routes),
                render_after_event,
            });

        let service_worker = match (fold.sw_dest.into_value(), fold.navigate_fallback.into_value())
        {
            (Some(dest), navigate_fallback) => Some(ServiceWorkerSettings {
                dest,
                navigate_fallback: navigate_fallback.unwrap_or_else(|| "index.html".to_string()),
                include: compile_patterns("cache include", &include)?,
                exclude: compile_patterns("cache exclude", &exclude)?,
                runtime_caching: std::mem::take(&mut fold.runtime_caching),
            }),
            (None, _) => None,
        };

        Ok(Self {
            mode,
            root: inputs.root.clone(),
            entries: inputs.entries.clone(),
            stages,
            output,
            public_path: fold.public_path.into_value().unwrap_or_else(|| "/".to_string()),
            template: inputs.template.clone(),
            rules,
            flags,
            static_dir: fold.static_dir.into_value(),
            images,
            generated_files: fold.generated_files,
            manifest: Arc::clone(&inputs.manifest),
            icon_source,
            prerender,
            service_worker,
        })
    }

    // ========================================================================
    // accessors
    // ========================================================================

    pub const fn mode(&self) -> ModeKind {
        self.mode
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Active stages in execution order.
    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    pub const fn flags(&self) -> BuildFlags {
        self.flags
    }

    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }

    pub fn images(&self) -> Option<&ImageSettings> {
        self.images.as_ref()
    }

    pub fn generated_files(&self) -> &[GeneratedFile] {
        &self.generated_files
    }

    pub fn manifest(&self) -> &ManifestConfig {
        &self.manifest
    }

    pub fn icon_source(&self) -> Option<&Path> {
        self.icon_source.as_deref()
    }

    pub fn prerender(&self) -> Option<&PrerenderSettings> {
        self.prerender.as_ref()
    }

    pub fn service_worker(&self) -> Option<&ServiceWorkerSettings> {
        self.service_worker.as_ref()
    }

    /// Register the service worker from the HTML shell.
    pub fn registers_service_worker(&self) -> bool {
        self.mode == ModeKind::Production && self.service_worker.is_some()
    }

    /// Loader chain for a file: loaders of every matching rule, in rule order.
    pub fn loaders_for(&self, path: &Path) -> Vec<Loader> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .flat_map(|rule| rule.rule().loaders.iter().cloned())
            .collect()
    }

    /// Entries whose app loader asks to be watched even outside watch dirs.
    pub fn force_watched(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|entry| {
                self.loaders_for(entry)
                    .iter()
                    .any(|l| matches!(l, Loader::App { force_watch: true, .. }))
            })
            .cloned()
            .collect()
    }
}

/// The output is emptied by the first resetting stage, so it must not hold
/// any project source nor live inside the static directory.
fn check_output(inputs: &BuildInputs, output: &Path) -> Result<(), PipelineError> {
    let static_dir = inputs.root.join(&inputs.static_dir);
    let sources = [
        Some(inputs.root.as_path()),
        Some(static_dir.as_path()),
        inputs.template.as_deref(),
        inputs.manifest.source_icon.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(inputs.entries.iter().map(PathBuf::as_path));

    for source in sources {
        if source.starts_with(output) {
            return Err(PipelineError::config(format!(
                "output directory `{}` contains `{}`",
                output.display(),
                source.display()
            )));
        }
    }
    if output.starts_with(&static_dir) {
        return Err(PipelineError::config(format!(
            "output directory `{}` is inside the static directory",
            output.display()
        )));
    }
    Ok(())
}

fn compile_pattern(what: &str, pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern)
        .map_err(|err| PipelineError::config(format!("invalid {what} pattern `{pattern}`: {err}")))
}

fn compile_patterns(what: &str, patterns: &[String]) -> Result<Vec<Regex>, PipelineError> {
    patterns.iter().map(|p| compile_pattern(what, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(test: &str) -> CompiledRule {
        CompiledRule::compile(TransformRule::new(test, vec![Loader::Script]).exclude(["node_modules"]))
            .unwrap()
    }

    #[test]
    fn test_rule_exclude_by_component() {
        let rule = rule(r"\.js$");
        assert!(rule.matches(Path::new("/site/src/index.js")));
        assert!(!rule.matches(Path::new("/site/node_modules/lib/index.js")));
        assert!(!rule.matches(Path::new("/site/src/style.css")));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = CompiledRule::compile(TransformRule::new("(", vec![])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_output_must_not_hold_sources() {
        use crate::core::ModeProfile;
        use crate::pipeline::PipelineAssembler;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let outputs = [
            root.to_path_buf(),
            root.parent().unwrap().to_path_buf(),
            root.join("static"),
            root.join("static/dist"),
        ];
        for output in outputs {
            let inputs = BuildInputs::for_tests(root).with_output(&output);
            let err = PipelineAssembler::new(inputs, ModeProfile::development(false))
                .assemble()
                .unwrap_err();
            assert!(
                matches!(err, PipelineError::Configuration(_)),
                "{} accepted",
                output.display()
            );
        }

        let mut inputs = BuildInputs::for_tests(root);
        inputs.entries = vec![root.join("src/main.js")];
        let inputs = inputs.with_output(&root.join("src"));
        let err = PipelineAssembler::new(inputs, ModeProfile::development(false))
            .assemble()
            .unwrap_err();
        assert!(err.to_string().contains("main.js"));
    }

    #[test]
    fn test_service_worker_filter() {
        let settings = ServiceWorkerSettings {
            dest: "service-worker.js".to_string(),
            navigate_fallback: "index.html".to_string(),
            include: compile_patterns(
                "include",
                &super::super::stage::CACHE_INCLUDE.map(String::from),
            )
            .unwrap(),
            exclude: compile_patterns(
                "exclude",
                &super::super::stage::CACHE_EXCLUDE.map(String::from),
            )
            .unwrap(),
            runtime_caching: Vec::new(),
        };

        assert!(settings.should_cache("index.html"));
        assert!(settings.should_cache("main.js"));
        assert!(settings.should_cache("content.txt"));
        assert!(settings.should_cache("img/logo.png"));
        assert!(!settings.should_cache("about/index.html"));
        assert!(!settings.should_cache("android-chrome-192x192.png"));
        assert!(!settings.should_cache("apple-touch-icon.png"));
        assert!(!settings.should_cache("favicon-32x32.png"));
        assert!(!settings.should_cache("service-worker.js"));
        assert!(!settings.should_cache("main.css"));
    }
}
