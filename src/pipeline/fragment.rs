//! Configuration fragments and the conflict-detecting fold.
//!
//! Every contributor (base inputs, mode profile, each active stage) produces a
//! [`ConfigFragment`]. [`Fold`] merges them:
//!
//! - Scalars: a base value may be overwritten; two non-base contributors with
//!   different values are a configuration error. Equal values are accepted.
//! - Lists: appended, except ordering-sensitive ones (cache patterns), which
//!   are re-sorted by the contributing stage's ordering key.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::error::PipelineError;
use super::stage::StageKind;
use crate::core::{GeneratedFile, ModeKind, Route};

// =============================================================================
// Fragment payload types
// =============================================================================

/// One step of a module transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loader {
    /// Plain script: syntax-checked and passed through.
    Script,
    /// Stylesheet.
    Style,
    /// Copied as a file asset.
    Asset,
    /// Hot-reload client prepended to the module.
    Hot,
    /// The application module loader.
    App {
        optimize: bool,
        debug: bool,
        force_watch: bool,
    },
}

/// A module-transform rule: files matching `test` (and no `exclude` entry)
/// run through `loaders` in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRule {
    pub test: String,
    pub exclude: Vec<String>,
    pub loaders: Vec<Loader>,
}

impl TransformRule {
    pub fn new(test: impl Into<String>, loaders: Vec<Loader>) -> Self {
        Self {
            test: test.into(),
            exclude: Vec::new(),
            loaders,
        }
    }

    pub fn exclude<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(dirs.into_iter().map(Into::into));
        self
    }
}

/// Service worker runtime caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheHandler {
    CacheFirst,
    StaleWhileRevalidate,
}

/// A runtime caching route of the generated service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCaching {
    pub url_pattern: String,
    pub handler: CacheHandler,
    pub cache_name: String,
}

impl RuntimeCaching {
    fn new(url_pattern: &str, handler: CacheHandler, cache_name: &str) -> Self {
        Self {
            url_pattern: url_pattern.to_string(),
            handler,
            cache_name: cache_name.to_string(),
        }
    }

    /// Font and image policies shipped with every service worker.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                r"^https://fonts\.gstatic\.com",
                CacheHandler::CacheFirst,
                "google-fonts-webfonts",
            ),
            Self::new(
                r"^https://fonts\.googleapis\.com",
                CacheHandler::StaleWhileRevalidate,
                "google-fonts-stylesheets",
            ),
            Self::new(
                r"\.(?:png|gif|jpg|jpeg|svg)$",
                CacheHandler::CacheFirst,
                "images",
            ),
        ]
    }
}

// =============================================================================
// ConfigFragment
// =============================================================================

/// Partial configuration contributed by one origin.
#[derive(Debug, Clone, Default)]
pub struct ConfigFragment {
    pub output_path: Option<PathBuf>,
    pub public_path: Option<String>,
    pub minify: Option<bool>,
    pub watch: Option<bool>,
    pub hot_reload: Option<bool>,
    pub debug: Option<bool>,
    pub static_dir: Option<PathBuf>,
    pub image_test: Option<String>,
    pub jpeg_quality: Option<u8>,
    pub icon_source: Option<PathBuf>,
    pub render_after_event: Option<String>,
    pub sw_dest: Option<String>,
    pub navigate_fallback: Option<String>,

    pub transform_rules: Vec<TransformRule>,
    pub generated_files: Vec<GeneratedFile>,
    pub routes: Vec<Route>,
    pub cache_include: Vec<String>,
    pub cache_exclude: Vec<String>,
    pub runtime_caching: Vec<RuntimeCaching>,
}

// =============================================================================
// Fold
// =============================================================================

/// Who contributed a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Base,
    Mode(ModeKind),
    Stage(StageKind),
}

impl Origin {
    /// Sort key for ordering-sensitive lists. Base and mode come first.
    fn sort_key(self) -> u16 {
        match self {
            Self::Base => 0,
            Self::Mode(_) => 1,
            Self::Stage(kind) => 2 + kind.order() as u16,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base configuration"),
            Self::Mode(kind) => write!(f, "{kind} mode"),
            Self::Stage(kind) => write!(f, "stage `{kind}`"),
        }
    }
}

/// A scalar value tagged with who set it.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    value: Option<(T, Origin)>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: PartialEq + fmt::Debug> Slot<T> {
    fn set(&mut self, field: &str, value: T, origin: Origin) -> Result<(), PipelineError> {
        match &self.value {
            Some((current, previous)) if *previous != Origin::Base => {
                if *current != value {
                    return Err(PipelineError::config(format!(
                        "conflicting values for `{field}`: {previous} sets {current:?}, {origin} sets {value:?}"
                    )));
                }
            }
            _ => self.value = Some((value, origin)),
        }
        Ok(())
    }

    pub fn into_value(self) -> Option<T> {
        self.value.map(|(value, _)| value)
    }
}

/// List entries tagged with their origin.
type Tagged<T> = Vec<(T, Origin)>;

/// Accumulator for [`ConfigFragment`]s.
#[derive(Debug, Default)]
pub struct Fold {
    pub output_path: Slot<PathBuf>,
    pub public_path: Slot<String>,
    pub minify: Slot<bool>,
    pub watch: Slot<bool>,
    pub hot_reload: Slot<bool>,
    pub debug: Slot<bool>,
    pub static_dir: Slot<PathBuf>,
    pub image_test: Slot<String>,
    pub jpeg_quality: Slot<u8>,
    pub icon_source: Slot<PathBuf>,
    pub render_after_event: Slot<String>,
    pub sw_dest: Slot<String>,
    pub navigate_fallback: Slot<String>,

    pub transform_rules: Vec<TransformRule>,
    pub generated_files: Vec<GeneratedFile>,
    pub routes: Vec<Route>,
    cache_include: Tagged<String>,
    cache_exclude: Tagged<String>,
    pub runtime_caching: Vec<RuntimeCaching>,
}

macro_rules! fold_scalars {
    ($self:ident, $fragment:ident, $origin:ident; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $fragment.$field {
                $self.$field.set(stringify!($field), value, $origin)?;
            }
        )+
    };
}

impl Fold {
    /// Merge one fragment into the accumulator.
    pub fn apply(&mut self, fragment: ConfigFragment, origin: Origin) -> Result<(), PipelineError> {
        fold_scalars!(self, fragment, origin;
            output_path,
            public_path,
            minify,
            watch,
            hot_reload,
            debug,
            static_dir,
            image_test,
            jpeg_quality,
            icon_source,
            render_after_event,
            sw_dest,
            navigate_fallback,
        );

        self.transform_rules.extend(fragment.transform_rules);
        self.generated_files.extend(fragment.generated_files);
        self.routes.extend(fragment.routes);
        self.runtime_caching.extend(fragment.runtime_caching);
        self.cache_include
            .extend(fragment.cache_include.into_iter().map(|p| (p, origin)));
        self.cache_exclude
            .extend(fragment.cache_exclude.into_iter().map(|p| (p, origin)));
        Ok(())
    }

    /// Cache include patterns in registry order.
    pub fn take_cache_include(&mut self) -> Vec<String> {
        registry_order(std::mem::take(&mut self.cache_include))
    }

    /// Cache exclude patterns in registry order.
    pub fn take_cache_exclude(&mut self) -> Vec<String> {
        registry_order(std::mem::take(&mut self.cache_exclude))
    }
}

/// Stable sort by contributing stage; first occurrence of a pattern wins.
fn registry_order(mut tagged: Tagged<String>) -> Vec<String> {
    tagged.sort_by_key(|(_, origin)| origin.sort_key());
    let mut seen = rustc_hash::FxHashSet::default();
    tagged
        .into_iter()
        .filter_map(|(pattern, _)| seen.insert(pattern.clone()).then_some(pattern))
        .collect()
}
