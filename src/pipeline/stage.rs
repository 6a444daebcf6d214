//! Stage declarations.
//!
//! A stage is data: an ordering key, an activation predicate over the mode,
//! and a fragment builder. Stages never see each other; the assembler folds
//! their fragments and the executor runs the matching [`crate::stages`] code.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::fragment::{ConfigFragment, RuntimeCaching};
use super::inputs::BuildInputs;
use crate::core::ModeProfile;

// =============================================================================
// StageKind
// =============================================================================

/// The closed set of pipeline stages, declared in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    CopyStaticAssets,
    OptimizeImages,
    InjectGeneratedFiles,
    TransformModules,
    GenerateIcons,
    PrerenderRoutes,
    GenerateServiceWorker,
}

impl StageKind {
    /// All stages in canonical order.
    pub const ALL: [Self; 7] = [
        Self::CopyStaticAssets,
        Self::OptimizeImages,
        Self::InjectGeneratedFiles,
        Self::TransformModules,
        Self::GenerateIcons,
        Self::PrerenderRoutes,
        Self::GenerateServiceWorker,
    ];

    /// Ordering key. Lower runs first.
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::CopyStaticAssets => "copy-static-assets",
            Self::OptimizeImages => "optimize-images",
            Self::InjectGeneratedFiles => "inject-generated-files",
            Self::TransformModules => "transform-modules",
            Self::GenerateIcons => "generate-icons",
            Self::PrerenderRoutes => "prerender-routes",
            Self::GenerateServiceWorker => "generate-service-worker",
        }
    }

    /// Stages that consume the output of `TransformModules`.
    #[inline]
    pub const fn requires_bundle(self) -> bool {
        self.order() > Self::TransformModules.order()
    }

    /// Stages allowed to reset the output directory before writing.
    #[inline]
    pub const fn resets_output(self) -> bool {
        matches!(self, Self::CopyStaticAssets | Self::TransformModules)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown stage `{s}`"))
    }
}

// =============================================================================
// PipelineStage
// =============================================================================

/// Activation predicate over the build mode.
pub type ActivePredicate = fn(&ModeProfile) -> bool;

/// Fragment builder. Must be pure.
pub type FragmentBuilder = fn(&BuildInputs, &ModeProfile) -> ConfigFragment;

/// A declared stage.
#[derive(Clone, Copy)]
pub struct PipelineStage {
    kind: StageKind,
    active: ActivePredicate,
    fragment: FragmentBuilder,
}

impl PipelineStage {
    pub const fn new(kind: StageKind, active: ActivePredicate, fragment: FragmentBuilder) -> Self {
        Self {
            kind,
            active,
            fragment,
        }
    }

    #[inline]
    pub const fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn is_active(&self, profile: &ModeProfile) -> bool {
        (self.active)(profile)
    }

    pub fn fragment(&self, inputs: &BuildInputs, profile: &ModeProfile) -> ConfigFragment {
        (self.fragment)(inputs, profile)
    }
}

impl fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PipelineStage").field(&self.kind).finish()
    }
}

// =============================================================================
// Canonical declarations
// =============================================================================

/// Service worker precache include patterns.
pub const CACHE_INCLUDE: [&str; 4] = [
    r"^index\.html$",
    r"\.js$",
    r"content\.txt$",
    r"\.(?:png|gif|jpg|jpeg|svg)$",
];

/// Service worker precache exclude patterns.
pub const CACHE_EXCLUDE: [&str; 3] = [
    r"android-chrome-.*\.png$",
    r"apple-touch-icon.*\.png",
    r"favicon-.*\.png",
];

/// Images recompressed by `OptimizeImages`. ASCII case folding only.
pub const IMAGE_TEST: &str = r"(?i-u)\.(jpe?g|png|gif|svg)$";

/// Document event the prerenderer waits for.
pub const RENDER_AFTER_EVENT: &str = "prerender-trigger";

fn always(_: &ModeProfile) -> bool {
    true
}

fn production_only(profile: &ModeProfile) -> bool {
    profile.is_production()
}

fn copy_static(inputs: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        static_dir: Some(inputs.static_dir.clone()),
        ..ConfigFragment::default()
    }
}

fn optimize_images(_: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        image_test: Some(IMAGE_TEST.to_string()),
        jpeg_quality: Some(75),
        ..ConfigFragment::default()
    }
}

fn inject_generated(_: &BuildInputs, profile: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        generated_files: profile.file_contents().to_vec(),
        ..ConfigFragment::default()
    }
}

fn transform_modules(inputs: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        output_path: Some(inputs.output.clone()),
        public_path: Some(inputs.public_path.clone()),
        ..ConfigFragment::default()
    }
}

fn generate_icons(inputs: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        icon_source: inputs.manifest.source_icon.clone(),
        ..ConfigFragment::default()
    }
}

fn prerender_routes(inputs: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        routes: inputs.routes.to_vec(),
        render_after_event: Some(RENDER_AFTER_EVENT.to_string()),
        ..ConfigFragment::default()
    }
}

fn generate_service_worker(_: &BuildInputs, _: &ModeProfile) -> ConfigFragment {
    ConfigFragment {
        cache_include: CACHE_INCLUDE.iter().map(|p| p.to_string()).collect(),
        cache_exclude: CACHE_EXCLUDE.iter().map(|p| p.to_string()).collect(),
        runtime_caching: RuntimeCaching::defaults(),
        sw_dest: Some("service-worker.js".to_string()),
        navigate_fallback: Some("index.html".to_string()),
        ..ConfigFragment::default()
    }
}

/// The canonical stage table, in order.
pub fn canonical() -> [PipelineStage; 7] {
    [
        PipelineStage::new(StageKind::CopyStaticAssets, always, copy_static),
        PipelineStage::new(StageKind::OptimizeImages, production_only, optimize_images),
        PipelineStage::new(
            StageKind::InjectGeneratedFiles,
            production_only,
            inject_generated,
        ),
        PipelineStage::new(StageKind::TransformModules, always, transform_modules),
        PipelineStage::new(StageKind::GenerateIcons, always, generate_icons),
        PipelineStage::new(StageKind::PrerenderRoutes, always, prerender_routes),
        PipelineStage::new(
            StageKind::GenerateServiceWorker,
            always,
            generate_service_worker,
        ),
    ]
}
