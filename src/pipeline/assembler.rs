//! Pipeline assembly: base → mode → stages, folded into one config.

use std::path::Path;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::fragment::{Fold, Origin};
use super::inputs::BuildInputs;
use super::registry::StageRegistry;
use super::stage::PipelineStage;
use crate::core::ModeProfile;

/// Deterministic merge of registry stages and a mode profile.
///
/// Holds no mutable state: every `assemble*` call builds a fresh config.
#[derive(Debug, Clone)]
pub struct PipelineAssembler {
    inputs: BuildInputs,
    profile: ModeProfile,
    registry: StageRegistry,
}

impl PipelineAssembler {
    pub fn new(inputs: BuildInputs, profile: ModeProfile) -> Self {
        let registry = match &inputs.stage_order {
            Some(order) => StageRegistry::with_order(order.clone()),
            None => StageRegistry::new(),
        };
        Self {
            inputs,
            profile,
            registry,
        }
    }

    pub fn inputs(&self) -> &BuildInputs {
        &self.inputs
    }

    /// Resolve the pipeline for the configured output directory.
    pub fn assemble(&self) -> Result<PipelineConfig, PipelineError> {
        let stages = self.registry.ordered_stages(&self.profile)?;
        fold_pipeline(&self.inputs, &self.profile, stages)
    }

    /// Resolve the same pipeline writing to `output` instead.
    ///
    /// Used by the dev server to build each generation off to the side.
    pub fn assemble_into(&self, output: &Path) -> Result<PipelineConfig, PipelineError> {
        let stages = self.registry.ordered_stages(&self.profile)?;
        fold_pipeline(&self.inputs.with_output(output), &self.profile, stages)
    }
}

/// `stages` come from the registry, already validated and in order.
fn fold_pipeline(
    inputs: &BuildInputs,
    profile: &ModeProfile,
    stages: Vec<PipelineStage>,
) -> Result<PipelineConfig, PipelineError> {
    let mut fold = Fold::default();
    fold.apply(inputs.base_fragment(), Origin::Base)?;
    fold.apply(profile.apply_to(inputs), Origin::Mode(profile.kind()))?;
    for stage in &stages {
        fold.apply(
            stage.fragment(inputs, profile),
            Origin::Stage(stage.kind()),
        )?;
    }

    let kinds = stages.iter().map(PipelineStage::kind).collect();
    PipelineConfig::resolve(inputs, profile.kind(), kinds, fold)
}
