//! Stage registry: the canonical stage set and its ordering rules.

use super::error::PipelineError;
use super::stage::{PipelineStage, StageKind, canonical};
use crate::core::ModeProfile;

/// Canonical stages, optionally narrowed by a caller-supplied order.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    order: Option<Vec<StageKind>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the pipeline to `order`.
    ///
    /// The override is checked in [`Self::ordered_stages`], so an invalid
    /// order surfaces as a configuration error at assembly time.
    pub fn with_order(order: Vec<StageKind>) -> Self {
        Self { order: Some(order) }
    }

    /// Active stages for `profile`, in canonical order.
    pub fn ordered_stages(&self, profile: &ModeProfile) -> Result<Vec<PipelineStage>, PipelineError> {
        let selected: Vec<PipelineStage> = match &self.order {
            None => canonical().to_vec(),
            Some(order) => {
                validate_order(order)?;
                let table = canonical();
                order
                    .iter()
                    .filter_map(|kind| table.iter().find(|s| s.kind() == *kind).copied())
                    .collect()
            }
        };

        Ok(selected
            .into_iter()
            .filter(|stage| stage.is_active(profile))
            .collect())
    }
}

/// An override must be a subsequence of the canonical order, and stages that
/// consume the bundle cannot run without `TransformModules`.
fn validate_order(order: &[StageKind]) -> Result<(), PipelineError> {
    for pair in order.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev == next {
            return Err(PipelineError::config(format!(
                "stage `{next}` listed twice in [pipeline] stages"
            )));
        }
        if prev.order() > next.order() {
            return Err(PipelineError::config(format!(
                "stage `{next}` must run before `{prev}`"
            )));
        }
    }

    // Non-adjacent duplicates are caught as reorders above.
    if !order.contains(&StageKind::TransformModules)
        && let Some(dependent) = order.iter().find(|kind| kind.requires_bundle())
    {
        return Err(PipelineError::config(format!(
            "stage `{dependent}` requires `{}`",
            StageKind::TransformModules
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(stages: &[PipelineStage]) -> Vec<StageKind> {
        stages.iter().map(PipelineStage::kind).collect()
    }

    #[test]
    fn test_production_runs_everything() {
        let stages = StageRegistry::new()
            .ordered_stages(&ModeProfile::production(vec![]))
            .unwrap();
        assert_eq!(kinds(&stages), StageKind::ALL);
    }

    #[test]
    fn test_development_skips_production_stages() {
        let stages = StageRegistry::new()
            .ordered_stages(&ModeProfile::development(false))
            .unwrap();
        assert_eq!(
            kinds(&stages),
            [
                StageKind::CopyStaticAssets,
                StageKind::TransformModules,
                StageKind::GenerateIcons,
                StageKind::PrerenderRoutes,
                StageKind::GenerateServiceWorker,
            ]
        );
    }

    #[test]
    fn test_valid_subsequence() {
        let registry = StageRegistry::with_order(vec![
            StageKind::OptimizeImages,
            StageKind::TransformModules,
            StageKind::PrerenderRoutes,
        ]);
        let stages = registry
            .ordered_stages(&ModeProfile::development(false))
            .unwrap();
        // Mode predicates still apply to an override
        assert_eq!(
            kinds(&stages),
            [StageKind::TransformModules, StageKind::PrerenderRoutes]
        );
    }

    #[test]
    fn test_reorder_is_rejected() {
        let registry = StageRegistry::with_order(vec![
            StageKind::TransformModules,
            StageKind::GenerateServiceWorker,
            StageKind::PrerenderRoutes,
        ]);
        let err = registry
            .ordered_stages(&ModeProfile::production(vec![]))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("prerender-routes"));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        for order in [
            vec![StageKind::TransformModules, StageKind::TransformModules],
            vec![
                StageKind::CopyStaticAssets,
                StageKind::TransformModules,
                StageKind::CopyStaticAssets,
            ],
        ] {
            let err = StageRegistry::with_order(order)
                .ordered_stages(&ModeProfile::production(vec![]))
                .unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_dependent_stage_without_transform() {
        let err = StageRegistry::with_order(vec![
            StageKind::CopyStaticAssets,
            StageKind::PrerenderRoutes,
        ])
        .ordered_stages(&ModeProfile::production(vec![]))
        .unwrap_err();
        assert!(err.to_string().contains("requires `transform-modules`"));
    }
}
