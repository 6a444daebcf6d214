//! `[pipeline]` section configuration.
//!
//! ```toml
//! [pipeline]
//! # Run a subset of the stages. Must follow the canonical order.
//! stages = ["copy-static-assets", "transform-modules", "prerender-routes"]
//! ```

use serde::{Deserialize, Serialize};

use crate::pipeline::StageKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Stage order override. `None` runs the canonical set.
    #[serde(skip_serializing)]
    pub stages: Option<Vec<StageKind>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_stage_override_parses() {
        let config = test_parse_config(
            "[pipeline]\nstages = [\"copy-static-assets\", \"transform-modules\"]",
        );
        assert_eq!(
            config.pipeline.stages,
            Some(vec![StageKind::CopyStaticAssets, StageKind::TransformModules])
        );
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let result = toml::from_str::<PipelineSection>("stages = [\"minify\"]");
        assert!(result.is_err());
    }
}
