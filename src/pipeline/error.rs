//! Pipeline error kinds.
//!
//! The executor/controller is the single place deciding whether an error is
//! fatal: every variant here is reported, never swallowed by a stage.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::StageKind;

/// Errors raised while assembling or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or conflicting configuration, detected before any stage runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stage failed while running.
    #[error(transparent)]
    StageExecution(#[from] StageError),

    /// Filesystem or network hiccup. Never retried automatically.
    #[error("{context}: {source}")]
    TransientIo {
        context: String,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransientIo {
            context: context.into(),
            source,
        }
    }

    #[inline]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Stage-attributable error record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct StageError {
    pub stage: StageKind,
    pub message: String,
    /// File the diagnostic points at, when known.
    pub path: Option<PathBuf>,
    /// The run was superseded before this stage started.
    pub cancelled: bool,
}

impl StageError {
    pub fn new(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            path: None,
            cancelled: false,
        }
    }

    /// Record for a stage that never started because the run was cancelled.
    pub fn cancelled(stage: StageKind) -> Self {
        Self {
            cancelled: true,
            ..Self::new(stage, "cancelled")
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Wrap an arbitrary error, keeping its full context chain.
    ///
    /// A `StageError` raised inside the stage is passed through unchanged.
    pub fn from_error(stage: StageKind, error: anyhow::Error) -> Self {
        match error.downcast::<StageError>() {
            Ok(inner) => inner,
            Err(error) => Self::new(stage, format!("{error:#}")),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.stage)?;
        if let Some(path) = &self.path {
            write!(f, "{}: ", path.display())?;
        }
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new(StageKind::TransformModules, "unexpected token").at("index.js");
        assert_eq!(
            err.to_string(),
            "[transform-modules] index.js: unexpected token"
        );
    }

    #[test]
    fn test_from_error_keeps_path() {
        let inner: anyhow::Error = StageError::new(StageKind::GenerateIcons, "bad image")
            .at("icon.png")
            .into();
        let err = StageError::from_error(StageKind::GenerateIcons, inner);
        assert_eq!(err.path.as_deref(), Some(std::path::Path::new("icon.png")));

        let chained = anyhow::anyhow!("disk full").context("writing manifest.json");
        let err = StageError::from_error(StageKind::GenerateIcons, chained);
        assert_eq!(err.message, "writing manifest.json: disk full");
        assert!(!err.cancelled);
    }

    #[test]
    fn test_cancelled_record() {
        let err = StageError::cancelled(StageKind::PrerenderRoutes);
        assert!(err.cancelled);
        assert_eq!(err.to_string(), "[prerender-routes] cancelled");
    }

    #[test]
    fn test_configuration_error_display() {
        let err = PipelineError::config("stage order violated");
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "configuration error: stage order violated");
    }

    #[test]
    fn test_stage_error_converts() {
        let err: PipelineError = StageError::new(StageKind::PrerenderRoutes, "boom").into();
        assert!(matches!(err, PipelineError::StageExecution(_)));
        assert!(!err.is_configuration());
    }
}
