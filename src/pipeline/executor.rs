//! Sequential stage execution.
//!
//! The executor owns no policy beyond ordering: it runs the stages of a
//! resolved [`PipelineConfig`] one after another, stops at the first failure
//! and reports what happened. Whether a failure is fatal is up to the caller.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::config::PipelineConfig;
use super::error::StageError;
use super::stage::StageKind;
use crate::debug;
use crate::stages::{self, Toolchain};

/// Outcome of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Failure,
}

/// Timing and output count of one finished stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageKind,
    /// Files written (or rewritten) by the stage.
    pub files: usize,
    pub duration: Duration,
}

/// Result of [`BuildExecutor::run`].
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub status: BuildStatus,
    /// Error records in stage order. Empty on success.
    pub errors: Vec<StageError>,
    /// Reports of the stages that completed.
    pub reports: Vec<StageReport>,
    pub duration: Duration,
}

impl BuildResult {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    /// The run stopped because its cancel flag was raised.
    pub fn is_cancelled(&self) -> bool {
        self.errors.iter().any(|e| e.cancelled)
    }

    pub fn first_error(&self) -> Option<&StageError> {
        self.errors.first()
    }

    /// Total files written across all stages.
    pub fn files_written(&self) -> usize {
        self.reports.iter().map(|r| r.files).sum()
    }
}

/// Runs resolved pipelines against a [`Toolchain`].
pub struct BuildExecutor<'a> {
    toolchain: &'a Toolchain,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self {
            toolchain,
            cancel: None,
        }
    }

    /// Check `flag` between stages and stop once it is raised.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Run every stage of `config` in order.
    ///
    /// `on_complete` is called exactly once, with the stage reports, and only
    /// when every stage succeeded.
    pub fn run<F>(&self, config: &PipelineConfig, on_complete: F) -> BuildResult
    where
        F: FnOnce(&[StageReport]),
    {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(config.stages().len());
        let mut output_reset = false;

        for &kind in config.stages() {
            if self.is_cancelled() {
                debug!("pipeline"; "cancelled before {}", kind);
                return failure(StageError::cancelled(kind), reports, started);
            }

            if kind.resets_output() && !output_reset {
                output_reset = true;
                if let Err(err) = reset_output(config.output()) {
                    let error = StageError::new(kind, format!("failed to reset output: {err}"))
                        .at(config.output());
                    return failure(error, reports, started);
                }
            }

            debug!("pipeline"; "running {}", kind);
            let stage_started = Instant::now();
            match stages::run_stage(kind, config, self.toolchain) {
                Ok(files) => reports.push(StageReport {
                    stage: kind,
                    files,
                    duration: stage_started.elapsed(),
                }),
                Err(err) => {
                    return failure(StageError::from_error(kind, err), reports, started);
                }
            }
        }

        on_complete(&reports);
        BuildResult {
            status: BuildStatus::Success,
            errors: Vec::new(),
            reports,
            duration: started.elapsed(),
        }
    }
}

fn failure(error: StageError, reports: Vec<StageReport>, started: Instant) -> BuildResult {
    BuildResult {
        status: BuildStatus::Failure,
        errors: vec![error],
        reports,
        duration: started.elapsed(),
    }
}

/// Empty the output directory, creating it if needed.
fn reset_output(output: &Path) -> io::Result<()> {
    match fs::remove_dir_all(output) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::create_dir_all(output)
}
