//! One-shot production build.
//!
//! Assembles the production pipeline from `pagesmith.toml`, runs it once and
//! logs a summary. Failure is reported to the caller, which exits non-zero.

use anyhow::Result;

use crate::config::SiteConfig;
use crate::core::ModeProfile;
use crate::pipeline::{BuildExecutor, BuildInputs, BuildResult, PipelineAssembler, StageReport};
use crate::stages::Toolchain;
use crate::utils::fmt::{format_duration, plural_count};
use crate::{debug, log};

/// Build the site. `Ok(false)` when a stage failed.
///
/// Configuration errors are returned as `Err`; nothing is written then.
pub fn build_site(config: &SiteConfig) -> Result<bool> {
    let assembler = PipelineAssembler::new(
        BuildInputs::from_config(config),
        ModeProfile::production(config.generated_files()),
    );
    let pipeline = assembler.assemble()?;
    let toolchain = Toolchain::from_config(&config.build);

    let stages: Vec<_> = pipeline.stages().iter().map(|s| s.name()).collect();
    debug!("build"; "stages: {}", stages.join(", "));

    let result = BuildExecutor::new(&toolchain).run(&pipeline, log_reports);
    report(&result, &config.build.output.display().to_string());
    Ok(result.is_success())
}

/// Completion callback: one line per stage.
fn log_reports(reports: &[StageReport]) {
    for r in reports {
        log!("build"; "{}: {} ({})", r.stage, plural_count(r.files, "file"), format_duration(r.duration));
    }
}

fn report(result: &BuildResult, output: &str) {
    if result.is_success() {
        log!(
            "build"; "wrote {} to {} in {}",
            plural_count(result.files_written(), "file"),
            output,
            format_duration(result.duration)
        );
        return;
    }

    for error in &result.errors {
        log!("error"; "{}", error);
    }
    log!("build"; "failed after {}", format_duration(result.duration));
}
