//! Build pipeline: stage declarations, assembly and execution.
//!
//! ```text
//! BuildInputs ─┐
//!              ├─> PipelineAssembler ──> PipelineConfig ──> BuildExecutor
//! ModeProfile ─┘        │                  (read-only)          │
//!                 StageRegistry                           crate::stages
//! ```
//!
//! - `stage`: the closed stage set and its fragment builders
//! - `registry`: canonical order and caller overrides
//! - `fragment`: partial configs and the conflict-detecting fold
//! - `assembler`: base → mode → stages, resolved into a `PipelineConfig`
//! - `executor`: sequential run, stop on first failure

mod assembler;
mod config;
mod error;
mod executor;
mod fragment;
mod inputs;
mod registry;
mod stage;


pub use assembler::PipelineAssembler;
pub use config::{BuildFlags, ImageSettings, PipelineConfig, ServiceWorkerSettings};
pub use error::{PipelineError, StageError};
pub use executor::{BuildExecutor, BuildResult, StageReport};
pub use fragment::{ConfigFragment, Loader, TransformRule};
pub use inputs::BuildInputs;
pub use stage::StageKind;
