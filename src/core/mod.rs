//! Core types - pure abstractions shared across the codebase.

pub mod mode;
mod route;
mod state;

pub use mode::{ModeKind, ModeProfile};
pub use route::{GeneratedFile, Route, dedup_routes};
pub use state::{ServerState, is_shutdown, register_server, setup_shutdown_handler, transition};
