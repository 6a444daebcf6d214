//! Actor system for the dev server.
//!
//! ```text
//! FsActor --> BuildActor --> WsActor
//! (watch)     (rebuild)     (broadcast)
//! ```
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - Runs the pipeline into staged generations
//! - `ws` - WebSocket broadcast
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::{Coordinator, ws_channel};
