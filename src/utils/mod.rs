//! Small helpers shared across the crate.

pub mod exec;
pub mod fmt;
pub mod hash;
pub mod mime;
pub mod path;
