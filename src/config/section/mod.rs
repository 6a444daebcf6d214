//! Configuration section definitions.
//!
//! Each module corresponds to a section in `pagesmith.toml`:
//!
//! | Module     | TOML Section   | Purpose                             |
//! |------------|----------------|-------------------------------------|
//! | `build`    | `[build]`      | Entries, output, static dir, tools  |
//! | `manifest` | `[manifest]`   | Web-app manifest and icon source    |
//! | `pipeline` | `[pipeline]`   | Stage order override                |
//! | `serve`    | `[serve]`      | Development server                  |

mod build;
mod manifest;
mod pipeline;
mod serve;

pub use build::{BuildConfig, URL_PLACEHOLDER};
pub use manifest::{DisplayMode, ManifestConfig, Orientation};
pub use pipeline::PipelineSection;
pub use serve::ServeConfig;
