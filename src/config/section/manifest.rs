//! `[manifest]` section configuration.
//!
//! Web-app manifest metadata and the icon every generated icon derives from.
//!
//! # Example
//!
//! ```toml
//! [manifest]
//! name = "My App"
//! short_name = "App"
//! description = "An installable site"
//! background_color = "#ffffff"
//! theme_color = "#3367d6"
//! display = "standalone"
//! orientation = "portrait"
//! start_url = "/"
//! source_icon = "icon.png"      # relative to the project root
//!
//! [manifest.serviceworker]
//! scope = "/"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Web-app display mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    Fullscreen,
    #[default]
    Standalone,
    MinimalUi,
    Browser,
}

/// Preferred screen orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Any,
    Natural,
    Landscape,
    Portrait,
    PortraitPrimary,
    PortraitSecondary,
    LandscapePrimary,
    LandscapeSecondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceWorkerConfig {
    pub scope: String,
}

impl Default for ServiceWorkerConfig {
    fn default() -> Self {
        Self {
            scope: "/".to_string(),
        }
    }
}

/// Site metadata used for icons, `manifest.json` and the HTML shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub name: String,
    pub short_name: Option<String>,
    pub description: String,
    pub background_color: String,
    pub theme_color: String,
    pub display: DisplayMode,
    pub orientation: Orientation,
    pub start_url: String,
    pub serviceworker: ServiceWorkerConfig,
    /// Source image for the icon set. Must exist when icons are generated.
    pub source_icon: Option<PathBuf>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            short_name: None,
            description: String::new(),
            background_color: "#ffffff".to_string(),
            theme_color: "#ffffff".to_string(),
            display: DisplayMode::default(),
            orientation: Orientation::default(),
            start_url: "/".to_string(),
            serviceworker: ServiceWorkerConfig::default(),
            source_icon: None,
        }
    }
}

impl ManifestConfig {
    /// Short name, falling back to `name`.
    pub fn short_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    pub fn background_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.background_color).unwrap_or([255, 255, 255])
    }

    pub(crate) fn normalize(&mut self, root: &Path) {
        if let Some(icon) = self.source_icon.take() {
            self.source_icon = Some(crate::utils::path::normalize_path(&root.join(icon)));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.name.trim().is_empty() {
            diag.error_with_hint(
                FieldPath::new("manifest.name"),
                "site name is empty",
                "set `name` under [manifest]",
            );
        }

        for (field, value) in [
            (FieldPath::new("manifest.background_color"), &self.background_color),
            (FieldPath::new("manifest.theme_color"), &self.theme_color),
        ] {
            if parse_hex_color(value).is_none() {
                diag.error_with_hint(
                    field,
                    format!("`{value}` is not a hex color"),
                    "use `#rgb` or `#rrggbb`",
                );
            }
        }

        if !self.start_url.starts_with('/') {
            diag.error(
                FieldPath::new("manifest.start_url"),
                "start_url must be an absolute path",
            );
        }

        if self.source_icon.is_none() {
            diag.warn(
                FieldPath::new("manifest.source_icon"),
                "no source icon configured, icon generation will fail",
            );
        }
    }
}

/// Parse `#rgb` / `#rrggbb` into RGB bytes.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    let expand = |c: u8| -> Option<u8> {
        let digit = (c as char).to_digit(16)? as u8;
        Some(digit * 17)
    };
    match hex.len() {
        3 => {
            let bytes = hex.as_bytes();
            Some([expand(bytes[0])?, expand(bytes[1])?, expand(bytes[2])?])
        }
        6 => Some([
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_manifest_section() {
        let config = test_parse_config(
            r##"
[manifest]
name = "Demo"
short_name = "D"
background_color = "#000"
display = "minimal-ui"
orientation = "portrait-primary"
source_icon = "icon.png"

[manifest.serviceworker]
scope = "/app/"
"##,
        );
        let manifest = &config.manifest;
        assert_eq!(manifest.name, "Demo");
        assert_eq!(manifest.short_name(), "D");
        assert_eq!(manifest.display, DisplayMode::MinimalUi);
        assert_eq!(manifest.orientation, Orientation::PortraitPrimary);
        assert_eq!(manifest.serviceworker.scope, "/app/");
        assert_eq!(manifest.background_rgb(), [0, 0, 0]);
    }

    #[test]
    fn test_manifest_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.manifest.start_url, "/");
        assert_eq!(config.manifest.serviceworker.scope, "/");
        assert_eq!(config.manifest.display, DisplayMode::Standalone);
        assert!(config.manifest.source_icon.is_none());

        let config = test_parse_config("[manifest]\nname = \"Full Name\"");
        // Falls back to the full name
        assert_eq!(config.manifest.short_name(), "Full Name");
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#3367d6"), Some([0x33, 0x67, 0xd6]));
        assert_eq!(parse_hex_color("3367d6"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#ggg"), None);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let manifest = ManifestConfig {
            name: " ".to_string(),
            theme_color: "blue".to_string(),
            start_url: "index.html".to_string(),
            ..ManifestConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        manifest.validate(&mut diag);
        assert_eq!(diag.errors().len(), 3);
        assert_eq!(diag.warnings().len(), 1);
    }
}
