//! Build mode profiles.
//!
//! A closed two-variant type: everything that differs between `serve` and
//! `build` is expressed as the fragment a profile contributes, never as
//! branches inside individual stages.

use std::fmt;
use std::sync::Arc;

use crate::core::GeneratedFile;
use crate::pipeline::{BuildInputs, ConfigFragment, Loader, TransformRule};

/// Mode tag carried by a resolved pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Development,
    Production,
}

impl ModeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mode-specific stage parameters and overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeProfile {
    /// Interactive watch-and-serve mode.
    Development {
        /// Ship the app module with its debug overlay enabled.
        debug: bool,
    },
    /// One-shot optimized build.
    Production {
        /// Files injected verbatim after the static copy.
        file_contents: Arc<[GeneratedFile]>,
    },
}

impl ModeProfile {
    pub fn development(debug: bool) -> Self {
        Self::Development { debug }
    }

    pub fn production(file_contents: Vec<GeneratedFile>) -> Self {
        Self::Production {
            file_contents: file_contents.into(),
        }
    }

    pub const fn kind(&self) -> ModeKind {
        match self {
            Self::Development { .. } => ModeKind::Development,
            Self::Production { .. } => ModeKind::Production,
        }
    }

    #[inline]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production { .. })
    }

    /// Generated-file payload (always empty in development).
    pub fn file_contents(&self) -> &[GeneratedFile] {
        match self {
            Self::Development { .. } => &[],
            Self::Production { file_contents } => file_contents,
        }
    }

    /// Fragment this profile contributes on top of the base configuration.
    ///
    /// Pure: depends only on `self` and `base`.
    pub fn apply_to(&self, base: &BuildInputs) -> ConfigFragment {
        let module_rule = |loaders| TransformRule::new(base.module_test.clone(), loaders)
            .exclude(["node_modules"]);

        match self {
            Self::Development { debug } => ConfigFragment {
                minify: Some(false),
                watch: Some(true),
                hot_reload: Some(true),
                debug: Some(*debug),
                transform_rules: vec![module_rule(vec![
                    Loader::Hot,
                    Loader::App {
                        optimize: false,
                        debug: *debug,
                        force_watch: true,
                    },
                ])],
                ..ConfigFragment::default()
            },
            Self::Production { .. } => ConfigFragment {
                minify: Some(true),
                watch: Some(false),
                hot_reload: Some(false),
                debug: Some(false),
                transform_rules: vec![module_rule(vec![Loader::App {
                    optimize: true,
                    debug: false,
                    force_watch: false,
                }])],
                ..ConfigFragment::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_kind() {
        assert_eq!(ModeProfile::development(false).kind(), ModeKind::Development);
        assert_eq!(ModeProfile::production(vec![]).kind(), ModeKind::Production);
        assert!(ModeProfile::production(vec![]).is_production());
    }

    #[test]
    fn test_development_has_no_file_contents() {
        assert!(ModeProfile::development(true).file_contents().is_empty());

        let profile = ModeProfile::production(vec![GeneratedFile::new("content.txt", "hi")]);
        assert_eq!(profile.file_contents().len(), 1);
    }

    #[test]
    fn test_apply_to_is_pure() {
        let base = BuildInputs::for_tests(std::path::Path::new("/site"));
        let profile = ModeProfile::development(true);

        let first = profile.apply_to(&base);
        let second = profile.apply_to(&base);
        assert_eq!(first.minify, second.minify);
        assert_eq!(first.transform_rules, second.transform_rules);
    }

    #[test]
    fn test_development_fragment() {
        let base = BuildInputs::for_tests(std::path::Path::new("/site"));
        let fragment = ModeProfile::development(true).apply_to(&base);

        assert_eq!(fragment.minify, Some(false));
        assert_eq!(fragment.watch, Some(true));
        assert_eq!(fragment.hot_reload, Some(true));
        assert_eq!(fragment.debug, Some(true));
        // Hot client is injected ahead of the app loader
        assert_eq!(fragment.transform_rules[0].loaders[0], Loader::Hot);
    }

    #[test]
    fn test_production_fragment() {
        let base = BuildInputs::for_tests(std::path::Path::new("/site"));
        let fragment = ModeProfile::production(vec![]).apply_to(&base);

        assert_eq!(fragment.minify, Some(true));
        assert_eq!(fragment.watch, Some(false));
        assert!(
            fragment.transform_rules[0]
                .loaders
                .iter()
                .all(|l| *l != Loader::Hot)
        );
    }
}
