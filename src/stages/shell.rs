//! The HTML shell: template, bundle tags, service worker registration.
//!
//! Later stages (icons, prerender) edit the written `index.html` through
//! [`insert_before`], never by re-rendering the template.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::BundleOutput;
use crate::embed::build::{SHELL_HTML, SW_REGISTER_JS, ShellVars, SwRegisterVars};
use crate::embed::escape_html;
use crate::pipeline::PipelineConfig;

/// File name of the shell in the output root.
pub const SHELL_FILE: &str = "index.html";

pub fn shell_path(config: &PipelineConfig) -> PathBuf {
    config.output().join(SHELL_FILE)
}

/// Render the shell for `bundle`.
pub fn render(config: &PipelineConfig, bundle: &BundleOutput) -> Result<String> {
    let template = match config.template() {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?,
        None => {
            let manifest = config.manifest();
            SHELL_HTML.render(&ShellVars {
                title: &manifest.name,
                description: &manifest.description,
                theme_color: &manifest.theme_color,
            })
        }
    };

    let mut tags = String::new();
    for href in &bundle.styles {
        tags.push_str(&format!(
            "<link rel=\"stylesheet\" href=\"{}\">\n",
            escape_html(href)
        ));
    }
    for src in &bundle.scripts {
        tags.push_str(&format!(
            "<script defer src=\"{}\"></script>\n",
            escape_html(src)
        ));
    }

    let mut html = insert_before(&template, "</head>", &tags);

    if config.registers_service_worker()
        && let Some(sw) = config.service_worker()
    {
        let snippet = SW_REGISTER_JS.render(&SwRegisterVars {
            url: &public_url(config.public_path(), &sw.dest),
            scope: &config.manifest().serviceworker.scope,
        });
        html = insert_before(&html, "</body>", &format!("<script>\n{snippet}</script>\n"));
    }
    Ok(html)
}

/// Insert `snippet` before the first `marker` (ASCII case-insensitive), or
/// append it when the marker is missing.
pub fn insert_before(html: &str, marker: &str, snippet: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.find(&marker.to_ascii_lowercase()) {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..at]);
            out.push_str(snippet);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}

/// Join a public path and an output-relative file name.
///
/// `("/", "main.js")` → `/main.js`, `("/app", "main.js")` → `/app/main.js`.
pub fn public_url(public_path: &str, file: &str) -> String {
    let base = public_path.trim_end_matches('/');
    format!("{base}/{}", file.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModeProfile;
    use crate::pipeline::{BuildInputs, PipelineAssembler};

    fn config(profile: ModeProfile) -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("icon.png"), b"png").unwrap();
        let config = PipelineAssembler::new(BuildInputs::for_tests(dir.path()), profile)
            .assemble()
            .unwrap();
        (dir, config)
    }

    #[test]
    fn test_insert_before() {
        assert_eq!(insert_before("<HEAD></HEAD>", "</head>", "x"), "<HEAD>x</HEAD>");
        assert_eq!(insert_before("<p>", "</head>", "x"), "<p>x");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("/", "main.js"), "/main.js");
        assert_eq!(public_url("/app/", "main.js"), "/app/main.js");
        assert_eq!(public_url("", "main.js"), "/main.js");
    }

    #[test]
    fn test_bundle_tags_go_into_head() {
        let (_dir, config) = config(ModeProfile::development(false));
        let bundle = BundleOutput {
            scripts: vec!["/index.js".to_string()],
            styles: vec!["/main.css".to_string()],
            files: 2,
        };
        let html = render(&config, &bundle).unwrap();
        let head_end = html.find("</head>").unwrap();
        assert!(html.find("<script defer src=\"/index.js\">").unwrap() < head_end);
        assert!(html.find("href=\"/main.css\"").unwrap() < head_end);
        assert!(html.contains("<title>Test Site</title>"));
        assert!(!html.contains("serviceWorker"));
    }

    #[test]
    fn test_production_registers_service_worker() {
        let (_dir, config) = config(ModeProfile::production(vec![]));
        let html = render(&config, &BundleOutput::default()).unwrap();
        assert!(html.contains("register('/service-worker.js', { scope: '/' })"));
    }
}
