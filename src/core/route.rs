//! Route and generated-file input types.
//!
//! Both are supplied once per invocation and never change during a build.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Page route to prerender (decoded URL path).
///
/// Invariants:
/// - Always starts with `/`
/// - No trailing slash except for the root route
/// - No query string, fragment, or `..` segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Route(Arc<str>);

impl Route {
    /// Parse and normalize a route. Returns `None` for paths that would
    /// escape the output directory.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let path = trimmed.split(['?', '#']).next().unwrap_or(trimmed);

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == ".." || *s == ".") {
            return None;
        }

        if segments.is_empty() {
            return Some(Self::root());
        }

        Some(Self(Arc::from(format!("/{}", segments.join("/")))))
    }

    /// The root route `/`.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    /// Output file relative to the output root.
    ///
    /// `/` → `index.html`, `/about` → `about/index.html`.
    pub fn output_file(&self) -> PathBuf {
        if self.is_root() {
            return PathBuf::from("index.html");
        }
        let mut path = PathBuf::new();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path.join("index.html")
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid route `{raw}`")))
    }
}

/// Deduplicate routes, keeping the first occurrence.
pub fn dedup_routes(routes: impl IntoIterator<Item = Route>) -> Vec<Route> {
    let mut seen = rustc_hash::FxHashSet::default();
    routes
        .into_iter()
        .filter(|route| seen.insert(route.clone()))
        .collect()
}

/// A file whose content was computed outside the bundler.
///
/// Written verbatim into the output tree by `InjectGeneratedFiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Output-relative path using `/` separators.
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Destination path under `root`, or `None` if the path is absolute or
    /// climbs out of the root.
    pub fn destination(&self, root: &Path) -> Option<PathBuf> {
        let relative = Path::new(self.path.trim_start_matches("./"));
        let mut dest = root.to_path_buf();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    dest.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        (depth > 0).then_some(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_normalization() {
        assert_eq!(Route::parse("/").unwrap().as_str(), "/");
        assert_eq!(Route::parse("").unwrap().as_str(), "/");
        assert_eq!(Route::parse("about").unwrap().as_str(), "/about");
        assert_eq!(Route::parse("/about/").unwrap().as_str(), "/about");
        assert_eq!(Route::parse("/blog//post?x=1#top").unwrap().as_str(), "/blog/post");
    }

    #[test]
    fn test_route_rejects_traversal() {
        assert!(Route::parse("/../etc").is_none());
        assert!(Route::parse("/a/./b").is_none());
    }

    #[test]
    fn test_route_output_file() {
        assert_eq!(Route::root().output_file(), PathBuf::from("index.html"));
        assert_eq!(
            Route::parse("/about").unwrap().output_file(),
            PathBuf::from("about/index.html")
        );
        assert_eq!(
            Route::parse("/blog/post").unwrap().output_file(),
            PathBuf::from("blog/post/index.html")
        );
    }

    #[test]
    fn test_dedup_routes_keeps_order() {
        let routes = ["/b", "/a", "/b/", "/"]
            .iter()
            .filter_map(|r| Route::parse(r));
        let routes: Vec<_> = dedup_routes(routes)
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(routes, vec!["/b", "/a", "/"]);
    }

    #[test]
    fn test_generated_file_destination() {
        let root = Path::new("/out");
        assert_eq!(
            GeneratedFile::new("content.txt", "").destination(root),
            Some(PathBuf::from("/out/content.txt"))
        );
        assert_eq!(
            GeneratedFile::new("./data/a.json", "").destination(root),
            Some(PathBuf::from("/out/data/a.json"))
        );
        assert_eq!(GeneratedFile::new("../a", "").destination(root), None);
        assert_eq!(GeneratedFile::new("/etc/passwd", "").destination(root), None);
        assert_eq!(GeneratedFile::new("", "").destination(root), None);
    }
}
