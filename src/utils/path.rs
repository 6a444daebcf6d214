//! Path normalization.
//!
//! - `normalize_path`: absolute form, symlinks resolved when possible
//! - `expand_tilde`: `~/dist` to `$HOME/dist`
//! - `resolve_path`: relative to cwd first, then a fallback directory
//! - `to_slash`: output-relative keys with `/` separators
//! - `resolve_url`: request path to a file under a served root

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first, then joins relative paths onto the cwd.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) if s.starts_with('~') => PathBuf::from(shellexpand::tilde(s).into_owned()),
        _ => path.to_path_buf(),
    }
}

/// Resolve a CLI path: absolute as-is, cwd-relative if it exists, otherwise
/// relative to `fallback_dir`.
#[inline]
pub fn resolve_path(path: &Path, fallback_dir: &Path) -> PathBuf {
    let path = &expand_tilde(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if path.exists() {
        return normalize_path(path);
    }
    normalize_path(&fallback_dir.join(path))
}

/// Join the normal components of `path` with `/`.
///
/// `img\logo.png` and `./img/logo.png` both become `img/logo.png`.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `path` relative to `base` as a `/`-joined key.
pub fn relative_key(path: &Path, base: &Path) -> Option<String> {
    path.strip_prefix(base).ok().map(to_slash)
}

/// Map a request URL to a file under `root`.
///
/// Decodes percent escapes, drops the query string and serves `index.html`
/// for directories. Anything resolving outside `root` (`..`, symlinks) is
/// rejected.
pub fn resolve_url(url: &str, root: &Path) -> Option<PathBuf> {
    let decoded = percent_encoding::percent_decode_str(url)
        .decode_utf8()
        .ok()?;
    let path = decoded.split(['?', '#']).next().unwrap_or_default();
    let clean = path.trim_matches('/');
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let canonical = root.join(clean).canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_is_absolute() {
        assert!(normalize_path(Path::new("/absolute/path/file.txt")).is_absolute());
        assert!(normalize_path(Path::new("relative/path/file.txt")).is_absolute());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("dist")), PathBuf::from("dist"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_tilde(Path::new("~/dist")), PathBuf::from(home).join("dist"));
        }
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            resolve_path(Path::new("/absolute/path"), Path::new("/fallback")),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(Path::new("nonexistent/path"), Path::new("/fallback")),
            PathBuf::from("/fallback/nonexistent/path")
        );
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("./img/logo.png")), "img/logo.png");
        assert_eq!(to_slash(Path::new("index.html")), "index.html");
    }

    #[test]
    fn test_resolve_url() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("about")).unwrap();
        std::fs::write(root.join("index.html"), "root").unwrap();
        std::fs::write(root.join("about/index.html"), "about").unwrap();
        std::fs::write(root.join("my file.js"), "js").unwrap();

        let root_canon = root.canonicalize().unwrap();
        assert_eq!(resolve_url("/", root), Some(root_canon.join("index.html")));
        assert_eq!(
            resolve_url("/about/?x=1", root),
            Some(root_canon.join("about/index.html"))
        );
        assert_eq!(resolve_url("/my%20file.js", root), Some(root_canon.join("my file.js")));
        assert_eq!(resolve_url("/missing", root), None);
        assert_eq!(resolve_url("/../etc/passwd", root), None);
    }

    #[test]
    fn test_relative_key() {
        assert_eq!(
            relative_key(Path::new("/out/a/b.js"), Path::new("/out")),
            Some("a/b.js".to_string())
        );
        assert_eq!(relative_key(Path::new("/elsewhere"), Path::new("/out")), None);
    }
}
