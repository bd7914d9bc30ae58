//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve URL to filesystem path, handling index.html for directories.
///
/// Anything that would leave `serve_root` resolves to `None`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    // Reject paths with suspicious patterns early
    if clean.split('/').any(|seg| seg == "..") || clean.contains('\\') {
        return None;
    }

    let local = serve_root.join(&clean);

    // Symlinks may still point outside the root.
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Normalize URL: strip query and fragment, decode, trim slashes.
pub fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("root/blog")).unwrap();
        fs::write(dir.path().join("root/index.html"), "home").unwrap();
        fs::write(dir.path().join("root/blog/index.html"), "blog").unwrap();
        fs::write(dir.path().join("root/app.js"), "1").unwrap();
        fs::write(dir.path().join("secret.txt"), "nope").unwrap();
        dir
    }

    #[test]
    fn test_resolve_files_and_indexes() {
        let dir = site();
        let root = dir.path().join("root");
        assert!(resolve_path("/", &root).unwrap().ends_with("index.html"));
        assert!(resolve_path("/blog/", &root).unwrap().ends_with("blog/index.html"));
        assert!(resolve_path("/app.js?v=3", &root).unwrap().ends_with("app.js"));
        assert!(resolve_path("/missing.css", &root).is_none());
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = site();
        let root = dir.path().join("root");
        assert!(resolve_path("/../secret.txt", &root).is_none());
        assert!(resolve_path("/%2e%2e/secret.txt", &root).is_none());
        assert!(resolve_path("/blog/..%2f..%2fsecret.txt", &root).is_none());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("/a%20b/c.html?x=1#top"), "a b/c.html");
        assert_eq!(normalize_url("/"), "");
    }
}
