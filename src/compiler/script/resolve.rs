//! Module specifier resolution.
//!
//! Relative specifiers (`./x`, `../x`) resolve against the importing file's
//! directory. Bare specifiers (`lodash`, `lodash/fp`) are looked up in
//! `node_modules` directories from the importer upward.

use std::path::{Path, PathBuf};

use serde::Deserialize;

const EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// Resolve `specifier` imported from the file `from`.
pub fn resolve(from: &Path, specifier: &str) -> Option<PathBuf> {
    let dir = from.parent()?;

    if is_relative(specifier) {
        return resolve_path(&dir.join(specifier));
    }
    if Path::new(specifier).is_absolute() {
        return resolve_path(Path::new(specifier));
    }

    dir.ancestors()
        .map(|ancestor| ancestor.join("node_modules").join(specifier))
        .find_map(|candidate| resolve_package(&candidate))
}

#[inline]
fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Exact file, then extension fallbacks, then `index.js`.
fn resolve_path(path: &Path) -> Option<PathBuf> {
    resolve_file(path).or_else(|| resolve_index(path))
}

fn resolve_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(normalize(path));
    }
    let name = path.file_name()?.to_str()?;
    EXTENSIONS
        .iter()
        .map(|ext| path.with_file_name(format!("{name}.{ext}")))
        .find(|candidate| candidate.is_file())
        .map(|p| normalize(&p))
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    let index = dir.join("index.js");
    index.is_file().then(|| normalize(&index))
}

#[derive(Deserialize)]
struct PackageManifest {
    module: Option<String>,
    main: Option<String>,
}

/// Package directory entry point from `package.json`, else path rules.
fn resolve_package(path: &Path) -> Option<PathBuf> {
    if let Some(found) = resolve_file(path) {
        return Some(found);
    }
    if !path.is_dir() {
        return None;
    }

    let manifest = std::fs::read_to_string(path.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str::<PackageManifest>(&text).ok());

    manifest
        .into_iter()
        .flat_map(|m| [m.module, m.main])
        .flatten()
        .find_map(|entry| resolve_path(&path.join(entry)))
        .or_else(|| resolve_index(path))
}

fn normalize(path: &Path) -> PathBuf {
    crate::utils::path::normalize_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("app/js");
        fs::create_dir_all(js.join("lib/widgets")).unwrap();
        fs::write(js.join("app.js"), "").unwrap();
        fs::write(js.join("lib/util.js"), "").unwrap();
        fs::write(js.join("lib/esm.mjs"), "").unwrap();
        fs::write(js.join("lib/widgets/index.js"), "").unwrap();

        let pkg = dir.path().join("node_modules/tiny-pkg");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(pkg.join("package.json"), r#"{"main": "dist/tiny"}"#).unwrap();
        fs::write(pkg.join("dist/tiny.js"), "").unwrap();
        dir
    }

    #[test]
    fn test_relative_fallbacks() {
        let dir = setup();
        let root = normalize(dir.path());
        let from = root.join("app/js/app.js");

        assert_eq!(
            resolve(&from, "./lib/util"),
            Some(root.join("app/js/lib/util.js"))
        );
        assert_eq!(
            resolve(&from, "./lib/util.js"),
            Some(root.join("app/js/lib/util.js"))
        );
        assert_eq!(
            resolve(&from, "./lib/esm"),
            Some(root.join("app/js/lib/esm.mjs"))
        );
        assert_eq!(
            resolve(&from, "./lib/widgets"),
            Some(root.join("app/js/lib/widgets/index.js"))
        );
        assert_eq!(resolve(&from, "./missing"), None);
    }

    #[test]
    fn test_node_modules_lookup() {
        let dir = setup();
        let root = normalize(dir.path());
        let from = root.join("app/js/lib/util.js");

        assert_eq!(
            resolve(&from, "tiny-pkg"),
            Some(root.join("node_modules/tiny-pkg/dist/tiny.js"))
        );
        assert_eq!(resolve(&from, "not-installed"), None);
    }
}
