//! Script bundling.
//!
//! ```text
//! entry ─► graph (resolve + rewrite + transpile per module) ─► assemble ─► [minify]
//! ```
//!
//! The bundle is a self-contained classic script. Development builds carry an
//! index source map; production builds are compressed and mangled instead.

mod bundle;
mod graph;
mod resolve;
mod rewrite;
mod transpile;

pub use bundle::Bundle;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use oxc::transformer::TransformOptions;

use super::minify::minify_js;
use super::{Compiled, try_compiled};
use graph::{GraphOptions, build_graph};

/// How a bundle is produced.
pub struct ScriptOptions {
    pub target: TransformOptions,
    pub minify: bool,
    pub source_maps: bool,
    /// Output file name, e.g. `app.js`.
    pub file_name: String,
    /// Module maps list sources relative to this directory.
    pub map_root: PathBuf,
}

impl ScriptOptions {
    /// Map file written next to the bundle.
    pub fn map_name(&self) -> String {
        format!("{}.map", self.file_name)
    }
}

/// Bundle everything reachable from `entry`.
///
/// A missing entry is an error; problems inside modules are diagnostics.
pub fn bundle_scripts(entry: &Path, options: &ScriptOptions) -> Result<Compiled<Bundle>> {
    if !entry.is_file() {
        bail!("script entry {} not found", entry.display());
    }

    let graph_options = GraphOptions {
        target: &options.target,
        source_maps: options.source_maps,
        map_root: &options.map_root,
    };
    let graph = try_compiled!(build_graph(entry, &graph_options)?);

    let map_name = options.source_maps.then(|| options.map_name());
    let mut bundle = bundle::assemble(&graph, &options.file_name, map_name.as_deref());

    if options.minify {
        bundle.code = try_compiled!(minify_js(entry, &bundle.code));
    }

    Ok(Ok(bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(minify: bool, source_maps: bool, root: &Path) -> ScriptOptions {
        ScriptOptions {
            target: TransformOptions::from_target("es2015").unwrap(),
            minify,
            source_maps,
            file_name: "app.js".into(),
            map_root: root.to_path_buf(),
        }
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.js"),
            "import { greet } from './greet';\ndocument.title = greet('world');\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("greet.js"),
            "export function greet(name) {\n  return `hello ${name}`;\n}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_dev_bundle_has_map() {
        let dir = project();
        let bundle = bundle_scripts(&dir.path().join("app.js"), &options(false, true, dir.path()))
            .unwrap()
            .unwrap();
        assert_eq!(bundle.modules, 2);
        assert!(bundle.code.contains("sourceMappingURL=app.js.map"));
        assert!(bundle.code.contains("function greet(name)"));
        let map: serde_json::Value = serde_json::from_str(&bundle.map.unwrap()).unwrap();
        assert_eq!(map["sections"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_prod_bundle_minified_and_stable() {
        let dir = project();
        let entry = dir.path().join("app.js");
        let opts = options(true, false, dir.path());
        let first = bundle_scripts(&entry, &opts).unwrap().unwrap();
        let second = bundle_scripts(&entry, &opts).unwrap().unwrap();

        assert!(first.map.is_none());
        assert!(!first.code.contains("sourceMappingURL"));
        assert!(!first.code.contains('\n') || first.code.lines().count() <= 2);
        assert_eq!(first.code, second.code);
    }

    #[test]
    fn test_imported_bindings_read_through_module() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.js"),
            "import { count, bump } from './counter';\nbump();\nconsole.log(count);\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("counter.js"),
            "export let count = 0;\nexport function bump() {\n  count++;\n}\n",
        )
        .unwrap();

        let bundle = bundle_scripts(&dir.path().join("app.js"), &options(false, false, dir.path()))
            .unwrap()
            .unwrap();
        assert!(bundle.code.contains("console.log(__m0[\"count\"])"), "{}", bundle.code);
        assert!(bundle.code.contains("return count;"));
    }

    #[test]
    fn test_missing_entry_is_error() {
        let dir = TempDir::new().unwrap();
        let result = bundle_scripts(&dir.path().join("app.js"), &options(false, false, dir.path()));
        assert!(result.is_err());
    }
}
