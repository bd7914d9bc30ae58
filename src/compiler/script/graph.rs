//! Module graph discovery.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use oxc::transformer::TransformOptions;
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::resolve::resolve;
use super::rewrite::rewrite_module;
use super::transpile::{MapSource, transpile};
use crate::compiler::{Compiled, Diagnostic, try_compiled};
use crate::utils::path::{normalize_path, to_slash};

/// One transpiled module.
#[derive(Debug, Clone)]
pub struct Module {
    pub code: String,
    pub map: Option<Value>,
    /// `(specifier as written, module id)` in source order.
    pub deps: Vec<(String, usize)>,
}

/// Modules indexed by id. The entry is id 0; ids follow discovery order.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    pub modules: Vec<Module>,
}

impl ModuleGraph {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

pub struct GraphOptions<'a> {
    pub target: &'a TransformOptions,
    pub source_maps: bool,
    /// `sources` in module maps are shown relative to this directory.
    pub map_root: &'a Path,
}

/// Walk the graph breadth-first from `entry`, transpiling each module once.
///
/// Syntax errors and unresolved specifiers stop the walk with a diagnostic.
/// A file that resolves but cannot be read is an error.
pub fn build_graph(entry: &Path, options: &GraphOptions<'_>) -> Result<Compiled<ModuleGraph>> {
    let entry = normalize_path(entry);
    let mut ids: FxHashMap<PathBuf, usize> = FxHashMap::default();
    ids.insert(entry.clone(), 0);
    let mut queue = VecDeque::from([entry]);
    let mut graph = ModuleGraph::default();

    while let Some(path) = queue.pop_front() {
        let source = fs::read_to_string(&path)
            .with_context(|| format!("failed to read module {}", path.display()))?;
        let rewritten = try_compiled!(rewrite_module(&path, &source));

        let mut deps: Vec<(String, usize)> = Vec::new();
        for request in &rewritten.requests {
            if deps.iter().any(|(spec, _)| spec == &request.specifier) {
                continue;
            }
            let Some(resolved) = resolve(&path, &request.specifier) else {
                return Ok(Err(Diagnostic::at_offset(
                    &path,
                    &source,
                    request.offset,
                    format!("cannot resolve module `{}`", request.specifier),
                )));
            };
            let next = ids.len();
            let id = *ids.entry(resolved.clone()).or_insert_with(|| {
                queue.push_back(resolved);
                next
            });
            deps.push((request.specifier.clone(), id));
        }

        let name = path
            .strip_prefix(options.map_root)
            .map_or_else(|_| to_slash(&path), to_slash);
        let map_source = options.source_maps.then_some(MapSource {
            name: &name,
            content: &source,
        });
        let transpiled = try_compiled!(transpile(
            &path,
            &rewritten.code,
            options.target,
            map_source
        ));

        graph.modules.push(Module {
            code: transpiled.code,
            map: transpiled.map,
            deps,
        });
    }

    Ok(Ok(graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn graph(dir: &Path, source_maps: bool) -> Compiled<ModuleGraph> {
        let target = TransformOptions::from_target("es2015").unwrap();
        let map_root = normalize_path(dir);
        let options = GraphOptions {
            target: &target,
            source_maps,
            map_root: &map_root,
        };
        build_graph(&dir.join("app.js"), &options).unwrap()
    }

    #[test]
    fn test_discovery_order_and_dedup() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.js", "import { a } from './a';\nimport b from './b';\nconsole.log(a, b);\n");
        write(dir.path(), "a.js", "import b from './b.js';\nexport const a = b + 1;\n");
        write(dir.path(), "b.js", "export default 1;\n");

        let graph = graph(dir.path(), false).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.modules[0].code.contains("console.log"));
        assert_eq!(
            graph.modules[0].deps,
            vec![("./a".to_string(), 1), ("./b".to_string(), 2)]
        );
        assert_eq!(graph.modules[1].deps, vec![("./b.js".to_string(), 2)]);
        assert!(graph.modules[2].deps.is_empty());
    }

    #[test]
    fn test_cycles_terminate() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.js", "require('./other');\n");
        write(dir.path(), "other.js", "require('./app');\n");

        let graph = graph(dir.path(), false).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.modules[1].deps, vec![("./app".to_string(), 0)]);
    }

    #[test]
    fn test_unresolved_import_is_diagnostic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.js", "import './ok';\n\nimport x from './missing';\n");
        write(dir.path(), "ok.js", "");

        let diag = graph(dir.path(), false).unwrap_err();
        assert!(diag.message.contains("./missing"));
        assert_eq!(diag.line, Some(3));
    }

    #[test]
    fn test_maps_name_sources_relative() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.js", "require('./lib/util');\n");
        write(dir.path(), "lib/util.js", "module.exports = 1;\n");

        let graph = graph(dir.path(), true).unwrap();
        let map = graph.modules[1].map.as_ref().unwrap();
        assert_eq!(map["sources"][0], "lib/util.js");
    }
}
