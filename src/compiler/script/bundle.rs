//! Bundle assembly: module wrappers plus a small loader.

use serde_json::{Map, Value};

use super::graph::ModuleGraph;
use crate::compiler::sourcemap::{IndexMap, js_map_comment};

/// Helpers the rewritten modules call, and the module table.
const PRELUDE: &str = r#"(function () {
var __interopDefault = function (m) { return m && m.__esModule ? m : { "default": m }; };
var __exportStar = function (from, to) { Object.keys(from).forEach(function (k) { if (k !== "default" && !Object.prototype.hasOwnProperty.call(to, k)) Object.defineProperty(to, k, { enumerable: true, get: function () { return from[k]; } }); }); return from; };
var defs = {};
"#;

/// Runs modules on first `require`, entry first.
const LOADER: &str = r#"var cache = {};
function load(id) {
  var cached = cache[id];
  if (cached) return cached.exports;
  var def = defs[id];
  var module = (cache[id] = { exports: {} });
  def[0].call(module.exports, function (spec) {
    var dep = def[1][spec];
    if (dep === undefined) throw new Error("Cannot find module '" + spec + "'");
    return load(dep);
  }, module, module.exports);
  return module.exports;
}
load(0);
})();
"#;

/// Concatenated bundle text and its index map.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    pub map: Option<String>,
    pub modules: usize,
}

/// Wrap every module of `graph`.
///
/// With `map_name` set, each module's map becomes one index section and a
/// `sourceMappingURL` comment pointing at `map_name` is appended.
pub fn assemble(graph: &ModuleGraph, file_name: &str, map_name: Option<&str>) -> Bundle {
    let mut code = String::from(PRELUDE);
    let mut line = PRELUDE.matches('\n').count();
    let mut index = IndexMap::new(file_name);

    for (id, module) in graph.modules.iter().enumerate() {
        let header = format!("defs[{id}] = [function (require, module, exports) {{\n");
        code.push_str(&header);
        line += 1;

        if map_name.is_some()
            && let Some(map) = &module.map
        {
            index.push(line, map.clone());
        }

        code.push_str(&module.code);
        if !module.code.ends_with('\n') {
            code.push('\n');
        }
        line += module.code.matches('\n').count() + usize::from(!module.code.ends_with('\n'));

        let deps: Map<String, Value> = module
            .deps
            .iter()
            .map(|(spec, dep)| (spec.clone(), Value::from(*dep)))
            .collect();
        code.push_str(&format!("}}, {}];\n", Value::Object(deps)));
        line += 1;
    }

    code.push_str(LOADER);

    let map = map_name.map(|name| {
        code.push_str(&js_map_comment(name));
        index.to_json()
    });

    Bundle {
        code,
        map,
        modules: graph.len(),
    }
}
