//! Syntax lowering to the configured ECMAScript target.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use serde_json::Value;

use crate::compiler::{Compiled, Diagnostic};

/// Lowered module code, with its source map when requested.
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub code: String,
    pub map: Option<Value>,
}

/// Where a module's source map points back to.
pub struct MapSource<'a> {
    /// Name listed under `sources`.
    pub name: &'a str,
    /// Author's text, embedded as `sourcesContent`.
    pub content: &'a str,
}

/// Transpile CommonJS-shaped `code` from `path`.
pub fn transpile(
    path: &Path,
    code: &str,
    options: &TransformOptions,
    map_source: Option<MapSource<'_>>,
) -> Compiled<Transpiled> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if let Some(err) = ret.errors.first() {
        return Err(diagnostic(path, code, err));
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let ret = Transformer::new(&allocator, path, options).build_with_scoping(scoping, &mut program);
    if let Some(err) = ret.errors.first() {
        return Err(diagnostic(path, code, err));
    }

    let codegen = Codegen::new().with_options(CodegenOptions {
        source_map_path: map_source.as_ref().map(|_| path.to_path_buf()),
        ..CodegenOptions::default()
    });
    let out = codegen.build(&program);

    let map = match (map_source, out.map) {
        (Some(source), Some(map)) => Some(retarget_map(&map.to_json_string(), &source)),
        _ => None,
    };

    Ok(Transpiled {
        code: out.code,
        map,
    })
}

fn diagnostic(path: &Path, code: &str, err: &oxc::diagnostics::OxcDiagnostic) -> Diagnostic {
    let offset = err
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map_or(0, |label| label.offset());
    Diagnostic::at_offset(path, code, offset, err.to_string())
}

/// Point the map at the author's file instead of the rewritten text.
fn retarget_map(json: &str, source: &MapSource<'_>) -> Value {
    let mut map: Value = serde_json::from_str(json).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(obj) = &mut map {
        obj.insert("sources".into(), Value::from(vec![source.name]));
        obj.insert("sourcesContent".into(), Value::from(vec![source.content]));
        obj.remove("file");
    }
    map
}
