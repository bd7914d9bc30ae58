//! Bundle minification with oxc.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::{Compiled, Diagnostic};

/// Compress and mangle a classic script (bundle or vendor file).
///
/// Parsed in script mode: top-level declarations are globals other scripts
/// on the page may read, so they are neither renamed nor dropped.
/// A parse failure is reported against `path` at the first error location.
pub fn minify_js(path: &Path, source: &str) -> Compiled<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::script()).parse();
    if let Some(err) = ret.errors.first() {
        let offset = err
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        return Err(Diagnostic::at_offset(path, source, offset, err.to_string()));
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_shrinks() {
        let src = "var message = 'hello';\n\n// greeting\nconsole.log(message);\n";
        let out = minify_js(Path::new("a.js"), src).unwrap();
        assert!(out.len() < src.len());
        assert!(!out.contains("greeting"));
    }

    #[test]
    fn test_minify_keeps_top_level_globals() {
        let src = "var VendorLib = function () { return 1; };\nfunction helper() { return 2; }\n";
        let out = minify_js(Path::new("vendor.js"), src).unwrap();
        assert!(out.contains("VendorLib"), "{out}");
        assert!(out.contains("helper"), "{out}");
    }

    #[test]
    fn test_minify_mangles_locals() {
        let src = "function outer() { var someLongLocalName = 1; return someLongLocalName + 1; }\n";
        let out = minify_js(Path::new("vendor.js"), src).unwrap();
        assert!(out.contains("outer"));
        assert!(!out.contains("someLongLocalName"));
    }

    #[test]
    fn test_minify_deterministic() {
        let src = "(function(){ var longName = 1; window.x = longName + 2; })();";
        let a = minify_js(Path::new("a.js"), src).unwrap();
        let b = minify_js(Path::new("a.js"), src).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_minify_parse_error() {
        let diag = minify_js(Path::new("broken.js"), "var a = 1;\nvar = ;\n").unwrap_err();
        assert_eq!(diag.line, Some(2));
        assert!(diag.frame.is_some());
    }
}
