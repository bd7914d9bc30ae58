//! ES module syntax to CommonJS, preserving line numbers.
//!
//! Top-level module declarations are replaced, and every read of an imported
//! binding becomes a property read on the required module (`__m0["count"]`),
//! so imports stay live like ES bindings. Every replacement keeps the newline
//! count of the text it replaces, so line numbers reported by later stages
//! still point into the author's file. Exported bindings become live getters
//! declared on line 1.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Argument, CallExpression, Declaration, ExportDefaultDeclarationKind, ExportNamedDeclaration,
    Expression, IdentifierReference, ImportDeclarationSpecifier, ObjectProperty, Statement,
    TaggedTemplateExpression,
};
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc::span::{GetSpan, SourceType};
use rustc_hash::FxHashMap;

use crate::compiler::{Compiled, Diagnostic};

/// A module request found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub specifier: String,
    /// Byte offset of the specifier literal in the original source.
    pub offset: usize,
}

/// CommonJS-shaped module text plus the modules it requires.
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub code: String,
    pub requests: Vec<Request>,
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Default)]
struct Rewriter {
    edits: Vec<Edit>,
    requests: Vec<Request>,
    /// `(exported name, expression yielding the value)`
    exports: Vec<(String, String)>,
    /// Imported binding -> `(local name, expression reading it)`
    imports: FxHashMap<SymbolId, (String, String)>,
    temps: usize,
    is_esm: bool,
}

impl Rewriter {
    fn temp(&mut self) -> String {
        let name = format!("__m{}", self.temps);
        self.temps += 1;
        name
    }

    fn edit(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start: start as usize,
            end: end as usize,
            text: text.into(),
        });
    }

    fn request(&mut self, specifier: &str, offset: u32) -> String {
        self.requests.push(Request {
            specifier: specifier.to_string(),
            offset: offset as usize,
        });
        format!("require({})", js_string(specifier))
    }

    fn statement(&mut self, source: &str, stmt: &Statement<'_>) {
        let span = stmt.span();
        match stmt {
            Statement::ImportDeclaration(decl) => {
                self.is_esm = true;
                let req = self.request(decl.source.value.as_str(), decl.source.span.start);
                let specifiers = decl.specifiers.as_ref().filter(|s| !s.is_empty());
                let text = match specifiers {
                    None => format!("{req};"),
                    Some(specifiers) => {
                        let ns = self.temp();
                        let mut parts = vec![format!("{ns} = {req}")];
                        for spec in specifiers {
                            match spec {
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                    let wrapped = self.temp();
                                    parts.push(format!("{wrapped} = __interopDefault({ns})"));
                                    self.imports.insert(
                                        s.local.symbol_id(),
                                        (s.local.name.to_string(), format!("{wrapped}[\"default\"]")),
                                    );
                                }
                                // The namespace object is itself live.
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                    parts.push(format!("{} = {ns}", s.local.name));
                                }
                                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                    self.imports.insert(
                                        s.local.symbol_id(),
                                        (
                                            s.local.name.to_string(),
                                            format!("{ns}[{}]", js_string(s.imported.name().as_str())),
                                        ),
                                    );
                                }
                            }
                        }
                        format!("var {};", parts.join(", "))
                    }
                };
                self.edit(span.start, span.end, text);
            }

            Statement::ExportNamedDeclaration(decl) => {
                self.is_esm = true;
                if let Some(from) = &decl.source {
                    let ns = self.temp();
                    let req = self.request(from.value.as_str(), from.span.start);
                    for spec in &decl.specifiers {
                        self.exports.push((
                            spec.exported.name().to_string(),
                            format!("{ns}[{}]", js_string(spec.local.name().as_str())),
                        ));
                    }
                    self.edit(span.start, span.end, format!("var {ns} = {req};"));
                } else if let Some(declaration) = &decl.declaration {
                    for name in declared_names(declaration) {
                        self.exports.push((name.clone(), name));
                    }
                    self.edit(span.start, declaration.span().start, "");
                } else {
                    for spec in &decl.specifiers {
                        self.exports.push((
                            spec.exported.name().to_string(),
                            spec.local.name().to_string(),
                        ));
                    }
                    self.edit(span.start, span.end, "");
                }
            }

            Statement::ExportDefaultDeclaration(decl) => {
                self.is_esm = true;
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => f
                        .id
                        .as_ref()
                        .map(|id| (f.span.start, id.name.to_string())),
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => c
                        .id
                        .as_ref()
                        .map(|id| (c.span.start, id.name.to_string())),
                    _ => None,
                };
                match named {
                    // Keep the declaration so the name stays hoisted.
                    Some((start, name)) => {
                        self.exports.push(("default".into(), name));
                        self.edit(span.start, start, "");
                    }
                    None => {
                        let value_start = decl.declaration.span().start;
                        self.edit(span.start, value_start, "exports.default = ");
                        if !source[..span.end as usize].trim_end().ends_with(';') {
                            self.edit(span.end, span.end, ";");
                        }
                    }
                }
            }

            Statement::ExportAllDeclaration(decl) => {
                self.is_esm = true;
                let req = self.request(decl.source.value.as_str(), decl.source.span.start);
                match &decl.exported {
                    Some(name) => {
                        let ns = self.temp();
                        self.exports.push((name.name().to_string(), ns.clone()));
                        self.edit(span.start, span.end, format!("var {ns} = {req};"));
                    }
                    None => {
                        self.edit(span.start, span.end, format!("__exportStar({req}, exports);"));
                    }
                }
            }

            _ => {}
        }
    }

    /// `"use strict"` plus the `__esModule` marker and one getter per export.
    ///
    /// Re-exported imports read through the required module.
    fn header(&self) -> String {
        let mut header = String::from(
            "\"use strict\"; Object.defineProperty(exports, \"__esModule\", { value: true }); ",
        );
        for (name, value) in &self.exports {
            let value = self
                .imports
                .values()
                .find(|(local, _)| local == value)
                .map_or(value.as_str(), |(_, read)| read.as_str());
            header.push_str(&format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {value}; }} }}); ",
                js_string(name)
            ));
        }
        header
    }
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// `require("literal")` calls anywhere in the program.
#[derive(Default)]
struct RequireCollector {
    found: Vec<Request>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee
            && callee.name.as_str() == "require"
            && call.arguments.len() == 1
            && let Argument::StringLiteral(lit) = &call.arguments[0]
        {
            self.found.push(Request {
                specifier: lit.value.to_string(),
                offset: lit.span.start as usize,
            });
        }
        walk::walk_call_expression(self, call);
    }
}

/// Replaces every reference to an imported binding with its module read.
struct ImportRefs<'s> {
    scoping: &'s Scoping,
    imports: &'s FxHashMap<SymbolId, (String, String)>,
    edits: Vec<Edit>,
}

impl<'s> ImportRefs<'s> {
    fn read_for(&self, ident: &IdentifierReference<'_>) -> Option<&'s str> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.imports.get(&symbol).map(|(_, read)| read.as_str())
    }

    fn replace(&mut self, start: u32, end: u32, text: String) {
        self.edits.push(Edit {
            start: start as usize,
            end: end as usize,
            text,
        });
    }

    /// Callee position: `(0, m["f"])()` so `this` is not the module.
    fn callee(&mut self, callee: &Expression<'_>) -> bool {
        let Expression::Identifier(ident) = callee else {
            return false;
        };
        let Some(read) = self.read_for(ident) else {
            return false;
        };
        let text = format!("(0, {read})");
        self.replace(ident.span.start, ident.span.end, text);
        true
    }
}

impl<'a> Visit<'a> for ImportRefs<'_> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(read) = self.read_for(ident) {
            let text = read.to_string();
            self.replace(ident.span.start, ident.span.end, text);
        }
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if self.callee(&call.callee) {
            self.visit_arguments(&call.arguments);
        } else {
            walk::walk_call_expression(self, call);
        }
    }

    fn visit_tagged_template_expression(&mut self, tagged: &TaggedTemplateExpression<'a>) {
        if self.callee(&tagged.tag) {
            self.visit_template_literal(&tagged.quasi);
        } else {
            walk::walk_tagged_template_expression(self, tagged);
        }
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand
            && let Expression::Identifier(ident) = &prop.value
            && let Some(read) = self.read_for(ident)
        {
            let text = format!("{}: {read}", ident.name);
            self.replace(prop.span.start, prop.span.end, text);
            return;
        }
        walk::walk_object_property(self, prop);
    }

    // Export lists are rewritten as a whole by the statement pass.
    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &decl.declaration {
            self.visit_declaration(declaration);
        }
    }
}

/// Rewrite one module. Syntax errors come back as a diagnostic.
pub fn rewrite_module(path: &Path, source: &str) -> Compiled<Rewritten> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(err) = ret.errors.first() {
        let offset = err
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        return Err(Diagnostic::at_offset(path, source, offset, err.to_string()));
    }

    let mut collector = RequireCollector::default();
    collector.visit_program(&ret.program);

    let program = ret.program;
    let semantic = SemanticBuilder::new().build(&program).semantic;

    let mut rewriter = Rewriter::default();
    for stmt in &program.body {
        rewriter.statement(source, stmt);
    }

    if !rewriter.imports.is_empty() {
        let mut refs = ImportRefs {
            scoping: semantic.scoping(),
            imports: &rewriter.imports,
            edits: Vec::new(),
        };
        refs.visit_program(&program);
        let edits = refs.edits;
        rewriter.edits.extend(edits);
    }

    let mut code = if rewriter.is_esm {
        rewriter.header()
    } else {
        String::new()
    };
    code.push_str(&apply_edits(source, &mut rewriter.edits));

    let mut requests = rewriter.requests;
    requests.extend(collector.found);
    requests.sort_by_key(|r| r.offset);

    Ok(Rewritten { code, requests })
}

fn apply_edits(source: &str, edits: &mut [Edit]) -> String {
    edits.sort_by_key(|e| (e.start, e.end));

    let mut out = String::with_capacity(source.len() + edits.len() * 16);
    let mut cursor = 0;
    for edit in edits.iter() {
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.text);
        let newlines = source[edit.start..edit.end].matches('\n').count();
        out.extend(std::iter::repeat_n('\n', newlines));
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// JS string literal for `value`.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}
