//! Vendor scripts concatenated into `vendor.js`.
//!
//! Files are joined in sorted path order. Their own `sourceMappingURL`
//! comments are dropped since the maps are not shipped.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use super::output::{ArtifactKind, write_artifact};
use super::{TaskContext, TaskReport};
use crate::compiler::Diagnostic;
use crate::compiler::minify::minify_js;
use crate::debug;
use crate::registry::Category;

/// `//# sourceMappingURL=...` and `/*# sourceMappingURL=... */` lines.
static MAP_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?://[#@][ \t]*sourceMappingURL=.*|/\*[#@][ \t]*sourceMappingURL=[^*]*\*/)[ \t]*$")
        .expect("valid regex")
});

/// One vendor file inside the concatenation.
struct Part {
    path: PathBuf,
    text: String,
    /// 1-based line where the file starts in the bundle.
    first_line: usize,
}

pub fn run(ctx: &TaskContext, report: &mut TaskReport) -> Result<()> {
    let sources = ctx.registry.sources(Category::Vendor);
    let files = sources.scan()?;
    if files.is_empty() {
        debug!("vendor"; "no vendor scripts");
        return Ok(());
    }
    let Some(dest) = ctx.destinations().dir(Category::Vendor).map(|d| d.to_path_buf()) else {
        return Ok(());
    };

    let mut parts = Vec::with_capacity(files.len());
    let mut bundle = String::new();
    let mut line = 1;
    for path in files {
        let raw =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let text = strip_map_comments(&raw);
        bundle.push_str(&text);
        bundle.push('\n');
        parts.push(Part {
            path,
            first_line: line,
            text,
        });
        line += parts.last().map_or(0, |p| p.text.matches('\n').count() + 1);
    }

    let code = if ctx.profile.minify() {
        match minify_js(sources.base(), &bundle) {
            Ok(code) => code,
            Err(diag) => {
                report.diagnostics.push(attribute(diag, &parts));
                return Ok(());
            }
        }
    } else {
        bundle
    };

    let file = dest.join(&ctx.config.scripts.vendor_file);
    write_artifact(report, &file, ArtifactKind::Bundle, code)
}

/// Remove map links and trailing blank lines.
fn strip_map_comments(source: &str) -> String {
    MAP_COMMENT.replace_all(source, "").trim_end().to_string()
}

/// Point a diagnostic on the concatenation back at the vendor file it hit.
fn attribute(diag: Diagnostic, parts: &[Part]) -> Diagnostic {
    let Some(line) = diag.line else {
        return diag;
    };
    let Some(part) = parts.iter().rev().find(|p| p.first_line <= line) else {
        return diag;
    };
    let local = line - part.first_line + 1;
    Diagnostic::at_line(
        &part.path,
        &part.text,
        local,
        diag.column.unwrap_or(1),
        diag.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Environment;
    use crate::task::tests::Fixture;
    use crate::task::{TaskId, run_task};

    #[test]
    fn test_strip_map_comments() {
        let src = "var a = 1;\n//# sourceMappingURL=a.js.map\n/*# sourceMappingURL=b.map */\n";
        assert_eq!(strip_map_comments(src), "var a = 1;");
        let keep = "var url = '//# sourceMappingURL=x';";
        assert_eq!(strip_map_comments(keep), keep);
    }

    #[test]
    fn test_concat_in_sorted_order() {
        let fx = Fixture::new();
        fx.source("js/vendor/b.js", "var b = 2;\n//# sourceMappingURL=b.js.map\n");
        fx.source("js/vendor/a.js", "var a = 1;\n");

        let report = run_task(TaskId::Vendor, &fx.context(Environment::Development)).unwrap();

        assert_eq!(report.artifacts.len(), 1);
        let out = fs::read_to_string(fx.output(Environment::Development, "vendor.js")).unwrap();
        assert_eq!(out, "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_prod_vendor_keeps_globals() {
        let fx = Fixture::new();
        fx.source("js/vendor/lib.js", "var VendorLib = { version: 1 };\nfunction vendorHelper(x) { return x; }\n");

        let report = run_task(TaskId::Vendor, &fx.context(Environment::Production)).unwrap();

        assert!(report.diagnostics.is_empty());
        let out = fs::read_to_string(fx.output(Environment::Production, "vendor.js")).unwrap();
        assert!(out.contains("VendorLib"), "{out}");
        assert!(out.contains("vendorHelper"), "{out}");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_empty_vendor_writes_nothing() {
        let fx = Fixture::new();
        let report = run_task(TaskId::Vendor, &fx.context(Environment::Production)).unwrap();
        assert!(report.artifacts.is_empty());
        assert!(!fx.output(Environment::Production, "vendor.js").exists());
    }

    #[test]
    fn test_minify_error_points_at_file() {
        let fx = Fixture::new();
        fx.source("js/vendor/a.js", "var a = 1;\nvar b = 2;\n");
        fx.source("js/vendor/b.js", "var ok = 1;\nvar = ;\n");

        let report = run_task(TaskId::Vendor, &fx.context(Environment::Production)).unwrap();

        assert!(report.artifacts.is_empty());
        let diag = &report.diagnostics[0];
        assert!(diag.file.ends_with("b.js"));
        assert_eq!(diag.line, Some(2));
    }
}
