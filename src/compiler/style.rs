//! Stylesheet pipeline.
//!
//! ```text
//! .scss ─► grass ─► lightningcss (targets, prefixes) ─► flexbug fixes ─► map | minify
//! ```
//!
//! grass emits no source maps, so development maps produced by lightningcss
//! point into the compiled CSS, which is embedded as `sourcesContent`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use regex::{Captures, Regex};

use super::sourcemap::css_map_comment;
use super::{Compiled, Diagnostic};

/// Location trailer in grass errors: `./path:3:14` (unicode output) or
/// `  path 3:14  root stylesheet` (ascii output).
static GRASS_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?P<file>.+?)(?::|\s+)(?P<line>\d+):(?P<col>\d+)(?:\s+root stylesheet)?\s*$")
        .expect("valid regex")
});

/// `flex` shorthand declarations, prefixed or not.
static FLEX_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?P<pre>^|[{;\s])(?P<prop>(?:-(?:webkit|ms)-)?flex)(?P<colon>\s*:\s*)(?P<value>[^;{}!]*?)(?P<end>\s*(?:!important)?\s*[;}])")
        .expect("valid regex")
});

/// Zero length in any unit, or unitless.
static ZERO_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?0*\.?0+(?:px|em|rem|pt|pc|in|cm|mm|ex|ch|vw|vh|vmin|vmax)?$").expect("valid regex"));

/// Settings shared by every stylesheet of a run.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub browsers: Option<Browsers>,
    pub minify: bool,
    pub source_maps: bool,
    pub flexbugs: bool,
    pub load_paths: Vec<PathBuf>,
}

/// Final CSS for one entry stylesheet.
#[derive(Debug, Clone)]
pub struct CompiledStyle {
    pub css: String,
    pub map: Option<String>,
}

/// Compile one `.scss` entry.
///
/// `file_name` is the output name (`main.css`), used for the map link.
pub fn compile_stylesheet(
    path: &Path,
    file_name: &str,
    options: &StyleOptions,
) -> Result<Compiled<CompiledStyle>> {
    let mut grass_options = grass::Options::default().quiet(true);
    if let Some(dir) = path.parent() {
        grass_options = grass_options.load_path(dir);
    }
    for load_path in &options.load_paths {
        grass_options = grass_options.load_path(load_path);
    }

    let css = match grass::from_path(path, &grass_options) {
        Ok(css) => css,
        Err(err) => return Ok(Err(grass_diagnostic(path, &err.to_string()))),
    };

    let targets = Targets {
        browsers: options.browsers,
        ..Targets::default()
    };

    let mut sheet = match StyleSheet::parse(
        &css,
        ParserOptions {
            filename: file_name.to_string(),
            ..ParserOptions::default()
        },
    ) {
        Ok(sheet) => sheet,
        Err(err) => {
            let diag = match &err.loc {
                Some(loc) => Diagnostic::at_line(
                    path,
                    &css,
                    loc.line as usize + 1,
                    loc.column as usize,
                    err.kind.to_string(),
                ),
                None => Diagnostic::new(path, err.kind.to_string()),
            };
            return Ok(Err(diag));
        }
    };

    if let Err(err) = sheet.minify(MinifyOptions {
        targets,
        ..MinifyOptions::default()
    }) {
        return Ok(Err(Diagnostic::new(path, err.kind.to_string())));
    }

    let mut source_map = options.source_maps.then(|| SourceMap::new("/"));
    let printed = sheet
        .to_css(PrinterOptions {
            minify: options.minify,
            source_map: source_map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|err| anyhow!("failed to print {}: {err}", path.display()))?;

    let mut out = printed.code;
    if options.flexbugs {
        out = fix_flexbugs(&out);
    }

    let map = match source_map.as_mut() {
        Some(map) => {
            // Empty output has no source entry to attach content to.
            map.set_source_content(0, &css).ok();
            let json = map
                .to_json(None)
                .map_err(|err| anyhow!("source map for {}: {err:?}", path.display()))?;
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&css_map_comment(&format!("{file_name}.map")));
            Some(json)
        }
        None => None,
    };

    Ok(Ok(CompiledStyle { css: out, map }))
}

/// Rewrite `flex` shorthands IE 10/11 misread.
///
/// - `flex: N` becomes `N 1 0%`, `flex: N M` becomes `N M 0%`
/// - a zero basis (`0`, `0px`, ...) becomes `0%`
///
/// IE drops the whole declaration for a unitless basis and treats a `0px`
/// basis inside the shorthand as `auto`.
pub fn fix_flexbugs(css: &str) -> String {
    FLEX_SHORTHAND
        .replace_all(css, |caps: &Captures<'_>| {
            let value = match fixed_flex_value(&caps["value"]) {
                Some(value) => value,
                None => caps["value"].to_string(),
            };
            format!(
                "{}{}{}{}{}",
                &caps["pre"], &caps["prop"], &caps["colon"], value, &caps["end"]
            )
        })
        .into_owned()
}

/// `None` when the value is already safe or not a numeric shorthand.
fn fixed_flex_value(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let is_number = |v: &str| v.parse::<f64>().is_ok();
    match parts.as_slice() {
        [grow] if is_number(grow) => Some(format!("{grow} 1 0%")),
        [grow, shrink] if is_number(grow) && is_number(shrink) => {
            Some(format!("{grow} {shrink} 0%"))
        }
        [grow, shrink, basis]
            if is_number(grow) && is_number(shrink) && ZERO_LENGTH.is_match(basis) =>
        {
            Some(format!("{grow} {shrink} 0%"))
        }
        _ => None,
    }
}

fn grass_diagnostic(path: &Path, text: &str) -> Diagnostic {
    let message = text
        .lines()
        .next()
        .unwrap_or("scss compile error")
        .trim_start_matches("Error: ")
        .to_string();

    let located = GRASS_LOCATION.captures_iter(text).find_map(|caps| {
        let line = caps["line"].parse().ok()?;
        let col = caps["col"].parse().ok()?;
        let name = &caps["file"];
        let file = Path::new(name.strip_prefix("./").unwrap_or(name));
        let file = if file.is_absolute() || file.is_file() {
            file.to_path_buf()
        } else {
            path.parent()
                .map_or_else(|| file.to_path_buf(), |dir| dir.join(file))
        };
        Some((file, line, col))
    });

    let frame = text
        .lines()
        .skip(1)
        .take_while(|l| !GRASS_LOCATION.is_match(l))
        .collect::<Vec<_>>()
        .join("\n");

    Diagnostic {
        file: located
            .as_ref()
            .filter(|(file, ..)| file.is_file())
            .map_or_else(|| path.to_path_buf(), |(file, ..)| file.clone()),
        line: located.as_ref().map(|(_, line, _)| *line),
        column: located.as_ref().map(|(.., col)| *col),
        message,
        frame: (!frame.trim().is_empty()).then_some(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn options(minify: bool, source_maps: bool) -> StyleOptions {
        StyleOptions {
            browsers: Browsers::from_browserslist(["last 2 versions", "ie 11"]).unwrap(),
            minify,
            source_maps,
            flexbugs: true,
            load_paths: Vec::new(),
        }
    }

    fn scss(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_fix_flexbugs() {
        assert_eq!(fix_flexbugs(".a { flex: 1; }"), ".a { flex: 1 1 0%; }");
        assert_eq!(fix_flexbugs(".a{flex:2}"), ".a{flex:2 1 0%}");
        assert_eq!(fix_flexbugs(".a{-ms-flex:1;}"), ".a{-ms-flex:1 1 0%;}");
        assert_eq!(fix_flexbugs(".a { flex: 1 1 auto; }"), ".a { flex: 1 1 auto; }");
        assert_eq!(fix_flexbugs(".a { flex: none; }"), ".a { flex: none; }");
        assert_eq!(fix_flexbugs(".a { flex: 1 1 20px; }"), ".a { flex: 1 1 20px; }");
    }

    #[test]
    fn test_fix_flexbugs_zero_basis() {
        assert_eq!(fix_flexbugs(".a{flex:1 1 0}"), ".a{flex:1 1 0%}");
        assert_eq!(fix_flexbugs(".a{flex:1 0 0px}"), ".a{flex:1 0 0%}");
        assert_eq!(fix_flexbugs(".a{flex:2 1 0.0em;}"), ".a{flex:2 1 0%;}");
        assert_eq!(fix_flexbugs(".a { flex: 1 2; }"), ".a { flex: 1 2 0%; }");
        assert_eq!(
            fix_flexbugs(".a { -ms-flex: 1 1 0 !important; }"),
            ".a { -ms-flex: 1 1 0% !important; }"
        );
        assert_eq!(fix_flexbugs(".a{flex:1 1 0%}"), ".a{flex:1 1 0%}");
        assert_eq!(fix_flexbugs(".a { flex-grow: 1; }"), ".a { flex-grow: 1; }");
        assert_eq!(
            fix_flexbugs(".a { -webkit-box-flex: 1; }"),
            ".a { -webkit-box-flex: 1; }"
        );
    }

    #[test]
    fn test_grass_location_unicode_trailer() {
        let dir = TempDir::new().unwrap();
        let main = scss(&dir, "main.scss", "a {\n  b: c;\n  color: $missing;\n}\n");
        let text = format!(
            "Error: Undefined variable.\n  ╷\n3 │   color: $missing;\n  │          ^^^^^^^^\n  ╵\n./{}:3:10\n",
            main.display()
        );

        let diag = grass_diagnostic(&main, &text);
        assert_eq!(diag.message, "Undefined variable.");
        assert_eq!(diag.file, main);
        assert_eq!(diag.line, Some(3));
        assert_eq!(diag.column, Some(10));
        let frame = diag.frame.unwrap();
        assert!(frame.contains("color: $missing"));
        assert!(!frame.contains("main.scss:"));
    }

    #[test]
    fn test_grass_location_ascii_trailer() {
        let dir = TempDir::new().unwrap();
        let main = scss(&dir, "main.scss", "a {\n  color: $missing;\n}\n");
        let partial = scss(&dir, "_vars.scss", "$x: $missing;\n");
        let text = "Error: Undefined variable.\n  ,\n1 | $x: $missing;\n  |     ^^^^^^^^\n  '\n  _vars.scss 1:5  root stylesheet\n";

        let diag = grass_diagnostic(&main, text);
        assert_eq!(diag.file, partial);
        assert_eq!(diag.line, Some(1));
        assert_eq!(diag.column, Some(5));
        assert!(!diag.frame.unwrap().contains("root stylesheet"));
    }

    #[test]
    fn test_dev_output_has_map() {
        let dir = TempDir::new().unwrap();
        scss(&dir, "_vars.scss", "$accent: #c33;\n");
        let main = scss(&dir, "main.scss", "@import 'vars';\n.btn { color: $accent; .icon { display: flex; } }\n");

        let out = compile_stylesheet(&main, "main.css", &options(false, true))
            .unwrap()
            .unwrap();
        assert!(out.css.contains(".btn .icon"));
        assert!(out.css.ends_with("/*# sourceMappingURL=main.css.map */\n"));
        let map: serde_json::Value = serde_json::from_str(&out.map.unwrap()).unwrap();
        assert_eq!(map["version"], 3);
    }

    #[test]
    fn test_prod_output_minified() {
        let dir = TempDir::new().unwrap();
        let main = scss(&dir, "main.scss", ".a {\n  color: red;\n}\n\n.b {\n  color: blue;\n}\n");

        let out = compile_stylesheet(&main, "main.css", &options(true, false))
            .unwrap()
            .unwrap();
        assert!(out.map.is_none());
        assert!(!out.css.contains("sourceMappingURL"));
        assert!(!out.css.contains('\n'));
        assert!(out.css.contains(".a{color:red}"));
    }

    #[test]
    fn test_syntax_error_is_diagnostic() {
        let dir = TempDir::new().unwrap();
        let main = scss(&dir, "main.scss", ".a {\n  color: red;\n  .b { color: $missing; }\n}\n");

        let diag = compile_stylesheet(&main, "main.css", &options(false, true))
            .unwrap()
            .unwrap_err();
        assert!(diag.message.contains("Undefined variable"));
        assert!(diag.file.ends_with("main.scss"));
        assert_eq!(diag.line, Some(3));
        assert_eq!(diag.column, Some(15));
    }
}
