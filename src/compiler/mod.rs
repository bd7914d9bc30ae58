//! In-process compilers for scripts and stylesheets.
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | `script`    | Module graph, ESM rewrite, transpile, bundle (oxc)   |
//! | `style`     | SCSS compile (grass), targets and maps (lightningcss) |
//! | `minify`    | Compress + mangle for finished bundles (oxc)         |
//! | `sourcemap` | Index source maps for bundles                        |
//!
//! Compile problems in user code are returned as [`Diagnostic`]s instead of
//! errors so a broken file never stops the pipeline. I/O failures stay
//! `anyhow` errors.

pub mod minify;
pub mod script;
pub mod sourcemap;
pub mod style;

use std::fmt;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;

/// Outcome of compiling user code: the artifact, or what is wrong with it.
pub type Compiled<T> = Result<T, Diagnostic>;

/// Unwrap a [`Compiled`] inside a function returning `anyhow::Result<Compiled<_>>`,
/// passing a diagnostic straight through.
macro_rules! try_compiled {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(diagnostic) => return Ok(Err(diagnostic)),
        }
    };
}
pub(crate) use try_compiled;

/// A recoverable compile problem tied to a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: PathBuf,
    /// 1-based.
    pub line: Option<usize>,
    /// 1-based, in characters.
    pub column: Option<usize>,
    pub message: String,
    /// Source excerpt with a caret under the reported column.
    pub frame: Option<String>,
}

impl Diagnostic {
    /// Diagnostic without a location.
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
            frame: None,
        }
    }

    /// Diagnostic at a byte offset into `source`.
    pub fn at_offset(
        file: impl Into<PathBuf>,
        source: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, column) = line_column(source, offset);
        Self::at_line(file, source, line, column, message)
    }

    /// Diagnostic at a 1-based line and column of `source`.
    pub fn at_line(
        file: impl Into<PathBuf>,
        source: &str,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
            message: message.into(),
            frame: code_frame(source, line, column),
        }
    }

    /// `file:line:column` with the file shown relative to `root`.
    pub fn location(&self, root: &Path) -> String {
        let file = self.file.strip_prefix(root).unwrap_or(&self.file);
        match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{}:{line}:{col}", file.display()),
            (Some(line), None) => format!("{}:{line}", file.display()),
            _ => file.display().to_string(),
        }
    }

    /// Message and code frame for the browser overlay, which shows the
    /// location separately.
    pub fn overlay_text(&self) -> String {
        let mut text = self.message.clone();
        if let Some(frame) = &self.frame {
            text.push_str("\n\n");
            text.push_str(frame);
        }
        text
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.location(Path::new("")).bold(),
            self.message
        )?;
        if let Some(frame) = &self.frame {
            write!(f, "\n{}", frame.dimmed())?;
        }
        Ok(())
    }
}

/// 1-based line and character column of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Two lines of context around `line` with a caret under `column`.
pub fn code_frame(source: &str, line: usize, column: usize) -> Option<String> {
    const CONTEXT: usize = 2;

    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }

    let first = line.saturating_sub(CONTEXT).max(1);
    let last = (line + CONTEXT).min(lines.len());
    let width = last.to_string().len();

    let mut frame = String::new();
    for n in first..=last {
        let marker = if n == line { '>' } else { ' ' };
        let text = lines[n - 1].trim_end();
        frame.push_str(&format!("{marker} {n:>width$} | {text}\n"));
        if n == line {
            let pad: String = lines[n - 1]
                .chars()
                .take(column.saturating_sub(1))
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            frame.push_str(&format!("  {:>width$} | {pad}^\n", ""));
        }
    }
    frame.pop();
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let src = "let a = 1;\nlet b = ;\n";
        assert_eq!(line_column(src, 0), (1, 1));
        assert_eq!(line_column(src, 19), (2, 9));
        assert_eq!(line_column(src, 1000), (3, 1));
    }

    #[test]
    fn test_line_column_multibyte() {
        let src = "const é = 1;";
        // byte 8 is the space after the two-byte é
        assert_eq!(line_column(src, 8), (1, 8));
    }

    #[test]
    fn test_code_frame() {
        let src = "a\nb\nc = ;\nd\ne\nf";
        let frame = code_frame(src, 3, 5).unwrap();
        let lines: Vec<_> = frame.lines().collect();
        assert_eq!(lines[0], "  1 | a");
        assert_eq!(lines[2], "> 3 | c = ;");
        assert_eq!(lines[3], "    |     ^");
        assert_eq!(lines.last(), Some(&"  5 | e"));
        assert!(code_frame(src, 42, 1).is_none());
    }

    #[test]
    fn test_location_relative() {
        let diag = Diagnostic::at_offset("/site/app/js/app.js", "x\ny", 2, "boom");
        assert_eq!(diag.location(Path::new("/site")), "app/js/app.js:2:1");
        assert!(diag.overlay_text().contains("boom"));
        assert_eq!(
            Diagnostic::new("/a.js", "m").location(Path::new("/")),
            "a.js"
        );
    }
}
