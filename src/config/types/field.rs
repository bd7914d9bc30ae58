//! Dotted config field path, e.g. `output.dev`.

use owo_colors::OwoColorize;
use std::fmt;

/// Names the config field a diagnostic refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    #[inline]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a child segment: `paths` + `scripts` -> `paths.scripts`.
    pub fn join(&self, child: &str) -> Self {
        Self(format!("{}.{child}", self.0))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_args!("`{}`", self.0).bright_blue())
    }
}
