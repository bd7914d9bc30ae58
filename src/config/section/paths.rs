//! `[paths]` and `[output]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! source = "app"              # Source root, every category base is relative to it
//!
//! [paths.scripts]
//! base = "js"
//! include = ["**/*.js"]
//! exclude = ["vendor/**"]
//!
//! [paths.images]
//! dest = "static/img"         # Destination under the output root
//!
//! [output]
//! dev = "dist/dev"
//! prod = "dist/prod"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Source root, relative to the project root.
    pub source: PathBuf,

    pub scripts: SourceOverride,
    pub vendor: SourceOverride,
    pub styles: SourceOverride,
    pub images: SourceOverride,
    pub fonts: SourceOverride,
    pub assets: SourceOverride,
    pub html: SourceOverride,
    pub templates: SourceOverride,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("app"),
            scripts: SourceOverride::default(),
            vendor: SourceOverride::default(),
            styles: SourceOverride::default(),
            images: SourceOverride::default(),
            fonts: SourceOverride::default(),
            assets: SourceOverride::default(),
            html: SourceOverride::default(),
            templates: SourceOverride::default(),
        }
    }
}

/// Per-category override. Unset fields keep the category default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    /// Base directory, relative to `paths.source`.
    pub base: Option<PathBuf>,
    /// Globs relative to `base`.
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    /// Destination directory, relative to the output root.
    pub dest: Option<PathBuf>,
}

impl SourceOverride {
    /// All glob patterns set by this override.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.include
            .iter()
            .chain(self.exclude.iter())
            .flatten()
            .map(String::as_str)
    }
}

/// Output roots per environment, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dev: PathBuf,
    pub prod: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dev: PathBuf::from("dist/dev"),
            prod: PathBuf::from("dist/prod"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::PathBuf;

    #[test]
    fn test_paths_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.paths.source, PathBuf::from("app"));
        assert!(config.paths.scripts.base.is_none());
        assert_eq!(config.output.dev, PathBuf::from("dist/dev"));
        assert_eq!(config.output.prod, PathBuf::from("dist/prod"));
    }

    #[test]
    fn test_paths_override() {
        let config = test_parse_config(
            "[paths]\nsource = \"src\"\n[paths.scripts]\nbase = \"scripts\"\nexclude = [\"legacy/**\"]",
        );
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(
            config.paths.scripts.base.as_deref(),
            Some(std::path::Path::new("scripts"))
        );
        assert_eq!(
            config.paths.scripts.patterns().collect::<Vec<_>>(),
            vec!["legacy/**"]
        );
        assert!(config.paths.scripts.include.is_none());
    }
}
