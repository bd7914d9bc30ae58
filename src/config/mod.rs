//! Pipeline configuration for `assetline.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── compile    # [scripts], [styles], [images]
//! │   ├── paths      # [paths], [output]
//! │   └── serve      # [serve], [watch]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # PipelineConfig (this file)
//! ```
//!
//! The file is optional. Without one, every section takes its defaults and the
//! project root is the current directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    ImagesConfig, OutputConfig, PathsConfig, ScriptsConfig, ServeConfig, SourceOverride,
    StylesConfig, WatchConfig,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::core::Environment;
use crate::log;
use crate::utils::path::normalize_lexical;
use anyhow::{Context, Result};
use lightningcss::targets::Browsers;
use oxc::transformer::TransformOptions;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "assetline.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing assetline.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Absolute path to the config file, if one was found
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Project root directory - parent of config file, or cwd
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub styles: StylesConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl PipelineConfig {
    /// Load and validate configuration.
    ///
    /// An explicit `--config` must exist. Otherwise `assetline.toml` is searched
    /// upward from cwd, and defaults rooted at cwd are used when none is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let found = match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::Io(
                        path,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                    )
                    .into());
                }
                Some(path)
            }
            None => find_config_file(Path::new(CONFIG_FILE)),
        };

        let config = match found {
            Some(path) => {
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                let mut config = Self::from_path(&path)?;
                config.root = root;
                config.config_path = Some(path);
                config
            }
            None => Self::with_root(&cwd),
        };

        config.validate()?;
        Ok(config)
    }

    /// Default configuration rooted at `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    // ========================================================================
    // resolved paths
    // ========================================================================

    /// Join a path with the project root.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        normalize_lexical(&self.root.join(path))
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Absolute source root.
    pub fn source_root(&self) -> PathBuf {
        self.root_join(&self.paths.source)
    }

    /// Absolute output root for `env`.
    pub fn output_root(&self, env: Environment) -> PathBuf {
        match env {
            Environment::Development => self.root_join(&self.output.dev),
            Environment::Production => self.root_join(&self.output.prod),
        }
    }

    /// Document root served by the dev server.
    pub fn serve_root(&self) -> PathBuf {
        match &self.serve.root {
            Some(root) => self.root_join(root),
            None => self.output_root(Environment::Development),
        }
    }

    /// Parsed browser targets for stylesheets.
    pub fn browsers(&self) -> Option<Browsers> {
        Browsers::from_browserslist(&self.styles.browsers)
            .ok()
            .flatten()
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.validate_outputs(&mut diag);
        self.validate_bundle_names(&mut diag);
        self.validate_globs(&mut diag);

        if let Err(err) = Browsers::from_browserslist(&self.styles.browsers) {
            diag.error_with_hint(
                "styles.browsers",
                format!("invalid browserslist query: {err}"),
                "e.g. [\"last 2 versions\", \"ie 11\"]",
            );
        }

        if let Err(err) = TransformOptions::from_target(&self.scripts.target) {
            diag.error_with_hint(
                "scripts.target",
                format!("invalid target `{}`: {err}", self.scripts.target),
                "use an ECMAScript version such as es2015 or es2020",
            );
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            diag.error(
                "images.jpeg_quality",
                format!("must be between 1 and 100, got {}", self.images.jpeg_quality),
            );
        }

        if self.serve.port == self.serve.reload_port {
            diag.error(
                "serve.reload_port",
                format!("must differ from serve.port ({})", self.serve.port),
            );
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    fn validate_outputs(&self, diag: &mut ConfigDiagnostics) {
        let dev = self.output_root(Environment::Development);
        let prod = self.output_root(Environment::Production);
        let source = self.source_root();

        if dev.starts_with(&prod) || prod.starts_with(&dev) {
            diag.error_with_hint(
                "output",
                format!(
                    "dev output `{}` and prod output `{}` overlap",
                    self.output.dev.display(),
                    self.output.prod.display()
                ),
                "use sibling directories such as dist/dev and dist/prod",
            );
        }

        for (field, out) in [("output.dev", &dev), ("output.prod", &prod)] {
            if out.starts_with(&source) || source.starts_with(out) {
                diag.error(
                    field,
                    format!(
                        "`{}` overlaps the source root `{}`",
                        self.root_relative(out).display(),
                        self.paths.source.display()
                    ),
                );
            }
            if out == &self.root {
                diag.error(field, "must not be the project root");
            }
        }
    }

    fn validate_bundle_names(&self, diag: &mut ConfigDiagnostics) {
        let names = [
            ("scripts.file", &self.scripts.file),
            ("scripts.vendor_file", &self.scripts.vendor_file),
        ];
        for (field, name) in names {
            if name.is_empty() || name.contains(['/', '\\']) {
                diag.error(field, format!("`{name}` must be a plain file name"));
            }
        }
        if self.scripts.file == self.scripts.vendor_file {
            diag.error_with_hint(
                "scripts.vendor_file",
                format!(
                    "vendor bundle name `{}` collides with the app bundle",
                    self.scripts.vendor_file
                ),
                "the defaults are app.js and vendor.js",
            );
        }
    }

    fn validate_globs(&self, diag: &mut ConfigDiagnostics) {
        let base = FieldPath::new("paths");
        let overrides = [
            ("scripts", &self.paths.scripts),
            ("vendor", &self.paths.vendor),
            ("styles", &self.paths.styles),
            ("images", &self.paths.images),
            ("fonts", &self.paths.fonts),
            ("assets", &self.paths.assets),
            ("html", &self.paths.html),
            ("templates", &self.paths.templates),
        ];
        for (name, over) in overrides {
            for pattern in over.patterns() {
                if let Err(err) = globset::Glob::new(pattern) {
                    diag.error(base.join(name), format!("invalid glob `{pattern}`: {err}"));
                }
            }
        }
    }
}

/// Parse a config snippet for tests, rejecting unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    let (parsed, ignored) = PipelineConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rooted(content: &str) -> PipelineConfig {
        let mut config = test_parse_config(content);
        config.root = PathBuf::from("/project");
        config
    }

    fn error_fields(config: &PipelineConfig) -> Vec<String> {
        let err = config.validate().unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Diagnostics(d)) => d
                .errors()
                .iter()
                .map(|e| e.field.as_str().to_string())
                .collect(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = rooted("");
        config.validate().unwrap();
        assert_eq!(
            config.output_root(Environment::Development),
            PathBuf::from("/project/dist/dev")
        );
        assert_eq!(config.serve_root(), PathBuf::from("/project/dist/dev"));
        assert!(config.browsers().is_some());
    }

    #[test]
    fn test_overlapping_outputs_rejected() {
        let config = rooted("[output]\ndev = \"dist\"\nprod = \"dist/prod\"");
        assert!(error_fields(&config).contains(&"output".to_string()));

        let config = rooted("[output]\ndev = \"out/./x/../dev\"\nprod = \"out/dev\"");
        assert!(error_fields(&config).contains(&"output".to_string()));
    }

    #[test]
    fn test_output_inside_source_rejected() {
        let config = rooted("[output]\ndev = \"app/build\"");
        assert_eq!(error_fields(&config), vec!["output.dev"]);
    }

    #[test]
    fn test_bundle_name_collision() {
        let config = rooted("[scripts]\nfile = \"bundle.js\"\nvendor_file = \"bundle.js\"");
        assert_eq!(error_fields(&config), vec!["scripts.vendor_file"]);
    }

    #[test]
    fn test_invalid_glob_and_target() {
        let config = rooted("[paths.styles]\ninclude = [\"**/*.{scss\"]\n[scripts]\ntarget = \"es1999\"");
        let fields = error_fields(&config);
        assert!(fields.contains(&"paths.styles".to_string()));
        assert!(fields.contains(&"scripts.target".to_string()));
    }

    #[test]
    fn test_jpeg_quality_range() {
        let config = rooted("[images]\njpeg_quality = 0");
        assert_eq!(error_fields(&config), vec!["images.jpeg_quality"]);
        assert!(rooted("[images]\njpeg_quality = 75").validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) =
            PipelineConfig::parse_with_ignored("[serve]\nport = 4000\nlivereload = true").unwrap();
        assert_eq!(ignored, vec!["serve.livereload"]);
    }

    #[test]
    fn test_load_explicit_missing() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/assetline.toml"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Io(..))
        ));
    }
}
