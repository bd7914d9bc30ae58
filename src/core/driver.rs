//! Environment selection and the per-environment build profile.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Target environment of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    #[cfg(test)]
    pub const ALL: [Self; 2] = [Self::Development, Self::Production];

    /// Short name used in logs and CLI flags.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Development => "dev",
            Self::Production => "prod",
        }
    }

    pub const fn mode(self) -> BuildMode {
        match self {
            Self::Development => BuildMode::DEVELOPMENT,
            Self::Production => BuildMode::PRODUCTION,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment `{other}` (expected dev or prod)"
            )),
        }
    }
}

/// Transform switches that differ between environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Compress and mangle scripts, minify stylesheets.
    pub minify: bool,

    /// Emit `.map` files next to scripts and stylesheets.
    pub source_maps: bool,

    /// Re-encode images; otherwise they are copied verbatim.
    pub optimize_images: bool,
}

impl BuildMode {
    /// Production mode: optimized output without debug metadata.
    pub const PRODUCTION: Self = Self {
        minify: true,
        source_maps: false,
        optimize_images: true,
    };

    /// Development mode: readable output with source maps.
    pub const DEVELOPMENT: Self = Self {
        minify: false,
        source_maps: true,
        optimize_images: false,
    };
}

/// Everything a task needs to know about the environment it builds for.
///
/// Tasks never look at [`Environment`] directly; they read the switches and
/// the output root from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub env: Environment,
    pub mode: BuildMode,
    output_root: PathBuf,
}

impl Profile {
    pub fn new(env: Environment, output_root: impl Into<PathBuf>) -> Self {
        Self {
            env,
            mode: env.mode(),
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    #[inline]
    pub const fn minify(&self) -> bool {
        self.mode.minify
    }

    #[inline]
    pub const fn source_maps(&self) -> bool {
        self.mode.source_maps
    }

    #[inline]
    pub const fn optimize_images(&self) -> bool {
        self.mode.optimize_images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_str() {
        assert_eq!("dev".parse(), Ok(Environment::Development));
        assert_eq!("Production".parse(), Ok(Environment::Production));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_modes_are_opposite() {
        let dev = Environment::Development.mode();
        let prod = Environment::Production.mode();
        assert!(dev.source_maps && !dev.minify && !dev.optimize_images);
        assert!(!prod.source_maps && prod.minify && prod.optimize_images);
    }

    #[test]
    fn test_profile_carries_mode() {
        let profile = Profile::new(Environment::Production, "/tmp/out/prod");
        assert!(profile.minify());
        assert_eq!(profile.output_root(), Path::new("/tmp/out/prod"));
        assert_eq!(profile.env.to_string(), "prod");
    }
}
