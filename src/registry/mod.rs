//! Path registry: where each asset category lives and where it is written.
//!
//! Built once from [`PipelineConfig`] and shared read-only by every task and
//! watch binding.

mod source;

pub use source::SourceSet;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{PipelineConfig, SourceOverride};
use crate::core::Profile;

/// Asset categories known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Scripts,
    Vendor,
    Styles,
    Images,
    Fonts,
    Assets,
    Html,
    Templates,
}

impl Category {
    pub const ALL: [Self; 8] = [
        Self::Scripts,
        Self::Vendor,
        Self::Styles,
        Self::Images,
        Self::Fonts,
        Self::Assets,
        Self::Html,
        Self::Templates,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scripts => "scripts",
            Self::Vendor => "vendor",
            Self::Styles => "styles",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Assets => "assets",
            Self::Html => "html",
            Self::Templates => "templates",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// Built-in layout: `(base, include, exclude, dest)`.
    ///
    /// `base` is relative to the source root, `dest` to the output root.
    /// Templates have no destination; they only trigger reloads.
    const fn defaults(
        self,
    ) -> (
        &'static str,
        &'static [&'static str],
        &'static [&'static str],
        Option<&'static str>,
    ) {
        match self {
            Self::Scripts => (
                "js",
                &["**/*.js", "**/*.mjs", "**/*.cjs"],
                &["vendor/**"],
                Some(""),
            ),
            Self::Vendor => ("js/vendor", &["**/*.js"], &[], Some("")),
            Self::Styles => ("scss", &["**/*.scss"], &[], Some("")),
            Self::Images => ("assets/img", &["**/*"], &[], Some("assets/img")),
            Self::Fonts => ("assets/fonts", &["**/*"], &[], Some("assets/fonts")),
            Self::Assets => ("assets", &["**/*"], &["img/**", "fonts/**"], Some("assets")),
            Self::Html => ("", &["*.html"], &[], Some("")),
            Self::Templates => (
                "",
                &[
                    "*.php",
                    "templates/**/*.php",
                    "templates/**/*.html.twig",
                    "**/*.yml",
                ],
                &[],
                None,
            ),
        }
    }

    fn config_override(self, config: &PipelineConfig) -> &SourceOverride {
        let paths = &config.paths;
        match self {
            Self::Scripts => &paths.scripts,
            Self::Vendor => &paths.vendor,
            Self::Styles => &paths.styles,
            Self::Images => &paths.images,
            Self::Fonts => &paths.fonts,
            Self::Assets => &paths.assets,
            Self::Html => &paths.html,
            Self::Templates => &paths.templates,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One registry row.
#[derive(Debug, Clone)]
struct Entry {
    sources: SourceSet,
    dest: Option<PathBuf>,
}

/// Immutable category -> (sources, destination) mapping.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    source_root: PathBuf,
    entries: Vec<Entry>,
}

impl PathRegistry {
    /// Merge config overrides onto the built-in layout and compile every glob.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let source_root = config.source_root();
        let entries = Category::ALL
            .iter()
            .map(|&category| {
                let (base, include, exclude, dest) = category.defaults();
                let over = category.config_override(config);

                let base = over
                    .base
                    .as_ref()
                    .map_or_else(|| source_root.join(base), |b| source_root.join(b));
                let include = over
                    .include
                    .clone()
                    .unwrap_or_else(|| include.iter().map(|s| s.to_string()).collect());
                let exclude = over
                    .exclude
                    .clone()
                    .unwrap_or_else(|| exclude.iter().map(|s| s.to_string()).collect());
                let dest = match dest {
                    Some(default) => Some(over.dest.clone().unwrap_or_else(|| default.into())),
                    None => None,
                };

                Ok(Entry {
                    sources: SourceSet::new(normalize(&base), &include, &exclude)?,
                    dest,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source_root,
            entries,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn sources(&self, category: Category) -> &SourceSet {
        &self.entries[category.index()].sources
    }

    /// Destination subdirectory relative to the output root.
    pub fn dest(&self, category: Category) -> Option<&Path> {
        self.entries[category.index()].dest.as_deref()
    }

    /// Destination directories for `profile`.
    pub fn resolve(&self, profile: &Profile) -> Destinations {
        let root = profile.output_root().to_path_buf();
        let dirs = Category::ALL
            .iter()
            .map(|&c| self.dest(c).map(|d| root.join(d)))
            .collect();
        Destinations { root, dirs }
    }
}

fn normalize(path: &Path) -> PathBuf {
    crate::utils::path::normalize_lexical(path)
}

/// Destination root and per-category directories for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    root: PathBuf,
    dirs: Vec<Option<PathBuf>>,
}

impl Destinations {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output directory for `category`, or `None` for watch-only categories.
    pub fn dir(&self, category: Category) -> Option<&Path> {
        self.dirs[category.index()].as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use crate::core::Environment;

    fn registry(content: &str) -> (PipelineConfig, PathRegistry) {
        let mut config = test_parse_config(content);
        config.root = PathBuf::from("/site");
        let registry = PathRegistry::from_config(&config).unwrap();
        (config, registry)
    }

    #[test]
    fn test_default_layout() {
        let (_, reg) = registry("");
        assert_eq!(reg.source_root(), Path::new("/site/app"));
        assert_eq!(reg.sources(Category::Scripts).base(), Path::new("/site/app/js"));
        assert_eq!(reg.sources(Category::Html).base(), Path::new("/site/app"));

        let scripts = reg.sources(Category::Scripts);
        assert!(scripts.matches(Path::new("/site/app/js/lib/esm.mjs")));
        assert!(scripts.matches(Path::new("/site/app/js/lib/legacy.cjs")));
        assert!(!scripts.matches(Path::new("/site/app/js/vendor/a.mjs")));
        assert_eq!(reg.dest(Category::Images), Some(Path::new("assets/img")));
        assert_eq!(reg.dest(Category::Templates), None);

        let assets = reg.sources(Category::Assets);
        assert!(assets.matches(Path::new("/site/app/assets/data/map.json")));
        assert!(!assets.matches(Path::new("/site/app/assets/img/logo.png")));
        assert!(!assets.matches(Path::new("/site/app/assets/fonts/a.woff2")));

        let templates = reg.sources(Category::Templates);
        assert!(templates.matches(Path::new("/site/app/index.php")));
        assert!(templates.matches(Path::new("/site/app/templates/a/b.html.twig")));
        assert!(templates.matches(Path::new("/site/app/config/site.yml")));
        assert!(!templates.matches(Path::new("/site/app/index.html")));
    }

    #[test]
    fn test_override_merges() {
        let (_, reg) =
            registry("[paths]\nsource = \"src\"\n[paths.images]\nbase = \"media\"\ndest = \"img\"");
        let images = reg.sources(Category::Images);
        assert_eq!(images.base(), Path::new("/site/src/media"));
        assert_eq!(images.include_patterns(), ["**/*"]);
        assert_eq!(reg.dest(Category::Images), Some(Path::new("img")));
    }

    #[test]
    fn test_resolve_per_profile() {
        let (config, reg) = registry("");
        let dev = Profile::new(
            Environment::Development,
            config.output_root(Environment::Development),
        );
        let prod = Profile::new(
            Environment::Production,
            config.output_root(Environment::Production),
        );

        let dev_dest = reg.resolve(&dev);
        let prod_dest = reg.resolve(&prod);
        assert_eq!(dev_dest.root(), Path::new("/site/dist/dev"));
        assert_eq!(
            prod_dest.dir(Category::Fonts),
            Some(Path::new("/site/dist/prod/assets/fonts"))
        );
        assert_eq!(dev_dest.dir(Category::Templates), None);
        for category in Category::ALL {
            if let (Some(a), Some(b)) = (dev_dest.dir(category), prod_dest.dir(category)) {
                assert!(!a.starts_with(b) && !b.starts_with(a));
            }
        }
    }
}
