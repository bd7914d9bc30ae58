//! Task functions: one per asset category, all driven by a [`Profile`].
//!
//! | Task      | Reads                  | Writes                               |
//! |-----------|------------------------|--------------------------------------|
//! | `clean`   | -                      | removes the output root              |
//! | `scripts` | scripts entry + graph  | `app.js` (+ `app.js.map` in dev)     |
//! | `vendor`  | vendor scripts         | `vendor.js`                          |
//! | `styles`  | non-partial `.scss`    | `<name>.css` (+ `.css.map` in dev)   |
//! | `images`  | images                 | optimized (prod) or verbatim copies  |
//! | `assets`  | fonts + static assets  | verbatim copies                      |
//! | `pages`   | html pages             | verbatim copies                      |
//!
//! Compile problems are collected in the [`TaskReport`]; only I/O failures
//! and missing inputs are errors.

mod clean;
mod copy;
mod images;
mod output;
mod scripts;
mod styles;
mod vendor;

pub use output::Artifact;
#[cfg(test)]
pub use output::ArtifactKind;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::compiler::Diagnostic;
use crate::config::PipelineConfig;
use crate::core::Profile;
use crate::log;
use crate::registry::{Category, Destinations, PathRegistry};
use crate::utils::plural_count;

// ============================================================================
// Task identity
// ============================================================================

/// Every task the composer and the watch bindings can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Clean,
    Scripts,
    Vendor,
    Styles,
    Images,
    Assets,
    Pages,
}

impl TaskId {
    pub const ALL: [Self; 7] = [
        Self::Clean,
        Self::Scripts,
        Self::Vendor,
        Self::Styles,
        Self::Images,
        Self::Assets,
        Self::Pages,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Scripts => "scripts",
            Self::Vendor => "vendor",
            Self::Styles => "styles",
            Self::Images => "images",
            Self::Assets => "assets",
            Self::Pages => "pages",
        }
    }

    /// Registry categories the task reads.
    pub const fn categories(self) -> &'static [Category] {
        match self {
            Self::Clean => &[],
            Self::Scripts => &[Category::Scripts],
            Self::Vendor => &[Category::Vendor],
            Self::Styles => &[Category::Styles],
            Self::Images => &[Category::Images],
            Self::Assets => &[Category::Fonts, Category::Assets],
            Self::Pages => &[Category::Html],
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|id| id.name()).collect();
                format!("unknown task `{s}` (expected one of {})", names.join(", "))
            })
    }
}

// ============================================================================
// Transform chains
// ============================================================================

/// One stage of a task, as listed by `assetline list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Remove,
    Bundle,
    Transpile,
    Concat,
    StripMaps,
    CompileScss,
    Prefix,
    FlexbugFix,
    SourceMap,
    Minify,
    Optimize,
    Copy,
    Write,
}

impl Transform {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Bundle => "bundle",
            Self::Transpile => "transpile",
            Self::Concat => "concat",
            Self::StripMaps => "strip-maps",
            Self::CompileScss => "scss",
            Self::Prefix => "prefix",
            Self::FlexbugFix => "flexbugs",
            Self::SourceMap => "source-map",
            Self::Minify => "minify",
            Self::Optimize => "optimize",
            Self::Copy => "copy",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A task together with the transforms it applies under one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub categories: &'static [Category],
    pub transforms: Vec<Transform>,
}

impl TaskSpec {
    /// Derive the chain from the profile switches.
    pub fn for_profile(id: TaskId, profile: &Profile) -> Self {
        use Transform::*;

        let finish = |chain: &mut Vec<Transform>| {
            if profile.minify() {
                chain.push(Minify);
            } else if profile.source_maps() {
                chain.push(SourceMap);
            }
            chain.push(Write);
        };

        let transforms = match id {
            TaskId::Clean => vec![Remove],
            TaskId::Scripts => {
                let mut chain = vec![Bundle, Transpile];
                finish(&mut chain);
                chain
            }
            TaskId::Vendor => {
                let mut chain = vec![Concat, StripMaps];
                if profile.minify() {
                    chain.push(Minify);
                }
                chain.push(Write);
                chain
            }
            TaskId::Styles => {
                let mut chain = vec![CompileScss, Prefix, FlexbugFix];
                finish(&mut chain);
                chain
            }
            TaskId::Images if profile.optimize_images() => vec![Optimize, Write],
            TaskId::Images | TaskId::Assets | TaskId::Pages => vec![Copy],
        };

        Self {
            id,
            categories: id.categories(),
            transforms,
        }
    }

    /// `bundle → transpile → minify → write`
    pub fn chain(&self) -> String {
        self.transforms
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

// ============================================================================
// Context and reports
// ============================================================================

/// Everything a task reads. Cheap to clone; shared across concurrent tasks.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub profile: Profile,
    pub registry: Arc<PathRegistry>,
    pub config: Arc<PipelineConfig>,
}

impl TaskContext {
    pub fn new(profile: Profile, registry: Arc<PathRegistry>, config: Arc<PipelineConfig>) -> Self {
        Self {
            profile,
            registry,
            config,
        }
    }

    pub fn destinations(&self) -> Destinations {
        self.registry.resolve(&self.profile)
    }

    /// Path shown in logs, relative to the project root.
    pub fn display_path(&self, path: &Path) -> String {
        self.config.root_relative(path).display().to_string()
    }
}

/// What one task run produced.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskId,
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

impl TaskReport {
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Print diagnostics with paths relative to `root`.
    pub fn log_diagnostics(&self, root: &Path) {
        for diag in &self.diagnostics {
            log!("error"; "{}: {}", diag.location(root), diag.message);
            if let Some(frame) = &diag.frame {
                eprintln!("{frame}");
            }
        }
    }
}

/// Run one task to completion.
///
/// Blocking; the composer calls it from `spawn_blocking`.
pub fn run_task(id: TaskId, ctx: &TaskContext) -> Result<TaskReport> {
    let started = Instant::now();
    let mut report = TaskReport::new(id);

    match id {
        TaskId::Clean => clean::run(ctx, &mut report)?,
        TaskId::Scripts => scripts::run(ctx, &mut report)?,
        TaskId::Vendor => vendor::run(ctx, &mut report)?,
        TaskId::Styles => styles::run(ctx, &mut report)?,
        TaskId::Images => images::run(ctx, &mut report)?,
        TaskId::Assets => {
            copy::run(ctx, Category::Fonts, &mut report)?;
            copy::run(ctx, Category::Assets, &mut report)?;
        }
        TaskId::Pages => copy::run(ctx, Category::Html, &mut report)?,
    }

    report.duration = started.elapsed();
    if report.has_diagnostics() {
        report.log_diagnostics(&ctx.config.root);
    }
    if id != TaskId::Clean {
        log!(
            id.name();
            "{} written in {:.0?}{}",
            plural_count(report.artifacts.len(), "file"),
            report.duration,
            match report.diagnostics.len() {
                0 => String::new(),
                n => format!(", {}", plural_count(n, "error")),
            }
        );
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::Environment;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Project with the default layout under a temp dir.
    pub(crate) struct Fixture {
        pub dir: TempDir,
        pub config: Arc<PipelineConfig>,
        pub registry: Arc<PathRegistry>,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = crate::utils::path::normalize_path(dir.path());
            let config = PipelineConfig::with_root(&root);
            let registry = PathRegistry::from_config(&config).unwrap();
            Self {
                dir,
                config: Arc::new(config),
                registry: Arc::new(registry),
            }
        }

        pub fn root(&self) -> &Path {
            &self.config.root
        }

        /// Write `content` to `app/<rel>`.
        pub fn source(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
            let path = self.root().join("app").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        pub fn context(&self, env: Environment) -> TaskContext {
            let profile = Profile::new(env, self.config.output_root(env));
            TaskContext::new(profile, self.registry.clone(), self.config.clone())
        }

        /// Path under the output root of `env`.
        pub fn output(&self, env: Environment, rel: &str) -> PathBuf {
            self.config.output_root(env).join(rel)
        }
    }

    #[test]
    fn test_task_id_from_str() {
        assert_eq!("styles".parse(), Ok(TaskId::Styles));
        assert_eq!("Pages".parse(), Ok(TaskId::Pages));
        let err = "fonts".parse::<TaskId>().unwrap_err();
        assert!(err.contains("clean, scripts"));
    }

    #[test]
    fn test_chains_follow_profile() {
        let dev = Profile::new(Environment::Development, "/out/dev");
        let prod = Profile::new(Environment::Production, "/out/prod");

        assert_eq!(
            TaskSpec::for_profile(TaskId::Scripts, &dev).chain(),
            "bundle → transpile → source-map → write"
        );
        assert_eq!(
            TaskSpec::for_profile(TaskId::Scripts, &prod).chain(),
            "bundle → transpile → minify → write"
        );
        assert_eq!(
            TaskSpec::for_profile(TaskId::Images, &prod).transforms,
            vec![Transform::Optimize, Transform::Write]
        );
        assert_eq!(
            TaskSpec::for_profile(TaskId::Images, &dev).transforms,
            vec![Transform::Copy]
        );
        assert!(!TaskSpec::for_profile(TaskId::Vendor, &dev)
            .transforms
            .contains(&Transform::SourceMap));
    }

    #[test]
    fn test_assets_task_covers_fonts() {
        let fx = Fixture::new();
        fx.source("assets/fonts/a.woff2", b"font");
        fx.source("assets/data/x.json", b"{}");
        fx.source("assets/img/skip.png", b"png");

        let report = run_task(TaskId::Assets, &fx.context(Environment::Development)).unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert!(fx.output(Environment::Development, "assets/fonts/a.woff2").is_file());
        assert!(fx.output(Environment::Development, "assets/data/x.json").is_file());
        assert!(!fx.output(Environment::Development, "assets/img/skip.png").exists());
    }
}
