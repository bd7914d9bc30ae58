//! Application bundle: entry + module graph -> `app.js`.

use anyhow::{Result, anyhow};
use oxc::transformer::TransformOptions;

use super::output::{ArtifactKind, write_artifact};
use super::{TaskContext, TaskReport};
use crate::compiler::script::{ScriptOptions, bundle_scripts};
use crate::debug;
use crate::registry::Category;

pub fn run(ctx: &TaskContext, report: &mut TaskReport) -> Result<()> {
    let config = &ctx.config;
    let entry = ctx
        .registry
        .sources(Category::Scripts)
        .base()
        .join(&config.scripts.entry);
    let Some(dest) = ctx.destinations().dir(Category::Scripts).map(|d| d.to_path_buf()) else {
        return Ok(());
    };

    let target = TransformOptions::from_target(&config.scripts.target)
        .map_err(|err| anyhow!("invalid script target `{}`: {err}", config.scripts.target))?;
    let options = ScriptOptions {
        target,
        minify: ctx.profile.minify(),
        source_maps: ctx.profile.source_maps(),
        file_name: config.scripts.file.clone(),
        map_root: config.root.clone(),
    };

    let bundle = match bundle_scripts(&entry, &options)? {
        Ok(bundle) => bundle,
        Err(diag) => {
            report.diagnostics.push(diag);
            return Ok(());
        }
    };
    debug!("scripts"; "bundled {} modules from {}", bundle.modules, ctx.display_path(&entry));

    write_artifact(report, &dest.join(&options.file_name), ArtifactKind::Bundle, &bundle.code)?;
    if let Some(map) = &bundle.map {
        write_artifact(report, &dest.join(options.map_name()), ArtifactKind::SourceMap, map)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::Environment;
    use crate::task::tests::Fixture;
    use crate::task::{ArtifactKind, TaskId, run_task};
    use std::fs;

    fn project() -> Fixture {
        let fx = Fixture::new();
        fx.source(
            "js/app.js",
            "import { total } from './lib/math';\nconsole.log(total([1, 2, 3]));\n",
        );
        fx.source(
            "js/lib/math.js",
            "export const total = (xs) => xs.reduce((a, b) => a + b, 0);\n",
        );
        fx.source("js/vendor/jquery.js", "window.$ = function () {};\n");
        fx
    }

    #[test]
    fn test_dev_bundle_with_map() {
        let fx = project();
        let report = run_task(TaskId::Scripts, &fx.context(Environment::Development)).unwrap();

        let kinds: Vec<_> = report.artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ArtifactKind::Bundle, ArtifactKind::SourceMap]);
        let code = fs::read_to_string(fx.output(Environment::Development, "app.js")).unwrap();
        assert!(code.contains("sourceMappingURL=app.js.map"));
        assert!(!code.contains("window.$"));
    }

    #[test]
    fn test_prod_bundle_without_map() {
        let fx = project();
        let report = run_task(TaskId::Scripts, &fx.context(Environment::Production)).unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert!(!fx.output(Environment::Production, "app.js.map").exists());
    }

    #[test]
    fn test_syntax_error_is_diagnostic() {
        let fx = project();
        fx.source("js/lib/math.js", "export const total = (xs) => {\n");

        let report = run_task(TaskId::Scripts, &fx.context(Environment::Development)).unwrap();

        assert!(report.artifacts.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].file.ends_with("math.js"));
    }

    #[test]
    fn test_missing_entry_is_error() {
        let fx = Fixture::new();
        fx.source("js/other.js", "1;");
        assert!(run_task(TaskId::Scripts, &fx.context(Environment::Production)).is_err());
    }
}
