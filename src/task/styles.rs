//! Stylesheets: every non-partial `.scss` -> `.css` at the same relative path.

use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;

use super::output::{ArtifactKind, write_artifact};
use super::{TaskContext, TaskReport};
use crate::compiler::style::{StyleOptions, compile_stylesheet};
use crate::debug;
use crate::registry::Category;
use crate::utils::path::{relative_to, to_slash};

/// `_name.scss` files are only ever imported.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

pub fn run(ctx: &TaskContext, report: &mut TaskReport) -> Result<()> {
    let config = &ctx.config;
    let sources = ctx.registry.sources(Category::Styles);
    let Some(dest) = ctx.destinations().dir(Category::Styles).map(Path::to_path_buf) else {
        return Ok(());
    };

    let options = StyleOptions {
        browsers: config.browsers(),
        minify: ctx.profile.minify(),
        source_maps: ctx.profile.source_maps(),
        flexbugs: config.styles.flexbugs,
        load_paths: config
            .styles
            .load_paths
            .iter()
            .map(|p| config.root_join(p))
            .collect(),
    };

    let entries: Vec<(PathBuf, PathBuf)> = sources
        .scan()?
        .into_iter()
        .filter(|path| !is_partial(path))
        .filter_map(|path| {
            let out = dest.join(relative_to(&path, sources.base())?.with_extension("css"));
            Some((path, out))
        })
        .collect();

    // Compile in parallel, write in path order.
    let compiled: Vec<_> = entries
        .par_iter()
        .map(|(path, out)| {
            let file_name = out
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            compile_stylesheet(path, &file_name, &options)
        })
        .collect();

    for ((path, out), result) in entries.iter().zip(compiled) {
        match result? {
            Ok(style) => {
                debug!("styles"; "{}", to_slash(&config.root_relative(path)));
                write_artifact(report, out, ArtifactKind::Stylesheet, &style.css)?;
                if let Some(map) = &style.map {
                    let map_path = out.with_extension("css.map");
                    write_artifact(report, &map_path, ArtifactKind::SourceMap, map)?;
                }
            }
            Err(diag) => report.diagnostics.push(diag),
        }
    }
    Ok(())
}
