//! Verbatim copies: fonts, static assets, html pages.

use anyhow::Result;

use super::output::{ArtifactKind, copy_artifact};
use super::{TaskContext, TaskReport};
use crate::debug;
use crate::registry::Category;
use crate::utils::path::{relative_to, to_slash};

/// Copy every file of `category`, keeping paths relative to its base.
pub fn run(ctx: &TaskContext, category: Category, report: &mut TaskReport) -> Result<()> {
    let Some(dest) = ctx.destinations().dir(category).map(|d| d.to_path_buf()) else {
        return Ok(());
    };
    let sources = ctx.registry.sources(category);

    for path in sources.scan()? {
        let Some(rel) = relative_to(&path, sources.base()) else {
            continue;
        };
        debug!(category.name(); "{}", to_slash(rel));
        copy_artifact(report, &path, &dest.join(rel), ArtifactKind::Asset)?;
    }
    Ok(())
}
