//! Images: optimized in parallel when the profile asks for it, copied otherwise.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::output::{ArtifactKind, copy_artifact, write_artifact};
use super::{TaskContext, TaskReport};
use crate::compiler::Diagnostic;
use crate::image::{ImageKind, ImageOptions, SvgOptions, optimize_image};
use crate::logger::ProgressLine;
use crate::registry::Category;
use crate::utils::path::relative_to;

/// Result for one image, before anything is written.
struct Processed {
    dest: PathBuf,
    bytes: Vec<u8>,
    diagnostic: Option<Diagnostic>,
}

const fn counter_name(kind: Option<ImageKind>) -> &'static str {
    match kind {
        Some(ImageKind::Png) => "png",
        Some(ImageKind::Jpeg) => "jpeg",
        Some(ImageKind::Gif) => "gif",
        Some(ImageKind::Svg) => "svg",
        None => "other",
    }
}

pub fn run(ctx: &TaskContext, report: &mut TaskReport) -> Result<()> {
    let sources = ctx.registry.sources(Category::Images);
    let Some(dest) = ctx.destinations().dir(Category::Images).map(Path::to_path_buf) else {
        return Ok(());
    };

    let files: Vec<(PathBuf, PathBuf)> = sources
        .scan()?
        .into_iter()
        .filter_map(|path| {
            let out = dest.join(relative_to(&path, sources.base())?);
            Some((path, out))
        })
        .collect();

    if !ctx.profile.optimize_images() {
        for (path, out) in &files {
            copy_artifact(report, path, out, ArtifactKind::Image)?;
        }
        return Ok(());
    }
    if files.is_empty() {
        return Ok(());
    }

    let options = ImageOptions {
        svg: SvgOptions {
            keep_viewbox: ctx.config.images.svg_keep_viewbox,
        },
        jpeg_quality: ctx.config.images.jpeg_quality,
    };
    let counts = ["png", "jpeg", "gif", "svg", "other"].map(|name| {
        let total = files
            .iter()
            .filter(|(p, _)| counter_name(ImageKind::from_path(p)) == name)
            .count();
        (name, total)
    });
    let progress = ProgressLine::new("images", &counts);

    let processed = files
        .par_iter()
        .map(|(path, out)| {
            let original =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let (bytes, diagnostic) = match optimize_image(path, &original, &options) {
                Ok(Some(smaller)) => (smaller, None),
                Ok(None) => (original, None),
                // Unreadable images still ship, unmodified.
                Err(diag) => (original, Some(diag)),
            };
            progress.inc(counter_name(ImageKind::from_path(path)));
            Ok(Processed {
                dest: out.clone(),
                bytes,
                diagnostic,
            })
        })
        .collect::<Result<Vec<_>>>();
    progress.finish();

    for item in processed? {
        write_artifact(report, &item.dest, ArtifactKind::Image, &item.bytes)?;
        report.diagnostics.extend(item.diagnostic);
    }
    Ok(())
}
