//! Image optimization.
//!
//! | Format | Strategy                                                       |
//! |--------|----------------------------------------------------------------|
//! | PNG    | Lossless re-encode, best compression, adaptive filtering       |
//! | GIF    | Lossless interlaced re-encode, palette indices kept            |
//! | JPEG   | Progressive re-encode; metadata strip when that is not smaller |
//! | SVG    | Drop editor metadata, comments, whitespace-only layout text    |
//!
//! An optimized result is only used when it is smaller than the input.

mod raster;
mod svg;

use std::path::Path;

use crate::compiler::{Compiled, Diagnostic};

pub use svg::SvgOptions;

/// Optimizer settings for one run.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub svg: SvgOptions,
    /// Quality (1-100) of the progressive JPEG re-encode.
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            svg: SvgOptions::default(),
            jpeg_quality: 90,
        }
    }
}

/// Formats with an optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// Optimize `bytes` read from `path`.
///
/// `Ok(Some(smaller))` when optimization paid off, `Ok(None)` when the input
/// should be copied as is. Undecodable input is a diagnostic.
pub fn optimize_image(
    path: &Path,
    bytes: &[u8],
    options: &ImageOptions,
) -> Compiled<Option<Vec<u8>>> {
    let Some(kind) = ImageKind::from_path(path) else {
        return Ok(None);
    };

    let optimized = match kind {
        ImageKind::Png => raster::optimize_png(bytes),
        ImageKind::Gif => raster::optimize_gif(bytes),
        ImageKind::Jpeg => raster::optimize_jpeg(bytes, options.jpeg_quality),
        ImageKind::Svg => svg::optimize_svg(bytes, &options.svg),
    }
    .map_err(|err| Diagnostic::new(path, format!("cannot optimize {kind:?} image: {err:#}")))?;

    Ok(optimized.filter(|out| out.len() < bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(ImageKind::from_path(Path::new("a/b.PNG")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("photo.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("logo.svg")), Some(ImageKind::Svg));
        assert_eq!(ImageKind::from_path(Path::new("icon.webp")), None);
    }

    #[test]
    fn test_other_formats_pass_through() {
        let out = optimize_image(Path::new("a.webp"), b"RIFF", &ImageOptions::default()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_corrupt_png_is_diagnostic() {
        let diag =
            optimize_image(Path::new("/img/broken.png"), b"not a png", &ImageOptions::default())
                .unwrap_err();
        assert_eq!(diag.file, Path::new("/img/broken.png"));
        assert!(diag.line.is_none());
    }

    #[test]
    fn test_larger_result_is_discarded() {
        // Already minimal: nothing to strip, so no smaller output.
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"/>"#;
        let out = optimize_image(Path::new("a.svg"), svg, &ImageOptions::default()).unwrap();
        assert!(out.is_none());
    }
}
