//! PNG, GIF and JPEG optimizers.

use std::borrow::Cow;

use anyhow::{Context, Result, bail};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use jpeg_encoder::{ColorType, Encoder};

/// Lossless PNG re-encode.
pub fn optimize_png(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .context("failed to decode PNG")?;

    let mut out = Vec::with_capacity(bytes.len());
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
        .context("failed to encode PNG")?;
    Ok(Some(out))
}

/// Interlaced GIF re-encode.
///
/// Frames stay palette-indexed, so pixels, palettes, timing and
/// transparency are carried over exactly.
pub fn optimize_gif(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(bytes).context("failed to decode GIF")?;

    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame().context("failed to decode GIF frames")? {
        frames.push(frame.clone());
    }
    let palette = decoder.global_palette().unwrap_or_default().to_vec();

    let mut out = Vec::with_capacity(bytes.len());
    {
        let mut encoder = gif::Encoder::new(&mut out, decoder.width(), decoder.height(), &palette)
            .context("failed to encode GIF")?;
        if frames.len() > 1 {
            encoder.set_repeat(decoder.repeat())?;
        }
        for mut frame in frames {
            let rows = interlace_rows(&frame.buffer, usize::from(frame.width), usize::from(frame.height));
            frame.buffer = Cow::Owned(rows);
            frame.interlaced = true;
            encoder.write_frame(&frame).context("failed to encode GIF")?;
        }
    }
    Ok(Some(out))
}

/// Reorder top-to-bottom rows into the four GIF interlace passes.
fn interlace_rows(buffer: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len());
    for (first, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        for row in (first..height).step_by(step) {
            out.extend_from_slice(&buffer[row * width..(row + 1) * width]);
        }
    }
    out
}

const SOI: u8 = 0xD8;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const COM: u8 = 0xFE;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP15: u8 = 0xEF;

/// A marker segment before the first scan; `start..end` covers the marker.
struct Segment {
    marker: u8,
    start: usize,
    end: usize,
}

impl Segment {
    fn payload<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        bytes.get(self.start + 4..self.end).unwrap_or_default()
    }
}

/// Header segments, and the offset of the first scan (or of what follows EOI).
fn header_segments(bytes: &[u8]) -> Result<(Vec<Segment>, usize)> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != SOI {
        bail!("missing JPEG start-of-image marker");
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    while pos < bytes.len() {
        if bytes[pos] != 0xFF {
            bail!("expected JPEG marker at byte {pos}");
        }
        // Fill bytes before a marker.
        while pos + 1 < bytes.len() && bytes[pos + 1] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = bytes.get(pos + 1) else {
            bail!("truncated JPEG marker");
        };

        // Standalone markers carry no length.
        if marker == EOI || (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            segments.push(Segment {
                marker,
                start: pos,
                end: pos + 2,
            });
            pos += 2;
            if marker == EOI {
                break;
            }
            continue;
        }

        let Some(len_bytes) = bytes.get(pos + 2..pos + 4) else {
            bail!("truncated JPEG segment");
        };
        let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        let end = pos + 2 + len;
        if len < 2 || end > bytes.len() {
            bail!("JPEG segment overruns the file");
        }
        if marker == SOS {
            break;
        }
        segments.push(Segment {
            marker,
            start: pos,
            end,
        });
        pos = end;
    }
    Ok((segments, pos))
}

/// JPEG metadata strip without touching entropy-coded data.
///
/// Keeps JFIF (APP0), Exif (APP1, carries orientation) and ICC profiles
/// (APP2). Drops comments and every other APP segment.
pub fn strip_jpeg(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let (segments, scan) = header_segments(bytes)?;

    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..2]);
    let mut dropped = false;
    for segment in &segments {
        if keep_segment(segment.marker, segment.payload(bytes)) {
            out.extend_from_slice(&bytes[segment.start..segment.end]);
        } else {
            dropped = true;
        }
    }
    // Scan data runs to the end; copied verbatim.
    out.extend_from_slice(&bytes[scan..]);
    Ok(dropped.then_some(out))
}

/// Progressive re-encode at `quality` with optimized Huffman tables.
///
/// Exif and ICC segments are carried over; pixels are not rotated, so the
/// Exif orientation still applies. `None` for images wider or taller than a
/// JPEG frame header can describe.
pub fn progressive_jpeg(bytes: &[u8], quality: u8) -> Result<Option<Vec<u8>>> {
    let (segments, _) = header_segments(bytes)?;
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .context("failed to decode JPEG")?;
    let (Ok(width), Ok(height)) = (u16::try_from(img.width()), u16::try_from(img.height())) else {
        return Ok(None);
    };
    let (pixels, color) = if img.color().has_color() {
        (img.to_rgb8().into_raw(), ColorType::Rgb)
    } else {
        (img.to_luma8().into_raw(), ColorType::Luma)
    };

    let mut out = Vec::with_capacity(bytes.len());
    let mut encoder = Encoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    for segment in &segments {
        let payload = segment.payload(bytes);
        let carried = matches!(segment.marker, APP1 | APP2) && keep_segment(segment.marker, payload);
        if carried {
            encoder
                .add_app_segment(segment.marker - APP0, payload)
                .context("failed to carry JPEG metadata")?;
        }
    }
    encoder
        .encode(&pixels, width, height, color)
        .context("failed to encode JPEG")?;
    Ok(Some(out))
}

/// Progressive when that is smaller than the input, else a metadata strip.
pub fn optimize_jpeg(bytes: &[u8], quality: u8) -> Result<Option<Vec<u8>>> {
    let stripped = strip_jpeg(bytes)?;
    let progressive = progressive_jpeg(bytes, quality)?.filter(|out| out.len() < bytes.len());
    Ok(progressive.or(stripped))
}

fn keep_segment(marker: u8, payload: &[u8]) -> bool {
    match marker {
        COM => false,
        APP0 => true,
        APP1 => payload.starts_with(b"Exif\0"),
        APP2 => payload.starts_with(b"ICC_PROFILE\0"),
        m if (APP0..=APP15).contains(&m) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u16;
        let mut seg = vec![0xFF, marker];
        seg.extend_from_slice(&len.to_be_bytes());
        seg.extend_from_slice(payload);
        seg
    }

    fn fake_jpeg(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        for seg in segments {
            out.extend_from_slice(seg);
        }
        out.extend_from_slice(&segment(SOS, &[1, 2, 3]));
        out.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, EOI]);
        out
    }

    #[test]
    fn test_strip_jpeg_drops_metadata() {
        let jfif = segment(APP0, b"JFIF\0\x01\x01");
        let exif = segment(APP1, b"Exif\0\0orientation");
        let xmp = segment(APP1, b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>");
        let comment = segment(COM, b"made with an editor");
        let dqt = segment(0xDB, &[0; 5]);

        let input = fake_jpeg(&[jfif.clone(), exif.clone(), xmp, comment, dqt.clone()]);
        let out = strip_jpeg(&input).unwrap().unwrap();

        let expected = fake_jpeg(&[jfif, exif, dqt]);
        assert_eq!(out, expected);
        assert!(out.len() < input.len());
    }

    #[test]
    fn test_strip_jpeg_nothing_to_drop() {
        let input = fake_jpeg(&[segment(APP0, b"JFIF\0")]);
        assert!(strip_jpeg(&input).unwrap().is_none());
    }

    #[test]
    fn test_strip_jpeg_rejects_garbage() {
        assert!(strip_jpeg(b"GIF89a").is_err());
        let mut truncated = vec![0xFF, SOI];
        truncated.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x40, 1, 2]);
        assert!(strip_jpeg(&truncated).is_err());
    }

    fn baseline_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .write_image(img.as_raw(), 64, 48, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn has_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|w| w == [0xFF, marker])
    }

    #[test]
    fn test_jpeg_becomes_progressive() {
        let mut input = baseline_jpeg();
        // Exif right after SOI, as cameras write it.
        let exif = segment(APP1, b"Exif\0\0MM\0*orientation");
        input.splice(2..2, exif.iter().copied());
        assert!(has_marker(&input, 0xC0));

        let out = optimize_jpeg(&input, 90).unwrap().unwrap();

        assert!(out.len() < input.len());
        assert!(has_marker(&out, 0xC2), "expected a progressive frame header");
        assert!(out.windows(exif.len()).any(|w| w == exif.as_slice()));
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    fn indexed_gif(width: u16, height: u16, frames: usize) -> Vec<u8> {
        let palette = [0, 0, 0, 255, 255, 255, 255, 0, 0, 0, 0, 255];
        let mut out = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut out, width, height, &palette).unwrap();
            if frames > 1 {
                encoder.set_repeat(gif::Repeat::Infinite).unwrap();
            }
            for n in 0..frames {
                let pixels: Vec<u8> = (0..usize::from(width) * usize::from(height))
                    .map(|i| ((i / usize::from(width) + n) % 4) as u8)
                    .collect();
                let mut frame = gif::Frame::default();
                frame.width = width;
                frame.height = height;
                frame.delay = 10;
                frame.buffer = Cow::Owned(pixels);
                encoder.write_frame(&frame).unwrap();
            }
        }
        out
    }

    fn decode_gif(bytes: &[u8]) -> (Vec<bool>, Vec<Vec<u8>>, gif::Repeat) {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(bytes).unwrap();
        let mut interlaced = Vec::new();
        let mut pixels = Vec::new();
        while let Some(info) = decoder.next_frame_info().unwrap() {
            interlaced.push(info.interlaced);
            let mut buf = vec![0; decoder.buffer_size()];
            decoder.read_into_buffer(&mut buf).unwrap();
            pixels.push(buf);
        }
        (interlaced, pixels, decoder.repeat())
    }

    #[test]
    fn test_interlace_row_order() {
        let buffer: Vec<u8> = (0..10).collect();
        assert_eq!(interlace_rows(&buffer, 1, 10), vec![0, 8, 4, 2, 6, 1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_gif_interlaced_and_pixel_exact() {
        let input = indexed_gif(12, 20, 3);

        let out = optimize_gif(&input).unwrap().unwrap();

        let (before_flags, before, repeat_before) = decode_gif(&input);
        let (after_flags, after, repeat_after) = decode_gif(&out);
        assert_eq!(before_flags, vec![false; 3]);
        assert_eq!(after_flags, vec![true; 3]);
        assert_eq!(after, before);
        assert_eq!(repeat_after, repeat_before);
    }

    #[test]
    fn test_png_roundtrip_is_lossless() {
        let mut img = RgbaImage::new(16, 16);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255]);
        }
        let mut input = Vec::new();
        PngEncoder::new_with_quality(&mut input, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 16, 16, image::ExtendedColorType::Rgba8)
            .unwrap();

        let out = optimize_png(&input).unwrap().unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }
}
