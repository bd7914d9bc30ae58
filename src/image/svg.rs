//! SVG cleanup with quick-xml.
//!
//! Streaming pass that drops what editors leave behind and the browser never
//! needs. Geometry, ids and (by default) `viewBox` are untouched.

use anyhow::{Result, bail};
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, Event},
};

/// Elements removed together with their subtree.
const DROPPED_ELEMENTS: &[&[u8]] = &[b"metadata"];

/// Elements whose whitespace-only text is rendered and must survive.
const TEXT_CONTENT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath"];

/// Editor namespaces whose elements and attributes are removed.
const EDITOR_PREFIXES: &[&[u8]] = &[b"sodipodi:", b"inkscape:", b"sketch:", b"serif:"];

#[derive(Debug, Clone)]
pub struct SvgOptions {
    pub keep_viewbox: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self { keep_viewbox: true }
    }
}

pub fn optimize_svg(bytes: &[u8], options: &SvgOptions) -> Result<Option<Vec<u8>>> {
    let mut reader = Reader::from_reader(bytes);
    let mut writer = Writer::new(Vec::with_capacity(bytes.len()));
    // Depth inside a dropped subtree; 0 when writing.
    let mut skip_depth = 0usize;
    // Per open element: whether whitespace-only text inside it is kept.
    let mut preserve: Vec<bool> = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => bail!(
                "XML parse error at position {}: {e}",
                reader.error_position()
            ),
        };

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(elem) => {
                if is_dropped(elem.name().as_ref()) {
                    skip_depth = 1;
                } else {
                    let inherited = preserve.last().copied().unwrap_or(false);
                    preserve.push(keeps_whitespace(&elem, inherited));
                    writer.write_event(Event::Start(clean_attributes(&elem, options)))?;
                }
            }
            Event::End(elem) => {
                preserve.pop();
                writer.write_event(Event::End(elem))?;
            }
            Event::Empty(elem) => {
                if !is_dropped(elem.name().as_ref()) {
                    writer.write_event(Event::Empty(clean_attributes(&elem, options)))?;
                }
            }
            Event::Text(text) => {
                if preserve.last().copied().unwrap_or(false) || !text.iter().all(u8::is_ascii_whitespace) {
                    writer.write_event(Event::Text(text))?;
                }
            }
            Event::Comment(_) | Event::DocType(_) | Event::PI(_) | Event::Decl(_) => {}
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    Ok(Some(writer.into_inner()))
}

fn is_dropped(name: &[u8]) -> bool {
    DROPPED_ELEMENTS.contains(&name) || has_editor_prefix(name)
}

/// Text content elements render their whitespace; `xml:space` overrides
/// what the parent decided.
fn keeps_whitespace(elem: &BytesStart<'_>, inherited: bool) -> bool {
    if TEXT_CONTENT_ELEMENTS.contains(&elem.name().as_ref()) {
        return true;
    }
    let space = elem
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.as_ref() == b"xml:space");
    match space.as_ref().map(|attr| attr.value.as_ref()) {
        Some(b"preserve") => true,
        Some(b"default") => false,
        _ => inherited,
    }
}

#[inline]
fn has_editor_prefix(name: &[u8]) -> bool {
    EDITOR_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn clean_attributes(elem: &BytesStart<'_>, options: &SvgOptions) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in elem.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        let editor_ns = key
            .strip_prefix(b"xmlns:")
            .is_some_and(|ns| EDITOR_PREFIXES.iter().any(|p| p.strip_suffix(b":") == Some(ns)));
        let drop = has_editor_prefix(key) || editor_ns || (!options.keep_viewbox && key == b"viewBox");
        if !drop {
            out.push_attribute((key, attr.value.as_ref()));
        }
    }
    out
}
