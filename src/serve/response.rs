//! HTTP response handlers.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::inject::{RELOAD_JS, maybe_inject};
use crate::utils::mime::{self, types};

/// Respond with a static file, injecting the reload client into HTML.
pub fn respond_file(request: Request, path: &Path, reload_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    // Injected HTML has no stable length to slice.
    if !mime::is_html(content_type)
        && let Some(range) = get_range_header(&request)
    {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject(body, content_type, reload_port);
    send_body(request, 200, content_type, body)
}

/// Serve the reload client from memory.
pub fn respond_reload_js(request: Request) -> Result<()> {
    send_body(request, 200, types::JAVASCRIPT, RELOAD_JS.as_bytes().to_vec())
}

/// 404, using `<root>/404.html` when present.
pub fn respond_not_found(request: Request, root: &Path, reload_port: Option<u16>) -> Result<()> {
    let custom = root.join("404.html");
    let has_custom = custom.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom) {
        let body = maybe_inject(body, types::HTML, reload_port);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// 503 while shutting down.
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

/// 405 for anything but GET and HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, types::PLAIN, b"405 Method Not Allowed".to_vec())
}

pub fn is_read_request(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

/// Partial content for media seeking.
fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    let file_size = fs::metadata(path)?.len();
    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let Some((start, end)) = parse_range(range, file_size) else {
        let response = Response::empty(StatusCode(416))
            .with_header(dynamic_header("Content-Range", &format!("bytes */{file_size}"))?);
        request.respond(response)?;
        return Ok(());
    };

    let length = end - start + 1;
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let reader = file.take(length);

    let response = Response::new(
        StatusCode(206),
        vec![
            make_header("Content-Type", content_type),
            dynamic_header("Content-Range", &format!("bytes {start}-{end}/{file_size}"))?,
            make_header("Accept-Ranges", "bytes"),
        ],
        reader,
        usize::try_from(length).ok(),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Parse `start-end`, `start-` or `-suffix` into inclusive byte bounds.
fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let last = file_size.checked_sub(1)?;
    let (start, end) = range.trim().split_once('-')?;
    let (start, end) = match (start.trim(), end.trim()) {
        ("", suffix) => {
            let suffix: u64 = suffix.parse().ok()?;
            (file_size.saturating_sub(suffix), last)
        }
        (start, "") => (start.parse().ok()?, last),
        (start, end) => (start.parse().ok()?, end.parse::<u64>().ok()?.min(last)),
    };
    (start <= end).then_some((start, end))
}

fn get_range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("range"))
        .map(|h| h.value.to_string())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).expect("static header is valid")
}

fn dynamic_header(key: &'static str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid {key} header: {value}"))
}
