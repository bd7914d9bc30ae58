//! Reload client injection into served HTML.

use crate::utils::mime;

/// Path the reload client is served from.
pub const RELOAD_JS_PATH: &str = "/__assetline/reload.js";

/// Minified client, built by `build.rs`.
pub const RELOAD_JS: &str = include_str!(concat!(env!("OUT_DIR"), "/reload.min.js"));

/// `<script>` tag loading the reload client for `reload_port`.
pub fn script_tag(reload_port: u16) -> String {
    format!(r#"<script src="{RELOAD_JS_PATH}" data-port="{reload_port}"></script>"#)
}

/// Inject the reload client if `content_type` is HTML.
pub fn maybe_inject(body: Vec<u8>, content_type: &str, reload_port: Option<u16>) -> Vec<u8> {
    match (mime::is_html(content_type), reload_port) {
        (true, Some(port)) => inject_script(&body, &script_tag(port)),
        _ => body,
    }
}

/// Insert `script` before the last `</body>`, or append it.
fn inject_script(content: &[u8], script: &str) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let script = script.as_bytes();
    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}
