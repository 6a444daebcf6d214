//! Live-reload script injection.

/// URL the dev server answers with `hotreload.js`.
pub const HOTRELOAD_URL: &str = "/__pagesmith/hotreload.js";

/// Inject the live-reload script tag when the response is HTML.
pub fn maybe_inject_hotreload(body: Vec<u8>, content_type: &str) -> Vec<u8> {
    if crate::utils::mime::is_html(content_type) {
        inject_hotreload_script(&body)
    } else {
        body
    }
}

/// Insert the script tag before the last `</body>`, or append it.
fn inject_hotreload_script(content: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";
    let tag = format!(r#"<script src="{HOTRELOAD_URL}"></script>"#);

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + tag.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(tag.as_bytes());
    result.extend_from_slice(&content[pos..]);
    result
}
