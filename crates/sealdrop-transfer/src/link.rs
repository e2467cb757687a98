//! Shareable download links
//!
//! A link is a configured URL template with one `{reference}` placeholder
//! standing in for the manifest reference. The reverse direction accepts
//! either a bare reference or any URL carrying `download=<reference>`.

use sealdrop_core::config::LINK_PLACEHOLDER;

const DOWNLOAD_PARAM: &str = "download=";

/// Substitute the manifest reference into a link template.
pub fn render_link(template: &str, reference: &str) -> String {
    template.replacen(LINK_PLACEHOLDER, reference, 1)
}

/// Pull the manifest reference out of user input.
///
/// Returns `None` for blank input, for a `download=` parameter with no
/// value, and for URLs that carry no `download=` parameter at all.
pub fn extract_reference(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match input.find(DOWNLOAD_PARAM) {
        Some(idx) => {
            let rest = &input[idx + DOWNLOAD_PARAM.len()..];
            let end = rest.find(['&', '#']).unwrap_or(rest.len());
            let reference = &rest[..end];
            (!reference.is_empty()).then(|| reference.to_string())
        }
        None if input.contains("://") => None,
        None => Some(input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: &str = "5f1c2e3d4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    #[test]
    fn test_render_default_template() {
        assert_eq!(
            render_link("http://localhost:8080?download={reference}", REF),
            format!("http://localhost:8080?download={REF}")
        );
    }

    #[test]
    fn test_render_placeholder_mid_path() {
        assert_eq!(
            render_link("https://share.example/d/{reference}/view", "abc"),
            "https://share.example/d/abc/view"
        );
    }

    #[test]
    fn test_extract_bare_reference() {
        assert_eq!(extract_reference(REF).as_deref(), Some(REF));
        assert_eq!(extract_reference(&format!("  {REF}\n")).as_deref(), Some(REF));
    }

    #[test]
    fn test_extract_from_link() {
        let link = render_link("http://localhost:8080?download={reference}", REF);
        assert_eq!(extract_reference(&link).as_deref(), Some(REF));
    }

    #[test]
    fn test_extract_stops_at_next_param() {
        assert_eq!(
            extract_reference("https://x.example/?download=abc&lang=en").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_reference("https://x.example/?download=abc#top").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_extract_rejects_empty() {
        assert_eq!(extract_reference(""), None);
        assert_eq!(extract_reference("   "), None);
        assert_eq!(extract_reference("https://x.example/?download=&a=1"), None);
        assert_eq!(extract_reference("https://x.example/?other=abc"), None);
    }
}
