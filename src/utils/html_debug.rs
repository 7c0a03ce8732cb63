// src/utils/html_debug.rs
use std::fs;
use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;
use crate::utils::error::StorageError;

/// Elements worth looking at when a document page has no usable viewer.
static VIEWER_CANDIDATE_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?is)<iframe\b[^>]*>", "iframe"),
        (r"(?is)<(?:embed|object)\b[^>]*>", "embed"),
        (r#"(?i)https?://drive\.google\.com/[^"'\s<>]+"#, "drive"),
    ]
    .iter()
    .filter_map(|(pat, kind)| Regex::new(pat).ok().map(|re| (re, *kind)))
    .collect()
});

/// Wraps each `(start, end, kind)` byte range of `html` in a coloured span and
/// writes the result to `path`. Overlapping ranges after the first are dropped.
pub fn save_debug_html(
    html: &str,
    path: &Path,
    highlights: &[(usize, usize, &str)],
) -> Result<(), StorageError> {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
    debug_html.push_str(".highlight-iframe { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-embed { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-drive { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-custom { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n<pre>\n");

    let mut sorted = highlights.to_vec();
    sorted.sort_by_key(|h| h.0);

    let mut last_pos = 0;
    for (start, end, kind) in sorted {
        if start < last_pos || end > html.len() || start >= end {
            continue;
        }
        debug_html.push_str(&escape(&html[last_pos..start]));

        let css_class = match kind {
            "iframe" => "highlight-iframe",
            "embed" => "highlight-embed",
            "drive" => "highlight-drive",
            _ => "highlight-custom",
        };
        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Position: {}-{}, Type: {}\">",
            css_class, start, end, kind
        ));
        debug_html.push_str(&escape(&html[start..end]));
        debug_html.push_str("</span>");
        last_pos = end;
    }
    if last_pos < html.len() {
        debug_html.push_str(&escape(&html[last_pos..]));
    }
    debug_html.push_str("\n</pre>\n</body>\n</html>");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, debug_html)?;

    tracing::info!("Saved debug HTML to {}", path.display());
    Ok(())
}

/// Saves `html` with every viewer-like element highlighted.
pub fn save_viewer_debug_html(html: &str, path: &Path) -> Result<(), StorageError> {
    let mut highlights = Vec::new();
    for (re, kind) in VIEWER_CANDIDATE_RES.iter() {
        for mat in re.find_iter(html) {
            highlights.push((mat.start(), mat.end(), *kind));
        }
    }
    tracing::debug!("Found {} viewer candidates for debug output", highlights.len());
    save_debug_html(html, path, &highlights)
}

// Page source is shown as text, not rendered.
fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_iframes_and_drive_links() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug").join("page.html");
        let html = r#"<div><iframe id="other" src="https://drive.google.com/file/d/XYZ/preview"></iframe></div>"#;

        save_viewer_debug_html(html, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("class=\"highlight-iframe\""));
        assert!(written.contains("&lt;iframe"));
        // The drive link sits inside the iframe tag, so it is not highlighted twice.
        assert!(!written.contains("class=\"highlight-drive\""));
    }
}
