// src/drive/url.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Direct-download endpoint for drive files.
pub const DOWNLOAD_ENDPOINT: &str = "https://drive.google.com/uc";

// Everything after `/d/` up to the next path, query or fragment delimiter.
static FILE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/d/([^/?#]+)").expect("Failed to compile FILE_ID_RE")
});

/// Extracts the file id from a viewer URL such as
/// `https://drive.google.com/file/d/<ID>/preview`.
pub fn extract_file_id(url: &str) -> Option<&str> {
    FILE_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Builds the direct-download URL for a file id.
pub fn download_url_for(file_id: &str) -> String {
    format!("{}?export=download&id={}", DOWNLOAD_ENDPOINT, file_id)
}

/// Converts an embedded viewer `src` into a direct-download URL.
///
/// Returns `None` when the source is absent, blank, or carries no `/d/<ID>`
/// segment. Whatever follows the id (`/preview`, `/view`, ...) is ignored.
pub fn convert_to_download_url(viewer_src: Option<&str>) -> Option<String> {
    let src = viewer_src.map(str::trim).filter(|s| !s.is_empty())?;
    extract_file_id(src).map(download_url_for)
}
