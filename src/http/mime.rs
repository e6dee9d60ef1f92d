//! Content-Type lookup from filename extension.

use std::path::Path;

/// Returns the Content-Type for a file path based on its extension.
/// Unknown or missing extensions fall back to `application/octet-stream`.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str());
    match extension {
        Some("html" | "htm") => "text/html",
        Some("txt") => "text/plain",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}
