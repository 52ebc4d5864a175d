// Extension to content type lookup backed by the compiled-in mime_guess table.

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Content type for a bare extension (no leading dot).
///
/// The lookup is case-sensitive: the table is keyed by lowercase extensions, so
/// `JSON` does not match `json`.
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    if extension.is_empty() || extension.chars().any(|c| c.is_ascii_uppercase()) {
        return DEFAULT_MIME_TYPE;
    }

    match mime_guess::from_ext(extension).first_raw() {
        Some(mime_type) => mime_type,
        None => DEFAULT_MIME_TYPE,
    }
}

/// Content type for a request or file path, based on the extension of its last segment.
pub fn mime_type_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => mime_type_for_extension(extension),
        _ => DEFAULT_MIME_TYPE,
    }
}
