use std::path::{Path, PathBuf};

use log::debug;
use urlencoding::decode;

// A request path resolved against the fixture root. Construction fails for
// anything that could escape the root, so a ResourcePath is always safe to open.
#[derive(Clone, Debug)]
pub struct ResourcePath {
    request_path: String,
    relative_path: String,
    full_path: PathBuf,
}

impl ResourcePath {
    pub fn new(resource_root: &Path, request_path: &str) -> Result<Self, String> {
        let relative_path = Self::clean_url_path(request_path).map_err(|e| {
            debug!("Rejected resource path {:?}: {}", request_path, e);
            e
        })?;

        let mut full_path = resource_root.to_path_buf();
        for segment in relative_path.split('/') {
            full_path.push(segment);
        }

        Ok(ResourcePath {
            request_path: request_path.to_string(),
            relative_path,
            full_path,
        })
    }

    pub fn get_full_path(&self) -> &Path {
        &self.full_path
    }

    /// Path relative to the root, without leading slash.
    pub fn get_relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn get_request_path(&self) -> &str {
        &self.request_path
    }

    fn clean_url_path(path: &str) -> Result<String, String> {
        let decoded = decode(path).map_err(|_| "Path is not valid percent-encoded UTF-8".to_string())?;

        if decoded.chars().any(|c| c.is_control()) {
            return Err("Path contains control or NUL characters".to_string());
        }

        if decoded.contains('\\') {
            return Err("Path contains backslashes".to_string());
        }

        let mut parts = Vec::new();
        for part in decoded.split('/') {
            match part {
                "" => continue,
                "." | ".." => return Err("Path traversal segments are not allowed".to_string()),
                _ => parts.push(part),
            }
        }

        if parts.is_empty() {
            return Err("Path does not name a resource".to_string());
        }

        Ok(parts.join("/"))
    }
}

/// Canonical form of a request path used to key per-path behaviour.
///
/// Percent-encoding is decoded and empty segments are collapsed, so
/// `/title%2Ehtml` and `//title.html` both map to `/title.html`. A path that
/// does not decode is kept as sent.
pub fn normalize_request_path(path: &str) -> String {
    let decoded = decode(path).map(|d| d.into_owned()).unwrap_or_else(|_| path.to_string());
    let parts: Vec<&str> = decoded.split('/').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() {
        return "/".to_string();
    }

    let mut normalized = format!("/{}", parts.join("/"));
    if decoded.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
