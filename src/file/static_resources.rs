use std::path::{Path, PathBuf};

use hyper::body::Bytes;
use log::trace;

use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::FixtureServerErrorKind;
use crate::file::mime_table::mime_type_for_path;
use crate::file::resource_path::ResourcePath;

pub const INDEX_PAGE: &str = "/index.html";

#[derive(Debug)]
pub struct StaticResource {
    pub path: ResourcePath,
    pub mime_type: &'static str,
    pub content: Bytes,
}

#[derive(Debug)]
pub enum StaticLookup {
    Found(StaticResource),
    NotFound,
}

// Maps request paths onto the fixture directory
#[derive(Clone, Debug)]
pub struct StaticResources {
    resource_root: PathBuf,
}

impl StaticResources {
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        Self { resource_root: resource_root.into() }
    }

    /// The directory shipped with the crate.
    pub fn bundled_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join("assets")
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    /// Resolves `request_path` (the path component of the request URI) and reads the resource.
    ///
    /// Missing files, directories and paths that do not normalise are all
    /// `NotFound`. Only a failure to read an existing regular file is an error.
    pub async fn lookup(&self, request_path: &str) -> Result<StaticLookup, FixtureServerError> {
        let request_path = if request_path == "/" { INDEX_PAGE } else { request_path };

        let resource_path = match ResourcePath::new(&self.resource_root, request_path) {
            Ok(path) => path,
            Err(_) => return Ok(StaticLookup::NotFound),
        };

        let full_path = resource_path.get_full_path();
        match tokio::fs::metadata(full_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                trace!("No fixture resource at {}", full_path.display());
                return Ok(StaticLookup::NotFound);
            }
        }

        let content = tokio::fs::read(full_path).await.map_err(|e| {
            FixtureServerError::new(FixtureServerErrorKind::Resource(e), format!("Failed to read {}", full_path.display()))
        })?;

        let mime_type = mime_type_for_path(resource_path.get_relative_path());
        trace!("Serving fixture resource {} as {} ({} bytes)", full_path.display(), mime_type, content.len());

        Ok(StaticLookup::Found(StaticResource {
            path: resource_path,
            mime_type,
            content: Bytes::from(content),
        }))
    }
}
