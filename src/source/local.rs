use crate::error::{MapError, Result};
use crate::photos::model::SourceFile;
use crate::source::{CacheStore, PhotoSource};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Map a photo file extension to its declared MIME type.
/// Returns None for unsupported extensions.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())?;

    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        "cr2" => Some("image/x-canon-cr2"),
        "cr3" => Some("image/x-canon-cr3"),
        "arw" => Some("image/x-sony-arw"),
        "nef" => Some("image/x-nikon-nef"),
        "dng" => Some("image/x-adobe-dng"),
        _ => None,
    }
}

/// Photo source over a local directory tree.
///
/// File ids are root-relative paths, which are stable as long as the files
/// are not moved, the same property the id of a remote listing would have.
/// The listing is sorted by id because directory walk order is
/// filesystem-dependent and the output record order should be reproducible.
pub struct LocalFolderSource {
    root: PathBuf,
}

impl LocalFolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PhotoSource for LocalFolderSource {
    fn list_files(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            return Err(MapError::Listing(format!(
                "not a directory: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !e.path_is_symlink())
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("listing: skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(mime) = mime_from_extension(path) else {
                tracing::debug!("listing: unsupported file {:?}", path);
                continue;
            };
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| relative.clone());
            files.push(SourceFile {
                id: relative,
                name,
                mime_type: mime.to_string(),
            });
        }

        files.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!("listing: {} file(s) under {:?}", files.len(), self.root);
        Ok(files)
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        std::fs::read(self.root.join(id)).map_err(|e| MapError::Download {
            name: id.to_string(),
            message: e.to_string(),
        })
    }
}

/// Cache blob stored as a JSON file on disk.
///
/// Saving writes a sibling `.tmp` file and renames it over the target, so a
/// crash mid-write cannot leave a truncated blob behind.
pub struct LocalCacheFile {
    path: PathBuf,
}

impl LocalCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheStore for LocalCacheFile {
    fn load_blob(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MapError::CacheLoad(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save_blob(&self, bytes: &[u8]) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)
            .map_err(|e| MapError::CachePersist(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| MapError::CachePersist(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}
