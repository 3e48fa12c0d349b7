pub mod local;

use crate::error::Result;
use crate::photos::model::SourceFile;

/// The file-listing + byte-fetch collaborator the pipeline consumes.
///
/// Implementations wrap whatever actually holds the photos (a local folder,
/// a cloud drive, ...). The pipeline only ever calls `fetch` for ids that
/// are not yet cached.
pub trait PhotoSource {
    fn list_files(&self) -> Result<Vec<SourceFile>>;
    fn fetch(&self, id: &str) -> Result<Vec<u8>>;
}

/// The persistence collaborator for the cache blob.
///
/// `load_blob` returns `None` when no blob exists yet (first run);
/// `save_blob` replaces the whole blob in one call and should be as close
/// to atomic as the backing store allows.
pub trait CacheStore {
    fn load_blob(&self) -> Result<Option<Vec<u8>>>;
    fn save_blob(&self, bytes: &[u8]) -> Result<()>;
}

impl<T: PhotoSource + ?Sized> PhotoSource for &T {
    fn list_files(&self) -> Result<Vec<SourceFile>> {
        (**self).list_files()
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        (**self).fetch(id)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for &T {
    fn load_blob(&self) -> Result<Option<Vec<u8>>> {
        (**self).load_blob()
    }

    fn save_blob(&self, bytes: &[u8]) -> Result<()> {
        (**self).save_blob(bytes)
    }
}
