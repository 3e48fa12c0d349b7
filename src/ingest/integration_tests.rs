//! Full pipeline runs against in-memory collaborators.

use crate::config::PipelineConfig;
use crate::error::{MapError, Result};
use crate::ingest::pipeline::Pipeline;
use crate::ingest::testutil::{plain_jpeg, TagFixture};
use crate::photos::model::SourceFile;
use crate::source::{CacheStore, PhotoSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct FakeSource {
    files: Vec<SourceFile>,
    blobs: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new(entries: Vec<(&str, Vec<u8>)>) -> Self {
        let files = entries
            .iter()
            .map(|(name, _)| SourceFile {
                id: format!("id-{}", name),
                name: name.to_string(),
                mime_type: "image/jpeg".to_string(),
            })
            .collect();
        let blobs = entries
            .into_iter()
            .map(|(name, bytes)| (format!("id-{}", name), bytes))
            .collect();
        Self {
            files,
            blobs,
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PhotoSource for FakeSource {
    fn list_files(&self) -> Result<Vec<SourceFile>> {
        Ok(self.files.clone())
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.blobs.get(id).cloned().ok_or_else(|| MapError::Download {
            name: id.to_string(),
            message: "no such blob".to_string(),
        })
    }
}

#[derive(Default)]
struct MemStore {
    blob: Mutex<Option<Vec<u8>>>,
    fail_save: bool,
}

impl CacheStore for MemStore {
    fn load_blob(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().unwrap().clone())
    }

    fn save_blob(&self, bytes: &[u8]) -> Result<()> {
        if self.fail_save {
            return Err(MapError::CachePersist("store unavailable".to_string()));
        }
        *self.blob.lock().unwrap() = Some(bytes.to_vec());
        Ok(())
    }
}

fn cached_ids(store: &MemStore) -> Vec<String> {
    let blob = store.blob.lock().unwrap().clone();
    match blob {
        None => vec![],
        Some(bytes) => {
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
    }
}

fn geotagged_jpeg() -> Vec<u8> {
    TagFixture {
        datetime: Some("2023:08:01 10:20:30"),
        lat: Some([(35, 1), (30, 1), (0, 1)]),
        lat_ref: Some("N"),
        lon: Some([(139, 1), (45, 1), (0, 1)]),
        lon_ref: Some("E"),
        ..Default::default()
    }
    .jpeg(true)
}

fn southern_jpeg() -> Vec<u8> {
    TagFixture {
        lat: Some([(33, 1), (52, 1), (0, 1)]),
        lat_ref: Some("S"),
        lon: Some([(151, 1), (12, 1), (0, 1)]),
        lon_ref: Some("E"),
        ..Default::default()
    }
    .jpeg(true)
}

#[test]
fn test_empty_listing_produces_no_records() {
    let source = FakeSource::new(vec![]);
    let store = MemStore::default();
    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert!(run.records.is_empty());
    assert_eq!(run.stats.listed, 0);
    // Flush still happens, producing an empty object.
    assert_eq!(cached_ids(&store).len(), 0);
}

#[test]
fn test_end_to_end_mixed_inputs() {
    // One geotagged photo, one photo without GPS tags, one corrupt file:
    // expect 1 marker row, 1 cached-but-markerless row, 1 skip that leaves
    // no cache entry.
    let source = FakeSource::new(vec![
        ("tagged.jpg", geotagged_jpeg()),
        ("plain.jpg", plain_jpeg(40, 30)),
        ("broken.jpg", b"truncated garbage".to_vec()),
    ]);
    let store = MemStore::default();
    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();

    assert_eq!(run.records.len(), 2);
    let markers: Vec<_> = run.records.iter().filter(|r| r.has_marker()).collect();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].filename, "tagged.jpg");
    assert_eq!(markers[0].latitude, Some(35.5));
    assert_eq!(markers[0].longitude, Some(139.75));
    assert_eq!(markers[0].datetime.as_deref(), Some("2023:08:01 10:20:30"));
    assert!(markers[0].icon.is_some() && markers[0].preview.is_some());

    let plain = run
        .records
        .iter()
        .find(|r| r.filename == "plain.jpg")
        .unwrap();
    assert!(!plain.has_marker());
    assert!(plain.latitude.is_none());

    assert_eq!(run.stats.mapped, 1);
    assert_eq!(run.stats.no_coordinate, 1);
    assert_eq!(run.stats.skipped_decode, 1);
    assert_eq!(run.stats.errors, 1);

    // The corrupt file must not be cached; it is retried next run.
    assert_eq!(cached_ids(&store), vec!["id-plain.jpg", "id-tagged.jpg"]);
}

#[test]
fn test_second_run_is_idempotent_with_zero_downloads() {
    let source = FakeSource::new(vec![
        ("tagged.jpg", geotagged_jpeg()),
        ("plain.jpg", plain_jpeg(40, 30)),
    ]);
    let store = MemStore::default();

    let first = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert_eq!(source.fetch_count(), 2);

    let second = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert_eq!(source.fetch_count(), 2, "second run must not fetch anything");
    assert_eq!(second.records, first.records);
    assert_eq!(second.stats.cache_hits, 2);
    assert_eq!(second.stats.downloaded, 0);
    assert_eq!(second.stats.mapped, first.stats.mapped);
}

#[test]
fn test_cache_key_coverage_is_order_independent() {
    let tagged = geotagged_jpeg();
    let southern = southern_jpeg();
    let plain = plain_jpeg(24, 24);

    let forward = FakeSource::new(vec![
        ("a.jpg", tagged.clone()),
        ("b.jpg", southern.clone()),
        ("c.jpg", plain.clone()),
    ]);
    let reversed = FakeSource::new(vec![
        ("c.jpg", plain),
        ("b.jpg", southern),
        ("a.jpg", tagged),
    ]);

    let store_fwd = MemStore::default();
    let store_rev = MemStore::default();
    Pipeline::new(&forward, &store_fwd, PipelineConfig::default())
        .run()
        .unwrap();
    Pipeline::new(&reversed, &store_rev, PipelineConfig::default())
        .run()
        .unwrap();

    assert_eq!(cached_ids(&store_fwd), cached_ids(&store_rev));
}

#[test]
fn test_records_follow_listing_order_with_hits_interleaved() {
    // Prime the cache with b.jpg only, then list a, b, c: the cache hit
    // must stay in its listing position, not get grouped separately.
    let store = MemStore::default();
    let prime = FakeSource::new(vec![("b.jpg", southern_jpeg())]);
    Pipeline::new(&prime, &store, PipelineConfig::default())
        .run()
        .unwrap();

    let source = FakeSource::new(vec![
        ("a.jpg", geotagged_jpeg()),
        ("b.jpg", southern_jpeg()),
        ("c.jpg", plain_jpeg(20, 20)),
    ]);
    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();

    let names: Vec<&str> = run.records.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(run.stats.cache_hits, 1);
    // b.jpg came from the cache, not from a fresh fetch.
    assert_eq!(source.fetch_count(), 2);
}

#[test]
fn test_southern_western_hemisphere_signs_survive_the_cache() {
    let source = FakeSource::new(vec![("sydney.jpg", southern_jpeg())]);
    let store = MemStore::default();
    Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();

    // Re-run from cache and check the signed coordinate is intact.
    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    let record = &run.records[0];
    assert!((record.latitude.unwrap() - (-33.86666666666667)).abs() < 1e-9);
    assert!((record.longitude.unwrap() - 151.2).abs() < 1e-9);
}

#[test]
fn test_download_failure_skips_and_retries_next_run() {
    let mut source = FakeSource::new(vec![("ok.jpg", geotagged_jpeg())]);
    source.files.push(SourceFile {
        id: "id-missing.jpg".to_string(),
        name: "missing.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
    });
    let store = MemStore::default();

    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert_eq!(run.stats.skipped_download, 1);
    assert_eq!(run.records.len(), 1);
    assert_eq!(cached_ids(&store), vec!["id-ok.jpg"]);

    // The failed file is retried on the next run; the cached one is not.
    let fetches_before = source.fetch_count();
    Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert_eq!(source.fetch_count(), fetches_before + 1);
}

#[test]
fn test_unsupported_declared_type_is_skipped_uncached() {
    let mut source = FakeSource::new(vec![]);
    source.files.push(SourceFile {
        id: "id-doc".to_string(),
        name: "document".to_string(),
        mime_type: "application/pdf".to_string(),
    });
    source.blobs.insert("id-doc".to_string(), b"%PDF-1.4".to_vec());
    let store = MemStore::default();

    let run = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap();
    assert!(run.records.is_empty());
    assert_eq!(run.stats.skipped_decode, 1);
    assert!(cached_ids(&store).is_empty());
}

#[test]
fn test_flush_failure_is_fatal() {
    let source = FakeSource::new(vec![("tagged.jpg", geotagged_jpeg())]);
    let store = MemStore {
        fail_save: true,
        ..Default::default()
    };
    let err = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, MapError::CachePersist(_)));
}

#[test]
fn test_listing_failure_is_fatal() {
    struct BrokenSource;
    impl PhotoSource for BrokenSource {
        fn list_files(&self) -> Result<Vec<SourceFile>> {
            Err(MapError::Listing("cannot enumerate".to_string()))
        }
        fn fetch(&self, _id: &str) -> Result<Vec<u8>> {
            unreachable!("fetch must not be called when listing fails")
        }
    }
    let store = MemStore::default();
    let err = Pipeline::new(BrokenSource, &store, PipelineConfig::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, MapError::Listing(_)));
}

#[test]
fn test_corrupt_cache_blob_is_fatal() {
    let source = FakeSource::new(vec![("tagged.jpg", geotagged_jpeg())]);
    let store = MemStore::default();
    *store.blob.lock().unwrap() = Some(b"{ definitely not json".to_vec());
    let err = Pipeline::new(&source, &store, PipelineConfig::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, MapError::CacheLoad(_)));
    // Nothing was fetched before the failure surfaced.
    assert_eq!(source.fetch_count(), 0);
}

#[test]
fn test_marker_icon_has_configured_dimensions() {
    let source = FakeSource::new(vec![("tagged.jpg", geotagged_jpeg())]);
    let store = MemStore::default();
    let config = PipelineConfig::default();
    let side = config.icon.diameter + 2 * config.icon.border;
    let run = Pipeline::new(&source, &store, config).run().unwrap();

    let icon_bytes = run.records[0].icon.as_ref().unwrap().decode_bytes().unwrap();
    let icon = image::load_from_memory(&icon_bytes).unwrap();
    assert_eq!((icon.width(), icon.height()), (side, side));
}
