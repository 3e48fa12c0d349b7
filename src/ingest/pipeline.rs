use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingest::decode::ImageCodec;
use crate::ingest::{artifacts, geotag};
use crate::photos::cache::ArtifactCache;
use crate::photos::model::{
    ArtifactRef, CacheRecord, PhotoRecord, ProcessingStatus, RunStats, SourceFile,
};
use crate::source::{CacheStore, PhotoSource};
use rayon::prelude::*;

/// Everything one run produces: the output rows in listing order plus the
/// counters for the summary.
#[derive(Debug)]
pub struct PipelineRun {
    pub records: Vec<PhotoRecord>,
    pub stats: RunStats,
}

/// Orchestrates listing → fetch → decode → geotag → artifacts → cache.
///
/// Collaborators come in through the constructor; the pipeline holds no
/// ambient clients. Per-file failures are contained at the file boundary;
/// only a failed listing, an unreadable cache blob, or a failed flush abort
/// the run.
pub struct Pipeline<S, C> {
    source: S,
    cache_store: C,
    config: PipelineConfig,
}

/// What the sequential fetch stage hands to the parallel CPU stage.
enum Visit {
    Hit(SourceFile),
    Process(SourceFile, Vec<u8>),
    /// Fetch failed; already counted and logged.
    Skipped,
}

/// Per-file result of the CPU stage, merged single-threaded afterwards.
enum FileOutcome {
    Hit(String),
    NewRecord(String, CacheRecord),
    SkipDecode { name: String, message: String },
    SkipArtifact { name: String, message: String },
    SkipCounted,
}

impl<S: PhotoSource, C: CacheStore> Pipeline<S, C> {
    pub fn new(source: S, cache_store: C, config: PipelineConfig) -> Self {
        Self {
            source,
            cache_store,
            config,
        }
    }

    pub fn run(&self) -> Result<PipelineRun> {
        let files = self.source.list_files()?;
        let mut cache = ArtifactCache::load(&self.cache_store)?;
        let mut stats = RunStats {
            listed: files.len(),
            ..Default::default()
        };
        tracing::info!(
            "pipeline: {} file(s) listed, {} already cached",
            files.len(),
            cache.len()
        );

        // ── Fetch stage: sequential, listing order. The cache lookup is the
        // only gate: a hit means the bytes are never requested again.
        let mut visits: Vec<Visit> = Vec::with_capacity(files.len());
        for file in files {
            if cache.contains(&file.id) {
                stats.cache_hits += 1;
                visits.push(Visit::Hit(file));
                continue;
            }
            match self.source.fetch(&file.id) {
                Ok(bytes) => {
                    stats.downloaded += 1;
                    visits.push(Visit::Process(file, bytes));
                }
                Err(e) => {
                    // Not cached, so the next run retries the fetch.
                    tracing::warn!("pipeline: skipping {}: {}", file.name, e);
                    stats.skipped_download += 1;
                    stats.log_error(e.to_string());
                    visits.push(Visit::Skipped);
                }
            }
        }

        tracing::info!(
            "pipeline: fetch complete — {} new, {} cache hit(s), {} skipped",
            stats.downloaded,
            stats.cache_hits,
            stats.skipped_download
        );

        // ── CPU stage: decode/geotag/artifacts on a capped worker pool.
        // No shared state; outcome order mirrors listing order.
        let config = &self.config;
        let pool = build_pool();
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            visits
                .par_iter()
                .map(|visit| match visit {
                    Visit::Hit(file) => FileOutcome::Hit(file.id.clone()),
                    Visit::Skipped => FileOutcome::SkipCounted,
                    Visit::Process(file, bytes) => process_file(file, bytes, config),
                })
                .collect()
        });

        // ── Merge stage: single writer for cache and stats, listing order.
        let mut records: Vec<PhotoRecord> = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Hit(id) => {
                    // contains() returned true for this id in the fetch stage
                    if let Some(record) = cache.get(&id) {
                        count_status(&mut stats, record.status);
                        records.push(PhotoRecord::from_cache_record(record));
                    }
                }
                FileOutcome::NewRecord(id, record) => {
                    count_status(&mut stats, record.status);
                    records.push(PhotoRecord::from_cache_record(&record));
                    cache.insert(id, record);
                }
                FileOutcome::SkipDecode { name, message } => {
                    tracing::warn!("pipeline: skipping {}: {}", name, message);
                    stats.skipped_decode += 1;
                    stats.log_error(format!("{}: {}", name, message));
                }
                FileOutcome::SkipArtifact { name, message } => {
                    tracing::warn!("pipeline: skipping {}: {}", name, message);
                    stats.skipped_artifacts += 1;
                    stats.log_error(format!("{}: {}", name, message));
                }
                FileOutcome::SkipCounted => {}
            }
        }

        // One flush for the whole merged map. Failing here is fatal: work
        // that never reaches the store is invisible to the next run.
        cache.flush(&self.cache_store)?;

        tracing::info!(
            "pipeline: done — {} mapped, {} without coordinates, {} skipped",
            stats.mapped,
            stats.no_coordinate,
            stats.skipped()
        );

        Ok(PipelineRun { records, stats })
    }
}

fn count_status(stats: &mut RunStats, status: ProcessingStatus) {
    match status {
        ProcessingStatus::Mapped => stats.mapped += 1,
        ProcessingStatus::NoCoordinate => stats.no_coordinate += 1,
    }
}

fn process_file(file: &SourceFile, bytes: &[u8], config: &PipelineConfig) -> FileOutcome {
    let Some(codec) = ImageCodec::for_file(&file.mime_type, &file.name) else {
        return FileOutcome::SkipDecode {
            name: file.name.clone(),
            message: format!("no codec for declared type {:?}", file.mime_type),
        };
    };

    let image = match codec.decode(&file.name, bytes) {
        Ok(image) => image,
        // Deliberately not cached: a future codec may handle this file.
        Err(e) => {
            return FileOutcome::SkipDecode {
                name: file.name.clone(),
                message: e.to_string(),
            }
        }
    };

    let tag = geotag::extract(&file.name, bytes, codec, Some(&image));
    if !tag.has_coordinate() {
        tracing::debug!(
            "pipeline: {} has no coordinate, cached without artifacts",
            file.name
        );
        return FileOutcome::NewRecord(
            file.id.clone(),
            CacheRecord {
                filename: file.name.clone(),
                latitude: None,
                longitude: None,
                datetime: tag.datetime,
                icon: None,
                preview: None,
                status: ProcessingStatus::NoCoordinate,
            },
        );
    }

    let icon = artifacts::make_icon(&file.name, &image, &config.icon);
    let preview = artifacts::make_preview(&file.name, &image, &config.preview);
    match (icon, preview) {
        (Ok(icon), Ok(preview)) => FileOutcome::NewRecord(
            file.id.clone(),
            CacheRecord {
                filename: file.name.clone(),
                latitude: tag.latitude,
                longitude: tag.longitude,
                datetime: tag.datetime,
                icon: Some(ArtifactRef::inline(config.icon.format, &icon)),
                preview: Some(ArtifactRef::inline(config.preview.format, &preview)),
                status: ProcessingStatus::Mapped,
            },
        ),
        (Err(e), _) | (_, Err(e)) => FileOutcome::SkipArtifact {
            name: file.name.clone(),
            message: e.to_string(),
        },
    }
}

/// Worker pool for the CPU-bound stage; leaves two cores for everything
/// else, never less than one thread.
fn build_pool() -> rayon::ThreadPool {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(2).max(1))
        .unwrap_or(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap_or_else(|_| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .build()
                .expect("single-thread pool")
        })
}
