//! Photomap plots geotagged photos on a static Leaflet map, incrementally.
//!
//! The pipeline lists photo files from a [`source::PhotoSource`], extracts
//! embedded GPS and capture-time metadata, derives a circular marker icon
//! and a popup preview per photo, and records everything in a JSON cache
//! keyed by source-file identity so later runs only touch new files.
//! [`render::map_html`] turns the resulting rows into a self-contained page.

pub mod config;
pub mod error;
pub mod ingest;
pub mod photos;
pub mod render;
pub mod source;

pub use config::{IconConfig, PipelineConfig, PreviewConfig};
pub use error::{MapError, Result};
pub use ingest::pipeline::{Pipeline, PipelineRun};
pub use photos::model::{GeoTag, PhotoRecord, RunStats, SourceFile};
pub use source::{CacheStore, PhotoSource};
