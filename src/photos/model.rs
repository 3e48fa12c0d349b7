use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// One entry of the external file listing. `id` is an opaque identifier
/// assigned by the storage backend; it is stable across runs and serves as
/// the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// Coordinates and capture time pulled from embedded metadata.
///
/// Latitude and longitude are either both present or both absent: a value
/// without its hemisphere reference is dropped, never half-kept. `datetime`
/// carries the EXIF `DateTimeOriginal` string ("YYYY:MM:DD HH:MM:SS")
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<String>,
}

impl GeoTag {
    pub fn has_coordinate(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Parse an EXIF datetime string ("YYYY:MM:DD HH:MM:SS") as UTC.
pub fn parse_exif_datetime(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    if s.len() < 19 {
        return None;
    }
    // "2024:03:15 12:30:45" → "2024-03-15 12:30:45"
    let date = s[..10].replace(':', "-");
    let normalized = format!("{} {}", date, &s[11..19]);
    let ndt = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(chrono::Utc.from_utc_datetime(&ndt))
}

/// Encoding of a derived artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Png,
    Jpeg,
    Webp,
}

impl ArtifactFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "image/png",
            ArtifactFormat::Jpeg => "image/jpeg",
            ArtifactFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Webp => "webp",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            ArtifactFormat::Png => image::ImageFormat::Png,
            ArtifactFormat::Jpeg => image::ImageFormat::Jpeg,
            ArtifactFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

/// Reference to a derived artifact: either the encoded bytes carried inline
/// (base64, so the cache blob stays a plain JSON object) or a URL into
/// whatever external sink the pipeline was configured with. Exactly one
/// representation is populated per artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum ArtifactRef {
    Inline {
        encoding: ArtifactFormat,
        data: String,
    },
    Url {
        url: String,
    },
}

impl ArtifactRef {
    pub fn inline(encoding: ArtifactFormat, bytes: &[u8]) -> Self {
        ArtifactRef::Inline {
            encoding,
            data: BASE64.encode(bytes),
        }
    }

    /// Render as something an `<img src=...>` can consume directly.
    pub fn to_src(&self) -> String {
        match self {
            ArtifactRef::Inline { encoding, data } => {
                format!("data:{};base64,{}", encoding.mime_type(), data)
            }
            ArtifactRef::Url { url } => url.clone(),
        }
    }

    /// Decode the inline payload back to bytes. `None` for URL refs.
    pub fn decode_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ArtifactRef::Inline { data, .. } => BASE64.decode(data).ok(),
            ArtifactRef::Url { .. } => None,
        }
    }
}

/// How far a cached file got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Coordinates and both artifacts present; shows up as a marker.
    Mapped,
    /// No usable GPS tags; cached so the bytes are never fetched again,
    /// but excluded from the marker list.
    NoCoordinate,
}

/// Everything the pipeline learned about one source file. Written to the
/// cache on first successful processing and never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<String>,
    pub icon: Option<ArtifactRef>,
    pub preview: Option<ArtifactRef>,
    pub status: ProcessingStatus,
}

/// One output row handed to the renderer, in listing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub filename: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<String>,
    pub icon: Option<ArtifactRef>,
    pub preview: Option<ArtifactRef>,
}

impl PhotoRecord {
    pub fn from_cache_record(record: &CacheRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            datetime: record.datetime.clone(),
            icon: record.icon.clone(),
            preview: record.preview.clone(),
        }
    }

    /// True when the renderer can place a marker for this row.
    pub fn has_marker(&self) -> bool {
        self.latitude.is_some()
            && self.longitude.is_some()
            && self.icon.is_some()
            && self.preview.is_some()
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub listed: usize,
    pub cache_hits: usize,
    pub downloaded: usize,
    pub mapped: usize,
    pub no_coordinate: usize,
    pub skipped_download: usize,
    pub skipped_decode: usize,
    pub skipped_artifacts: usize,
    pub errors: usize,
    /// capped at 100 entries
    pub error_log: Vec<String>,
}

impl RunStats {
    pub fn log_error(&mut self, msg: String) {
        self.errors += 1;
        if self.error_log.len() < 100 {
            self.error_log.push(msg);
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_download + self.skipped_decode + self.skipped_artifacts
    }
}
