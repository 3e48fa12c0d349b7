use crate::error::{MapError, Result};
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

/// The closed set of decode paths. Every format-dependent branch in the
/// pipeline goes through this one dispatch point; nothing else inspects
/// MIME strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    /// Common encoded raster formats, handled by the image crate directly.
    Raster,
    /// Camera RAW containers. Pixels come out of the proprietary container
    /// via libraw; tags are only reachable through `tag_carrier`.
    CameraRaw,
}

const RASTER_MIMES: &[&str] = &["image/jpeg", "image/png", "image/tiff", "image/webp"];
const RAW_MIMES: &[&str] = &[
    "image/x-canon-cr2",
    "image/x-canon-cr3",
    "image/x-sony-arw",
    "image/x-nikon-nef",
    "image/x-adobe-dng",
];
const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];
const RAW_EXTENSIONS: &[&str] = &["cr2", "cr3", "arw", "nef", "dng"];

impl ImageCodec {
    /// Select a codec from the declared MIME type, falling back to the
    /// filename extension when the declaration is missing or unknown.
    pub fn for_file(mime_type: &str, name: &str) -> Option<ImageCodec> {
        let mime = mime_type.trim().to_lowercase();
        if RASTER_MIMES.contains(&mime.as_str()) {
            return Some(ImageCodec::Raster);
        }
        if RAW_MIMES.contains(&mime.as_str()) {
            return Some(ImageCodec::CameraRaw);
        }

        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())?;
        if RASTER_EXTENSIONS.contains(&ext.as_str()) {
            Some(ImageCodec::Raster)
        } else if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(ImageCodec::CameraRaw)
        } else {
            None
        }
    }

    /// Decode raw file bytes into pixels, normalized to RGB8 or RGBA8.
    /// Never panics; corrupt or truncated input becomes a `Decode` error.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Result<DynamicImage> {
        let codec = *self;
        let outcome = std::panic::catch_unwind(|| match codec {
            ImageCodec::Raster => decode_raster(bytes),
            ImageCodec::CameraRaw => decode_camera_raw(bytes),
        });
        match outcome {
            Ok(Some(img)) => Ok(normalize_color(img)),
            Ok(None) => Err(MapError::Decode {
                name: name.to_string(),
                message: "unreadable or truncated image data".to_string(),
            }),
            Err(_) => {
                tracing::warn!("decode: panic contained while decoding {}", name);
                Err(MapError::Decode {
                    name: name.to_string(),
                    message: "decoder panicked".to_string(),
                })
            }
        }
    }

    /// Produce the byte buffer the EXIF reader should run against.
    ///
    /// Raster bytes carry their tags as-is. A RAW container does not expose
    /// its tags to the generic reader, so the decoded pixels are re-encoded
    /// to JPEG in memory and the reader runs on that buffer instead.
    /// Requires the decoded image; returns None without it.
    pub fn tag_carrier<'a>(
        &self,
        bytes: &'a [u8],
        decoded: Option<&DynamicImage>,
    ) -> Option<Cow<'a, [u8]>> {
        match self {
            ImageCodec::Raster => Some(Cow::Borrowed(bytes)),
            ImageCodec::CameraRaw => {
                let img = decoded?;
                let mut buf = Cursor::new(Vec::new());
                img.to_rgb8()
                    .write_to(&mut buf, image::ImageFormat::Jpeg)
                    .ok()?;
                Some(Cow::Owned(buf.into_inner()))
            }
        }
    }
}

fn decode_raster(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(bytes).ok()
}

/// Pull the largest embedded JPEG body out of a RAW container and decode
/// that. Cameras embed a full-size or near-full-size preview, which is all
/// the derived artifacts need.
fn decode_camera_raw(bytes: &[u8]) -> Option<DynamicImage> {
    let mut raw = rsraw::RawImage::open(bytes).ok()?;
    let thumbs = raw.extract_thumbs().ok()?;
    let jpeg = thumbs
        .into_iter()
        .filter(|t| matches!(t.format, rsraw::ThumbFormat::Jpeg))
        .max_by_key(|t| t.data.len())?;
    decode_raster(&jpeg.data)
}

/// Convert palette/grayscale/16-bit images to the two color models the rest
/// of the pipeline works with.
fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}
