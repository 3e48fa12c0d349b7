use crate::config::{IconConfig, PreviewConfig};
use crate::error::{MapError, Result};
use crate::photos::model::ArtifactFormat;
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Working resolution for the icon mask. The circle is cut at this size and
/// only then scaled down to the requested diameter, so the mask edge stays
/// clean at small output sizes.
const ICON_SUPERSAMPLE: u32 = 256;

/// Build the circular marker icon.
///
/// Center-crop to a square on the shorter side, supersample, cut a hard
/// circular alpha mask, scale down to `diameter`, then center on an opaque
/// white square frame when a border is configured. The output always
/// decodes to `diameter + 2 * border` pixels square, whatever the source
/// aspect ratio.
pub fn make_icon(name: &str, img: &DynamicImage, config: &IconConfig) -> Result<Vec<u8>> {
    if config.diameter == 0 {
        return Err(MapError::Artifact {
            name: name.to_string(),
            message: "icon diameter must be positive".to_string(),
        });
    }

    let square = center_crop_square(img);
    let base = square
        .resize_exact(
            ICON_SUPERSAMPLE,
            ICON_SUPERSAMPLE,
            image::imageops::FilterType::Lanczos3,
        )
        .to_rgba8();
    let masked = apply_circle_mask(base);
    let circle = DynamicImage::ImageRgba8(masked).resize_exact(
        config.diameter,
        config.diameter,
        image::imageops::FilterType::Lanczos3,
    );

    let framed = if config.border > 0 {
        let side = config.diameter + 2 * config.border;
        let mut canvas = RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255]));
        image::imageops::overlay(
            &mut canvas,
            &circle,
            config.border as i64,
            config.border as i64,
        );
        DynamicImage::ImageRgba8(canvas)
    } else {
        circle
    };

    encode(name, framed, config.format)
}

/// Build the popup preview: aspect-preserving resize so the long edge is
/// exactly `min(long_edge, native_long * upscale_factor)`.
pub fn make_preview(name: &str, img: &DynamicImage, config: &PreviewConfig) -> Result<Vec<u8>> {
    if config.long_edge == 0 {
        return Err(MapError::Artifact {
            name: name.to_string(),
            message: "preview long edge must be positive".to_string(),
        });
    }

    let native_long = img.width().max(img.height());
    let scaled_long = (native_long as f32 * config.upscale_factor).round() as u32;
    let target = config.long_edge.min(scaled_long).max(1);
    let resized = img.resize(target, target, image::imageops::FilterType::Lanczos3);
    encode(name, resized, config.format)
}

fn center_crop_square(img: &DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let side = w.min(h);
    let x = (w - side) / 2;
    let y = (h - side) / 2;
    img.crop_imm(x, y, side, side)
}

/// Zero out the alpha of every pixel outside the inscribed circle. Hard
/// edge; the later downscale does the smoothing.
fn apply_circle_mask(mut img: RgbaImage) -> RgbaImage {
    let side = img.width() as f32;
    let center = side / 2.0;
    let radius = side / 2.0;
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        if dx * dx + dy * dy > radius * radius {
            pixel[3] = 0;
        }
    }
    img
}

fn encode(name: &str, img: DynamicImage, format: ArtifactFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel; flatten before encoding.
    let img = match format {
        ArtifactFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format.image_format())
        .map_err(|e| MapError::Artifact {
            name: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(buf.into_inner())
}
