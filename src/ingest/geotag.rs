use crate::error::{MapError, Result};
use crate::ingest::decode::ImageCodec;
use crate::photos::model::GeoTag;
use image::DynamicImage;
use std::io::Cursor;

/// Extract coordinates and capture time from a file's embedded metadata.
/// Never fails: anything that goes wrong degrades to an all-absent GeoTag.
pub fn extract(
    name: &str,
    bytes: &[u8],
    codec: ImageCodec,
    decoded: Option<&DynamicImage>,
) -> GeoTag {
    let Some(carrier) = codec.tag_carrier(bytes, decoded) else {
        tracing::debug!("geotag: no tag carrier for {}", name);
        return GeoTag::default();
    };
    let carrier = carrier.as_ref();
    match std::panic::catch_unwind(|| read_geotag(name, carrier)) {
        Ok(Ok(tag)) => tag,
        Ok(Err(e)) => {
            tracing::warn!("geotag: {}", e);
            GeoTag::default()
        }
        Err(_) => {
            tracing::warn!("geotag: panic contained while reading tags for {}", name);
            GeoTag::default()
        }
    }
}

fn read_geotag(name: &str, carrier: &[u8]) -> Result<GeoTag> {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(carrier)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => {
            tracing::debug!("geotag: no tag block in {}", name);
            return Ok(GeoTag::default());
        }
        Err(e) => {
            return Err(MapError::Metadata {
                name: name.to_string(),
                message: e.to_string(),
            })
        }
    };
    Ok(geotag_from_exif(&exif))
}

/// Build a GeoTag from a parsed tag dictionary.
///
/// The coordinate requires the full triple per axis: value tag plus
/// reference tag, for both latitude and longitude. Anything less yields no
/// coordinate at all; a half-formed pair is never produced.
pub fn geotag_from_exif(exif: &exif::Exif) -> GeoTag {
    let coordinate = gps_coordinate(exif);
    GeoTag {
        latitude: coordinate.map(|(lat, _)| lat),
        longitude: coordinate.map(|(_, lon)| lon),
        datetime: ascii_value(exif, exif::Tag::DateTimeOriginal),
    }
}

fn gps_coordinate(exif: &exif::Exif) -> Option<(f64, f64)> {
    let lat_dms = dms_value(exif, exif::Tag::GPSLatitude)?;
    let lat_ref = reference_value(exif, exif::Tag::GPSLatitudeRef)?;
    let lon_dms = dms_value(exif, exif::Tag::GPSLongitude)?;
    let lon_ref = reference_value(exif, exif::Tag::GPSLongitudeRef)?;
    Some((
        signed_decimal(lat_dms, &lat_ref),
        signed_decimal(lon_dms, &lon_ref),
    ))
}

/// DMS rationals to signed decimal degrees.
///
/// Negation triggers whenever the reference is anything other than the two
/// positive-hemisphere literals: "S", "W", but also empty or malformed
/// values. Deployed pages depend on this exact rule; do not tighten it.
fn signed_decimal(dms: [f64; 3], reference: &str) -> f64 {
    let decimal = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;
    if reference == "N" || reference == "E" {
        decimal
    } else {
        -decimal
    }
}

fn dms_value(exif: &exif::Exif, tag: exif::Tag) -> Option<[f64; 3]> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) if v.len() >= 3 => {
            Some([v[0].to_f64(), v[1].to_f64(), v[2].to_f64()])
        }
        _ => None,
    }
}

/// The reference tag's value as a string. Absent field means None; a field
/// of an unexpected type still yields its display form, which then simply
/// fails the literal comparison in `signed_decimal`.
fn reference_value(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => {
            let raw = vecs.first()?;
            let s = std::str::from_utf8(raw).ok()?;
            Some(s.trim_end_matches('\0').trim().to_string())
        }
        _ => Some(field.display_value().to_string()),
    }
}

fn ascii_value(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => {
            let raw = vecs.first()?;
            let s = std::str::from_utf8(raw).ok()?;
            let trimmed = s.trim_end_matches('\0').trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}
