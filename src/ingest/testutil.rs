//! Hand-built EXIF fixtures for tests.
//!
//! TIFF layout written by `TagFixture::tiff` (little-endian, offsets from
//! the "II" header):
//!   0..8      header ("II" + 0x002A + IFD0 offset = 8)
//!   8..       IFD0 with up to 2 entries: ExifIFD pointer (0x8769),
//!             GPSInfo pointer (0x8825)
//!   then      ExifIFD (DateTimeOriginal 0x9003, value in the value area)
//!   then      GPS IFD (refs inline, DMS rationals in the value area)
//!   then      value area (datetime string, rational triples)

use std::io::Cursor;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

/// Declarative EXIF content; absent fields produce absent tags, so the
/// missing-reference and missing-axis cases are directly expressible.
#[derive(Default)]
pub struct TagFixture<'a> {
    pub datetime: Option<&'a str>,
    pub lat: Option<[(u32, u32); 3]>,
    pub lat_ref: Option<&'a str>,
    pub lon: Option<[(u32, u32); 3]>,
    pub lon_ref: Option<&'a str>,
}

struct Entry {
    tag: u16,
    typ: u16,
    count: u32,
    /// inline value (≤ 4 bytes) or a payload placed in the value area
    data: EntryData,
}

enum EntryData {
    Inline([u8; 4]),
    Payload(Vec<u8>),
}

fn ascii_entry(tag: u16, s: &str) -> Entry {
    assert!(s.len() <= 3, "inline ASCII fixture values only");
    let mut inline = [0u8; 4];
    inline[..s.len()].copy_from_slice(s.as_bytes());
    Entry {
        tag,
        typ: TYPE_ASCII,
        count: (s.len() + 1) as u32,
        data: EntryData::Inline(inline),
    }
}

fn rational_entry(tag: u16, triple: &[(u32, u32); 3]) -> Entry {
    let mut payload = Vec::with_capacity(24);
    for (num, den) in triple {
        payload.extend_from_slice(&num.to_le_bytes());
        payload.extend_from_slice(&den.to_le_bytes());
    }
    Entry {
        tag,
        typ: TYPE_RATIONAL,
        count: 3,
        data: EntryData::Payload(payload),
    }
}

fn pointer_entry(tag: u16, offset: u32) -> Entry {
    Entry {
        tag,
        typ: TYPE_LONG,
        count: 1,
        data: EntryData::Inline(offset.to_le_bytes()),
    }
}

/// Serialize one IFD given the absolute offset where the shared value area
/// starts; payloads are appended to `values` and referenced by offset.
fn write_ifd(out: &mut Vec<u8>, entries: &[Entry], value_base: u32, values: &mut Vec<u8>) {
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&entry.tag.to_le_bytes());
        out.extend_from_slice(&entry.typ.to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        match &entry.data {
            EntryData::Inline(v) => out.extend_from_slice(v),
            EntryData::Payload(p) => {
                let offset = value_base + values.len() as u32;
                out.extend_from_slice(&offset.to_le_bytes());
                values.extend_from_slice(p);
            }
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // next IFD
}

fn ifd_len(entry_count: usize) -> usize {
    2 + 12 * entry_count + 4
}

impl TagFixture<'_> {
    fn gps_entries(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        // GPS IFD tag order: 0x0001 LatRef, 0x0002 Lat, 0x0003 LonRef, 0x0004 Lon
        if let Some(r) = self.lat_ref {
            entries.push(ascii_entry(0x0001, r));
        }
        if let Some(dms) = &self.lat {
            entries.push(rational_entry(0x0002, dms));
        }
        if let Some(r) = self.lon_ref {
            entries.push(ascii_entry(0x0003, r));
        }
        if let Some(dms) = &self.lon {
            entries.push(rational_entry(0x0004, dms));
        }
        entries
    }

    /// Build the raw TIFF block (what an APP1 segment carries after the
    /// "Exif\0\0" marker).
    pub fn tiff(&self) -> Vec<u8> {
        let gps_entries = self.gps_entries();
        let has_exif_ifd = self.datetime.is_some();
        let has_gps_ifd = !gps_entries.is_empty();

        let ifd0_count = has_exif_ifd as usize + has_gps_ifd as usize;
        let ifd0_start = 8usize;
        let exif_start = ifd0_start + ifd_len(ifd0_count);
        let exif_ifd_len = if has_exif_ifd { ifd_len(1) } else { 0 };
        let gps_start = exif_start + exif_ifd_len;
        let gps_ifd_len = if has_gps_ifd {
            ifd_len(gps_entries.len())
        } else {
            0
        };
        let value_base = (gps_start + gps_ifd_len) as u32;

        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&[0x2A, 0x00]);
        out.extend_from_slice(&(ifd0_start as u32).to_le_bytes());

        let mut values = Vec::new();

        // IFD0: pointers in ascending tag order (0x8769 < 0x8825)
        let mut ifd0 = Vec::new();
        if has_exif_ifd {
            ifd0.push(pointer_entry(0x8769, exif_start as u32));
        }
        if has_gps_ifd {
            ifd0.push(pointer_entry(0x8825, gps_start as u32));
        }
        write_ifd(&mut out, &ifd0, value_base, &mut values);
        assert_eq!(out.len(), exif_start);

        if let Some(dt) = self.datetime {
            assert_eq!(dt.len(), 19, "EXIF datetime must be 'YYYY:MM:DD HH:MM:SS'");
            let mut payload = dt.as_bytes().to_vec();
            payload.push(0);
            let entry = Entry {
                tag: 0x9003,
                typ: TYPE_ASCII,
                count: 20,
                data: EntryData::Payload(payload),
            };
            write_ifd(&mut out, std::slice::from_ref(&entry), value_base, &mut values);
        }
        assert_eq!(out.len(), gps_start);

        if has_gps_ifd {
            write_ifd(&mut out, &gps_entries, value_base, &mut values);
        }
        assert_eq!(out.len(), value_base as usize);

        out.extend_from_slice(&values);
        out
    }

    /// Wrap the TIFF block in a JPEG APP1 envelope. With `decodable` the
    /// body is a real 50×50 scan so `image::open` succeeds; without it the
    /// file ends right after the tag block, so only the tag reader works.
    pub fn jpeg(&self, decodable: bool) -> Vec<u8> {
        let tiff = self.tiff();
        let mut app1_data = b"Exif\x00\x00".to_vec();
        app1_data.extend_from_slice(&tiff);
        let app1_len = (app1_data.len() + 2) as u16;

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(&[0xFF, 0xD8]); // SOI
        out.extend_from_slice(&[0xFF, 0xE1]); // APP1 marker
        out.extend_from_slice(&app1_len.to_be_bytes());
        out.extend_from_slice(&app1_data);
        if decodable {
            // Splice in a real encoded body, minus its SOI.
            out.extend_from_slice(&plain_jpeg(50, 50)[2..]);
        } else {
            out.extend_from_slice(&[0xFF, 0xD9]); // EOI
        }
        out
    }
}

/// A decodable JPEG with no EXIF segment.
pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}
