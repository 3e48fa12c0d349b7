//! Static Leaflet page over the pipeline's record rows.
//!
//! Pure string formatting: no image or metadata work happens here. Rows
//! without a coordinate or without artifacts are silently skipped; they
//! are cached facts, not markers.

use crate::photos::model::{parse_exif_datetime, PhotoRecord};

/// Pixel sizes the page hardcodes; the pipeline guarantees the artifacts
/// actually have these dimensions.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Full side of the icon square (diameter + frame).
    pub icon_size: u32,
    /// Display width of the popup preview.
    pub preview_width: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            icon_size: 58,
            preview_width: 480,
        }
    }
}

/// Render the complete self-contained map page.
pub fn map_html(records: &[PhotoRecord], options: &RenderOptions) -> String {
    let mut lines: Vec<String> = vec![
        "<!DOCTYPE html>".into(),
        "<html><head><meta charset='utf-8'><title>Photo Map</title>".into(),
        "<style>#map { height: 100vh; width: 100%; }</style>".into(),
        "<link rel='stylesheet' href='https://unpkg.com/leaflet@1.9.4/dist/leaflet.css'/>".into(),
        "<script src='https://unpkg.com/leaflet@1.9.4/dist/leaflet.js'></script></head><body>".into(),
        "<div id='map'></div><script>".into(),
        "var map = L.map('map').setView([35.0, 138.0], 5);".into(),
        "L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {maxZoom:19}).addTo(map);".into(),
        "var markers = [];".into(),
        "var bounds = L.latLngBounds();".into(),
    ];

    for record in records.iter().filter(|r| r.has_marker()) {
        lines.push(marker_block(record, options));
    }

    lines.push(format!(
        r#"if (!bounds.isEmpty()) {{ map.fitBounds(bounds.pad(0.2)); }}

map.on('zoomend', function() {{
    var zoom = map.getZoom();
    var scale = Math.min(zoom / 5, 1.2);
    markers.forEach(function(m) {{
        var img = m.getElement().querySelector('img');
        if (img) {{
            var size = {size} * scale;
            if (size > {max}) {{ size = {max}; }}
            img.style.width = size + 'px';
            img.style.height = size + 'px';
        }}
    }});
}});"#,
        size = options.icon_size,
        max = options.icon_size * 6 / 5
    ));
    lines.push("</script></body></html>".into());
    lines.join("\n")
}

fn marker_block(record: &PhotoRecord, options: &RenderOptions) -> String {
    // has_marker() checked by the caller
    let (Some(lat), Some(lon), Some(icon), Some(preview)) = (
        record.latitude,
        record.longitude,
        record.icon.as_ref(),
        record.preview.as_ref(),
    ) else {
        return String::new();
    };

    let filename = escape_html(&record.filename);
    // Show the capture time in a readable form; fall back to the raw EXIF
    // string when it does not parse.
    let datetime = record
        .datetime
        .as_deref()
        .map(|raw| match parse_exif_datetime(raw) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => raw.to_string(),
        })
        .map(|s| escape_html(&s))
        .unwrap_or_default();

    format!(
        r#"var icon = L.icon({{iconUrl: '{icon_src}', iconSize: [{size},{size}]}});
var marker = L.marker([{lat}, {lon}], {{icon: icon}}).addTo(map);
markers.push(marker);
bounds.extend([{lat}, {lon}]);
marker.bindPopup("<b>{filename}</b><br>{datetime}<br>"
+ "<a href='https://www.google.com/maps/search/?api=1&query={lat},{lon}' target='_blank'>Open in Google Maps</a><br>"
+ "<img src='{preview_src}' width='{preview_width}'/>");"#,
        icon_src = icon.to_src(),
        size = options.icon_size,
        lat = lat,
        lon = lon,
        filename = filename,
        datetime = datetime,
        preview_src = preview.to_src(),
        preview_width = options.preview_width,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
