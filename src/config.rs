use crate::photos::model::ArtifactFormat;
use serde::{Deserialize, Serialize};

/// Marker icon settings.
///
/// The encoded icon is always `diameter + 2 * border` pixels square,
/// regardless of the source aspect ratio, so the page can hardcode its
/// `iconSize` without measuring anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconConfig {
    /// Diameter of the circular photo area, in pixels.
    pub diameter: u32,
    /// Width of the opaque white frame around the circle. 0 disables it.
    pub border: u32,
    pub format: ArtifactFormat,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            diameter: 50,
            border: 4,
            // PNG keeps the alpha mask outside the circle
            format: ArtifactFormat::Png,
        }
    }
}

/// Popup preview settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Upper bound on the long edge of the preview, in pixels.
    pub long_edge: u32,
    /// Multiplier applied to the source's native long edge before bounding.
    /// 1.0 means the preview never exceeds the native resolution; some
    /// deployments set this above 1.0 to enlarge small photos on purpose.
    pub upscale_factor: f32,
    pub format: ArtifactFormat,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            long_edge: 480,
            upscale_factor: 1.0,
            format: ArtifactFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub icon: IconConfig,
    pub preview: PreviewConfig,
}
