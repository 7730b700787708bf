use nalgebra as na;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// side length of the black square
    pub tag_size_meter: f64,
}

impl Default for TagConfig {
    fn default() -> Self {
        // 6.5 inch FRC tag
        Self {
            tag_size_meter: 0.1651,
        }
    }
}

/// Tag corners in the tag frame, in detector order:
/// top left, top right, bottom right, bottom left, centered on the origin.
pub fn tag_corners_3d(tag_size_meter: f64) -> [na::Point3<f64>; 4] {
    let h = tag_size_meter / 2.0;
    [
        na::Point3::new(-h, h, 0.0),
        na::Point3::new(h, h, 0.0),
        na::Point3::new(h, -h, 0.0),
        na::Point3::new(-h, -h, 0.0),
    ]
}
