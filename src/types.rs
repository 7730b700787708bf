use nalgebra as na;

use crate::transform::HomogeneousTransform;

/// Rotation vector and translation as returned by a PnP solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RvecTvec {
    pub rvec: na::Vector3<f64>,
    pub tvec: na::Vector3<f64>,
}

impl RvecTvec {
    pub fn new(rvec: na::Vector3<f64>, tvec: na::Vector3<f64>) -> RvecTvec {
        RvecTvec { rvec, tvec }
    }

    /// Rotation through the exponential map of `rvec`.
    pub fn to_transform(&self) -> HomogeneousTransform {
        let rotation = na::Rotation3::new(self.rvec);
        HomogeneousTransform::from_parts(rotation.matrix(), &self.tvec)
    }
}

impl From<((f64, f64, f64), (f64, f64, f64))> for RvecTvec {
    fn from(value: ((f64, f64, f64), (f64, f64, f64))) -> Self {
        let (r, t) = value;
        RvecTvec::new(na::Vector3::new(r.0, r.1, r.2), na::Vector3::new(t.0, t.1, t.2))
    }
}

/// One detected tag in one frame: its camera-to-tag transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagObservation {
    pub tag_id: u32,
    pub transform: HomogeneousTransform,
}

impl TagObservation {
    pub fn new(tag_id: u32, transform: HomogeneousTransform) -> TagObservation {
        TagObservation { tag_id, transform }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameObservations {
    pub time_ns: i64,
    pub observations: Vec<TagObservation>,
}
