use nalgebra as na;
use sqpnp_simple::sqpnp_solve_glam;

use crate::camera::CameraModel;
use crate::error::{FieldMapError, Result};
use crate::tag::tag_corners_3d;
use crate::transform::HomogeneousTransform;
use crate::types::{RvecTvec, TagObservation};

/// Camera-to-tag transform from the four detected corners of one tag.
///
/// Corners are pixel coordinates in detector order (see [`tag_corners_3d`]).
pub fn estimate_tag_pose(
    tag_id: u32,
    corners: &[(f32, f32); 4],
    tag_size_meter: f64,
    camera: &CameraModel,
) -> Result<TagObservation> {
    let p3ds: Vec<glam::Vec3> = tag_corners_3d(tag_size_meter)
        .iter()
        .map(|p| glam::Vec3::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    let p2ds_z: Vec<glam::Vec2> = corners
        .iter()
        .map(|&(u, v)| {
            let xy = camera.undistort_point(&na::Vector2::new(u as f64, v as f64));
            glam::Vec2::new(xy.x as f32, xy.y as f32)
        })
        .collect();

    let rt: RvecTvec = sqpnp_solve_glam(&p3ds, &p2ds_z)
        .ok_or(FieldMapError::PnpFailed { tag_id })?
        .into();
    if !(rt.rvec.iter().chain(rt.tvec.iter()).all(|v| v.is_finite())) || rt.tvec.z <= 0.0 {
        return Err(FieldMapError::PnpFailed { tag_id });
    }
    Ok(TagObservation::new(tag_id, rt.to_transform()))
}

/// Projects the corners of a tag at `camera_to_tag` into pixels.
pub fn project_tag_corners(
    camera_to_tag: &HomogeneousTransform,
    tag_size_meter: f64,
    camera: &CameraModel,
) -> Option<[(f32, f32); 4]> {
    let corners = crate::transform::transform_points(camera_to_tag, &tag_corners_3d(tag_size_meter));
    let mut pixels = [(0.0f32, 0.0f32); 4];
    for (px, p) in pixels.iter_mut().zip(&corners) {
        let uv = camera.project(&p.coords)?;
        *px = (uv.x as f32, uv.y as f32);
    }
    Some(pixels)
}
