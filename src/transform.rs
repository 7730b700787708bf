//! Rigid transform algebra.
//!
//! Rotations are carried as `(w, x, y, z)` quaternions and expanded into 3x3
//! matrices when a [`HomogeneousTransform`] is assembled. Everything in here is
//! a pure function over value types.

use std::ops::Mul;

use nalgebra as na;

use crate::error::{FieldMapError, Result};

const MIN_QUATERNION_NORM: f64 = 1e-12;
const TRANSFORM_TOLERANCE: f64 = 1e-6;

/// 4x4 rigid transform `[[R, t], [0, 0, 0, 1]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomogeneousTransform(na::Matrix4<f64>);

impl HomogeneousTransform {
    pub fn identity() -> HomogeneousTransform {
        HomogeneousTransform(na::Matrix4::identity())
    }

    /// Assembles a transform from a rotation block and a translation.
    ///
    /// The rotation is trusted to be orthonormal.
    pub fn from_parts(
        rotation: &na::Matrix3<f64>,
        translation: &na::Vector3<f64>,
    ) -> HomogeneousTransform {
        let mut m = na::Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        HomogeneousTransform(m)
    }

    pub fn from_quaternion_translation(
        q: &na::Quaternion<f64>,
        translation: &na::Vector3<f64>,
    ) -> Result<HomogeneousTransform> {
        let rotation = quaternion_to_rotation_matrix(q)?;
        Ok(Self::from_parts(&rotation, translation))
    }

    pub fn from_translation(translation: &na::Vector3<f64>) -> HomogeneousTransform {
        Self::from_parts(&na::Matrix3::identity(), translation)
    }

    /// Wraps a raw 4x4 matrix after checking the rigid transform invariants:
    /// bottom row `(0, 0, 0, 1)` and an orthonormal, right-handed rotation block.
    pub fn try_from_matrix(m: na::Matrix4<f64>) -> Result<HomogeneousTransform> {
        let bottom = m.fixed_view::<1, 4>(3, 0);
        let expected_bottom = na::RowVector4::new(0.0, 0.0, 0.0, 1.0);
        if (bottom - expected_bottom).amax() > TRANSFORM_TOLERANCE {
            return Err(FieldMapError::InvalidTransform(format!(
                "bottom row is {}",
                bottom
            )));
        }
        let r: na::Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let orthogonality = (r.transpose() * r - na::Matrix3::identity()).amax();
        if orthogonality > TRANSFORM_TOLERANCE {
            return Err(FieldMapError::InvalidTransform(format!(
                "rotation block is not orthonormal (max deviation {:e})",
                orthogonality
            )));
        }
        if (r.determinant() - 1.0).abs() > TRANSFORM_TOLERANCE {
            return Err(FieldMapError::InvalidTransform(format!(
                "rotation block has determinant {}",
                r.determinant()
            )));
        }
        Ok(HomogeneousTransform(m))
    }

    pub fn matrix(&self) -> &na::Matrix4<f64> {
        &self.0
    }

    pub fn rotation(&self) -> na::Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> na::Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn quaternion(&self) -> na::Quaternion<f64> {
        rotation_matrix_to_quaternion(&self.rotation())
    }

    pub fn compose(&self, other: &HomogeneousTransform) -> HomogeneousTransform {
        compose(self, other)
    }

    pub fn inverse(&self) -> HomogeneousTransform {
        invert(self)
    }

    /// Rows of the matrix, handy for serialization.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.0[(r, c)];
            }
        }
        rows
    }
}

impl Default for HomogeneousTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for HomogeneousTransform {
    type Output = HomogeneousTransform;

    fn mul(self, rhs: HomogeneousTransform) -> HomogeneousTransform {
        compose(&self, &rhs)
    }
}

impl<'a> Mul<&'a HomogeneousTransform> for &'a HomogeneousTransform {
    type Output = HomogeneousTransform;

    fn mul(self, rhs: &'a HomogeneousTransform) -> HomogeneousTransform {
        compose(self, rhs)
    }
}

/// Closed-form conversion of a `(w, x, y, z)` quaternion into a rotation matrix.
///
/// The quaternion does not have to be normalized; it is normalized here first.
pub fn quaternion_to_rotation_matrix(q: &na::Quaternion<f64>) -> Result<na::Matrix3<f64>> {
    let norm = q.norm();
    if !norm.is_finite() || norm < MIN_QUATERNION_NORM {
        return Err(FieldMapError::InvalidQuaternion { norm });
    }
    let w = q.w / norm;
    let x = q.i / norm;
    let y = q.j / norm;
    let z = q.k / norm;

    Ok(na::Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - z * w),
        2.0 * (x * z + y * w),
        2.0 * (x * y + z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - x * w),
        2.0 * (x * z - y * w),
        2.0 * (y * z + x * w),
        1.0 - 2.0 * (x * x + y * y),
    ))
}

/// Unit quaternion of a rotation matrix, with `w >= 0`.
pub fn rotation_matrix_to_quaternion(r: &na::Matrix3<f64>) -> na::Quaternion<f64> {
    let rotation = na::Rotation3::from_matrix_unchecked(*r);
    let q = na::UnitQuaternion::from_rotation_matrix(&rotation).into_inner();
    if q.w < 0.0 { -q } else { q }
}

pub fn compose(a: &HomogeneousTransform, b: &HomogeneousTransform) -> HomogeneousTransform {
    HomogeneousTransform(a.0 * b.0)
}

/// Inverse of a rigid transform, `[[Rᵗ, -Rᵗt], [0, 0, 0, 1]]`.
pub fn invert(t: &HomogeneousTransform) -> HomogeneousTransform {
    let rt = t.rotation().transpose();
    let translation = -(rt * t.translation());
    HomogeneousTransform::from_parts(&rt, &translation)
}

/// `target` expressed in the frame of `reference`.
pub fn relative_to(
    reference: &HomogeneousTransform,
    target: &HomogeneousTransform,
) -> HomogeneousTransform {
    compose(&invert(reference), target)
}

pub fn transform_points(
    t: &HomogeneousTransform,
    points: &[na::Point3<f64>],
) -> Vec<na::Point3<f64>> {
    let r = t.rotation();
    let translation = t.translation();
    points.iter().map(|p| na::Point3::from(r * p.coords + translation)).collect()
}

/// Rotation angle in radians of a rotation matrix.
pub fn rotation_angle(r: &na::Matrix3<f64>) -> f64 {
    let cos = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    cos.acos()
}
