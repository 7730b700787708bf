//! Pinhole camera with the 8-coefficient OpenCV rational distortion model.

use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{FieldMapError, Result};

const UNDISTORT_ITERATIONS: usize = 20;

/// On-disk layout written by the calibration tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraModelDocument {
    /// row-major 3x3
    pub camera_matrix: Vec<f64>,
    /// k1 k2 p1 p2 [k3 [k4 k5 k6]]
    pub distortion_coefficients: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    pub camera_matrix: na::Matrix3<f64>,
    /// k1 k2 p1 p2 k3 k4 k5 k6
    pub distortion: [f64; 8],
}

impl CameraModel {
    pub fn new(camera_matrix: na::Matrix3<f64>, distortion: [f64; 8]) -> CameraModel {
        CameraModel {
            camera_matrix,
            distortion,
        }
    }

    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> CameraModel {
        CameraModel::new(
            na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            [0.0; 8],
        )
    }

    pub fn from_document(document: &CameraModelDocument) -> Result<CameraModel> {
        if document.camera_matrix.len() != 9 {
            return Err(FieldMapError::InvalidCameraModel(format!(
                "camera_matrix needs 9 values, got {}",
                document.camera_matrix.len()
            )));
        }
        let n = document.distortion_coefficients.len();
        if !matches!(n, 4 | 5 | 8) {
            return Err(FieldMapError::InvalidCameraModel(format!(
                "distortion_coefficients needs 4, 5 or 8 values, got {}",
                n
            )));
        }
        let camera_matrix = na::Matrix3::from_row_slice(&document.camera_matrix);
        if camera_matrix[(0, 0)] == 0.0 || camera_matrix[(1, 1)] == 0.0 {
            return Err(FieldMapError::InvalidCameraModel(
                "focal length is zero".to_string(),
            ));
        }
        let mut distortion = [0.0; 8];
        distortion[..n].copy_from_slice(&document.distortion_coefficients);
        Ok(CameraModel::new(camera_matrix, distortion))
    }

    pub fn to_document(&self) -> CameraModelDocument {
        CameraModelDocument {
            camera_matrix: self.camera_matrix.transpose().as_slice().to_vec(),
            distortion_coefficients: self.distortion.to_vec(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<CameraModel> {
        let contents = std::fs::read_to_string(path)?;
        let document: CameraModelDocument = serde_json::from_str(&contents)?;
        Self::from_document(&document)
    }

    fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }
    fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }
    fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }
    fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }
    fn skew(&self) -> f64 {
        self.camera_matrix[(0, 1)]
    }

    /// Applies lens distortion to a normalized image point.
    pub fn distort(&self, xy: &na::Vector2<f64>) -> na::Vector2<f64> {
        let [k1, k2, p1, p2, k3, k4, k5, k6] = self.distortion;
        let (x, y) = (xy.x, xy.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = (1.0 + k1 * r2 + k2 * r4 + k3 * r6) / (1.0 + k4 * r2 + k5 * r4 + k6 * r6);
        na::Vector2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }

    /// Projects a point in camera coordinates to pixels.
    pub fn project(&self, p: &na::Vector3<f64>) -> Option<na::Vector2<f64>> {
        if p.z <= 0.0 {
            return None;
        }
        let d = self.distort(&na::Vector2::new(p.x / p.z, p.y / p.z));
        Some(na::Vector2::new(
            self.fx() * d.x + self.skew() * d.y + self.cx(),
            self.fy() * d.y + self.cy(),
        ))
    }

    /// Pixel to undistorted normalized coordinates, by fixed-point iteration
    /// on the distortion model.
    pub fn undistort_point(&self, pixel: &na::Vector2<f64>) -> na::Vector2<f64> {
        let [k1, k2, p1, p2, k3, k4, k5, k6] = self.distortion;
        let y0 = (pixel.y - self.cy()) / self.fy();
        let x0 = (pixel.x - self.cx() - self.skew() * y0) / self.fx();
        let (mut x, mut y) = (x0, y0);
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x * x + y * y;
            let icdist = (1.0 + ((k6 * r2 + k5) * r2 + k4) * r2)
                / (1.0 + ((k3 * r2 + k2) * r2 + k1) * r2);
            if !icdist.is_finite() || icdist <= 0.0 {
                return na::Vector2::new(x0, y0);
            }
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (x0 - dx) * icdist;
            y = (y0 - dy) * icdist;
        }
        na::Vector2::new(x, y)
    }
}
