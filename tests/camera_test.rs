use apriltag_field_map::camera::{CameraModel, CameraModelDocument};
use apriltag_field_map::error::FieldMapError;
use nalgebra as na;

fn distorted_camera() -> CameraModel {
    CameraModel::new(
        na::Matrix3::new(910.0, 0.0, 640.0, 0.0, 905.0, 360.0, 0.0, 0.0, 1.0),
        [-0.12, 0.08, 0.0005, -0.0003, -0.01, 0.0, 0.0, 0.0],
    )
}

#[test]
fn test_undistort_inverts_distort() {
    let camera = distorted_camera();
    for &(x, y) in &[(0.0, 0.0), (0.1, -0.2), (-0.3, 0.25), (0.4, 0.1)] {
        let p = na::Vector3::new(x, y, 1.0);
        let pixel = camera.project(&p).unwrap();
        let xy = camera.undistort_point(&pixel);
        assert!(
            (xy - na::Vector2::new(x, y)).norm() < 1e-6,
            "({}, {}) -> {}",
            x,
            y,
            xy
        );
    }
}

#[test]
fn test_pinhole_projection() {
    let camera = CameraModel::pinhole(500.0, 500.0, 320.0, 240.0);
    let uv = camera.project(&na::Vector3::new(0.2, -0.1, 2.0)).unwrap();
    assert!((uv - na::Vector2::new(370.0, 215.0)).norm() < 1e-12);
    assert!(camera.project(&na::Vector3::new(0.0, 0.0, -1.0)).is_none());
    let xy = camera.undistort_point(&uv);
    assert!((xy - na::Vector2::new(0.1, -0.05)).norm() < 1e-12);
}

#[test]
fn test_document_padding() {
    let document = CameraModelDocument {
        camera_matrix: vec![600.0, 0.0, 320.0, 0.0, 610.0, 240.0, 0.0, 0.0, 1.0],
        distortion_coefficients: vec![0.1, -0.05, 0.001, 0.002, 0.01],
    };
    let camera = CameraModel::from_document(&document).unwrap();
    assert_eq!(camera.camera_matrix[(0, 2)], 320.0);
    assert_eq!(camera.camera_matrix[(1, 1)], 610.0);
    assert_eq!(
        camera.distortion,
        [0.1, -0.05, 0.001, 0.002, 0.01, 0.0, 0.0, 0.0]
    );
    assert_eq!(camera.to_document().camera_matrix, document.camera_matrix);
}

#[test]
fn test_document_validation() {
    let bad_matrix = CameraModelDocument {
        camera_matrix: vec![600.0, 0.0, 320.0],
        distortion_coefficients: vec![0.0; 5],
    };
    assert!(matches!(
        CameraModel::from_document(&bad_matrix),
        Err(FieldMapError::InvalidCameraModel(_))
    ));

    let bad_distortion = CameraModelDocument {
        camera_matrix: vec![600.0, 0.0, 320.0, 0.0, 610.0, 240.0, 0.0, 0.0, 1.0],
        distortion_coefficients: vec![0.0; 6],
    };
    assert!(CameraModel::from_document(&bad_distortion).is_err());

    let zero_focal = CameraModelDocument {
        camera_matrix: vec![0.0, 0.0, 320.0, 0.0, 610.0, 240.0, 0.0, 0.0, 1.0],
        distortion_coefficients: vec![0.0; 4],
    };
    assert!(CameraModel::from_document(&zero_focal).is_err());
}

#[test]
fn test_load_camera_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.json");
    std::fs::write(
        &path,
        r#"{ "camera_matrix": [600, 0, 320, 0, 600, 240, 0, 0, 1],
             "distortion_coefficients": [0, 0, 0, 0] }"#,
    )
    .unwrap();
    let camera = CameraModel::load(&path).unwrap();
    assert_eq!(camera, CameraModel::pinhole(600.0, 600.0, 320.0, 240.0));
}
