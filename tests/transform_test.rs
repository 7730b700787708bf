use apriltag_field_map::error::FieldMapError;
use apriltag_field_map::transform::{
    HomogeneousTransform, compose, invert, quaternion_to_rotation_matrix, relative_to,
    rotation_angle, rotation_matrix_to_quaternion, transform_points,
};
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn random_transform(rng: &mut ChaCha8Rng) -> HomogeneousTransform {
    let q = na::Quaternion::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
        rng.random_range(-1.0..1.0),
    );
    let t = na::Vector3::new(
        rng.random_range(-10.0..10.0),
        rng.random_range(-10.0..10.0),
        rng.random_range(-10.0..10.0),
    );
    HomogeneousTransform::from_quaternion_translation(&q, &t).unwrap()
}

fn assert_close(a: &na::Matrix4<f64>, b: &na::Matrix4<f64>, tol: f64) {
    assert!((a - b).amax() < tol, "\n{}\n!=\n{}", a, b);
}

#[test]
fn test_quaternion_to_rotation_is_orthonormal() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    for _ in 0..1000 {
        let q = na::Quaternion::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        if q.norm() < 1e-3 {
            continue;
        }
        let r = quaternion_to_rotation_matrix(&q).unwrap();
        assert!((r.transpose() * r - na::Matrix3::identity()).amax() < 1e-9);
        assert!((r.determinant() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_known_rotation() {
    // 90 degrees about z
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let r = quaternion_to_rotation_matrix(&na::Quaternion::new(h, 0.0, 0.0, h)).unwrap();
    let x = r * na::Vector3::x();
    assert!((x - na::Vector3::y()).norm() < 1e-12);
    assert!((rotation_angle(&r) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
}

#[test]
fn test_unnormalized_quaternion_is_normalized() {
    let r1 = quaternion_to_rotation_matrix(&na::Quaternion::new(1.0, 2.0, 3.0, 4.0)).unwrap();
    let r2 = quaternion_to_rotation_matrix(&na::Quaternion::new(2.0, 4.0, 6.0, 8.0)).unwrap();
    assert!((r1 - r2).amax() < 1e-12);
}

#[test]
fn test_zero_quaternion_rejected() {
    let err = quaternion_to_rotation_matrix(&na::Quaternion::new(0.0, 0.0, 0.0, 0.0));
    assert!(matches!(err, Err(FieldMapError::InvalidQuaternion { .. })));
}

#[test]
fn test_rotation_quaternion_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for _ in 0..100 {
        let t = random_transform(&mut rng);
        let q = rotation_matrix_to_quaternion(&t.rotation());
        assert!(q.w >= 0.0);
        let r = quaternion_to_rotation_matrix(&q).unwrap();
        assert!((r - t.rotation()).amax() < 1e-9);
    }
}

#[test]
fn test_compose_with_inverse_is_identity() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let identity = na::Matrix4::identity();
    for _ in 0..100 {
        let t = random_transform(&mut rng);
        assert_close(compose(&t, &invert(&t)).matrix(), &identity, 1e-9);
        assert_close(compose(&invert(&t), &t).matrix(), &identity, 1e-9);
        assert_close(t.inverse().matrix(), &t.matrix().try_inverse().unwrap(), 1e-9);
    }
}

#[test]
fn test_compose_is_associative() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for _ in 0..100 {
        let a = random_transform(&mut rng);
        let b = random_transform(&mut rng);
        let c = random_transform(&mut rng);
        let left = compose(&compose(&a, &b), &c);
        let right = compose(&a, &compose(&b, &c));
        assert_close(left.matrix(), right.matrix(), 1e-9);
        assert_close((a * b * c).matrix(), left.matrix(), 1e-9);
    }
}

#[test]
fn test_relative_to_self_is_identity() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let t = random_transform(&mut rng);
    assert_close(relative_to(&t, &t).matrix(), &na::Matrix4::identity(), 1e-9);
}

#[test]
fn test_transform_points() {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let t = HomogeneousTransform::from_quaternion_translation(
        &na::Quaternion::new(h, 0.0, 0.0, h),
        &na::Vector3::new(1.0, 0.0, 0.0),
    )
    .unwrap();
    let out = transform_points(&t, &[na::Point3::new(1.0, 0.0, 0.0), na::Point3::origin()]);
    assert_eq!(out.len(), 2);
    assert!((out[0] - na::Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    assert!((out[1] - na::Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    assert!(transform_points(&t, &[]).is_empty());
}

#[test]
fn test_try_from_matrix_validates() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let t = random_transform(&mut rng);
    assert!(HomogeneousTransform::try_from_matrix(*t.matrix()).is_ok());

    let mut bad_bottom = *t.matrix();
    bad_bottom[(3, 0)] = 0.5;
    assert!(matches!(
        HomogeneousTransform::try_from_matrix(bad_bottom),
        Err(FieldMapError::InvalidTransform(_))
    ));

    let mut scaled = *t.matrix();
    scaled.fixed_view_mut::<3, 3>(0, 0).scale_mut(2.0);
    assert!(HomogeneousTransform::try_from_matrix(scaled).is_err());

    let mut reflected = na::Matrix4::identity();
    reflected[(2, 2)] = -1.0;
    assert!(HomogeneousTransform::try_from_matrix(reflected).is_err());
}

#[test]
fn test_to_rows() {
    let t = HomogeneousTransform::from_translation(&na::Vector3::new(1.0, 2.0, 3.0));
    let rows = t.to_rows();
    assert_eq!(rows[0], [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(rows[2], [0.0, 0.0, 1.0, 3.0]);
    assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
}
