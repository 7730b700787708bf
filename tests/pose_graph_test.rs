use apriltag_field_map::error::FieldMapError;
use apriltag_field_map::pose_graph::{Constraint, Pose, PoseGraph, TagPoseGraph};
use apriltag_field_map::resolver::resolve_frames;
use apriltag_field_map::transform::HomogeneousTransform;
use apriltag_field_map::types::{FrameObservations, TagObservation};
use nalgebra as na;

fn translation(x: f64, y: f64, z: f64) -> HomogeneousTransform {
    HomogeneousTransform::from_translation(&na::Vector3::new(x, y, z))
}

fn frame(time_ns: i64, tags: &[(u32, HomogeneousTransform)]) -> FrameObservations {
    FrameObservations {
        time_ns,
        observations: tags
            .iter()
            .map(|(id, t)| TagObservation::new(*id, *t))
            .collect(),
    }
}

#[test]
fn test_constraint_out_of_range() {
    let poses = vec![Pose::identity(), Pose::identity()];
    let err = PoseGraph::new(poses, vec![Constraint::new(0, 1), Constraint::new(1, 2)]);
    match err {
        Err(FieldMapError::InvalidConstraint {
            index,
            id_end,
            num_poses,
            ..
        }) => {
            assert_eq!(index, 1);
            assert_eq!(id_end, 2);
            assert_eq!(num_poses, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_replace_poses() {
    let mut graph = PoseGraph::new(vec![Pose::identity(); 2], vec![Constraint::new(0, 1)]).unwrap();
    assert!(matches!(
        graph.replace_poses(vec![Pose::identity()]),
        Err(FieldMapError::PoseCountMismatch {
            expected: 2,
            actual: 1
        })
    ));

    let moved = vec![
        Pose::from_position(na::Vector3::new(1.0, 0.0, 0.0)),
        Pose::from_position(na::Vector3::new(2.0, 0.0, 0.0)),
    ];
    graph.replace_poses(moved.clone()).unwrap();
    assert_eq!(graph.poses(), moved.as_slice());
    assert_eq!(graph.num_constraints(), 1);
    assert_eq!(graph.constraints()[0].id_begin(), 0);
    assert!(graph.constraints()[0].expected().is_none());
}

#[test]
fn test_pose_transform_round_trip() {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let pose = Pose::new(na::Vector3::new(1.0, 2.0, 3.0), na::Quaternion::new(h, h, 0.0, 0.0));
    let back = Pose::from_transform(&pose.to_transform().unwrap());
    assert!((back.position - pose.position).norm() < 1e-12);
    assert!((back.orientation.coords - pose.orientation.coords).norm() < 1e-9);
}

#[test]
fn test_tag_pose_graph_from_frames() {
    // camera sees 1,2 in the first frame and 2,3 in the second
    let frames = vec![
        frame(0, &[(1, translation(0.0, 0.0, 2.0)), (2, translation(1.0, 0.0, 2.0))]),
        frame(1, &[(2, translation(-0.5, 0.0, 3.0)), (3, translation(0.5, 0.0, 3.0))]),
    ];
    let resolved = resolve_frames(&frames);
    let tag_graph = TagPoseGraph::from_frames(&resolved).unwrap().unwrap();

    assert_eq!(tag_graph.tag_ids(), &[1, 2, 3]);
    assert_eq!(tag_graph.reference_tag(), 1);
    assert_eq!(tag_graph.index_of(3), Some(2));
    assert_eq!(tag_graph.index_of(9), None);
    assert_eq!(tag_graph.graph.num_poses(), 3);
    assert_eq!(tag_graph.graph.num_constraints(), 2);

    let map = tag_graph.tag_map().unwrap();
    let expected = [(1, 0.0), (2, 1.0), (3, 2.0)];
    for (id, x) in expected {
        let t = map.get(id).unwrap().translation();
        assert!((t - na::Vector3::new(x, 0.0, 0.0)).norm() < 1e-9, "tag {}: {}", id, t);
    }
}

#[test]
fn test_disconnected_tag_seeded_at_identity() {
    let frames = vec![
        frame(0, &[(1, translation(0.0, 0.0, 2.0)), (2, translation(1.0, 0.0, 2.0))]),
        frame(1, &[(5, translation(0.0, 0.0, 2.0)), (6, translation(1.0, 0.0, 2.0))]),
    ];
    let tag_graph = TagPoseGraph::from_frames(&resolve_frames(&frames))
        .unwrap()
        .unwrap();
    let idx = tag_graph.index_of(6).unwrap();
    assert_eq!(tag_graph.graph.poses()[idx], Pose::identity());
}

#[test]
fn test_no_frames() {
    assert!(TagPoseGraph::from_frames(&[]).unwrap().is_none());
}
