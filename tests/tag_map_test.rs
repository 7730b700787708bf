use apriltag_field_map::error::FieldMapError;
use apriltag_field_map::tag_map::TagMap;
use apriltag_field_map::transform::HomogeneousTransform;
use nalgebra as na;

const FIELD_JSON: &str = r#"{
  "tags": [
    { "ID": 1, "pose": {
        "translation": { "x": 15.079, "y": 0.246, "z": 1.356 },
        "rotation": { "quaternion": { "W": 0.453, "X": 0.0, "Y": 0.0, "Z": 0.891 } } } },
    { "ID": 4, "pose": {
        "translation": { "x": 16.697, "y": 6.630, "z": 1.451 },
        "rotation": { "quaternion": { "W": 0.0, "X": 0.0, "Y": 0.0, "Z": 2.0 } } } }
  ],
  "field": { "length": 16.541, "width": 8.069 }
}"#;

#[test]
fn test_load_field_map() {
    let map = TagMap::from_json_str(FIELD_JSON).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.tag_ids().collect::<Vec<_>>(), vec![1, 4]);
    assert!(map.contains(4));
    assert!(!map.contains(2));
    assert_eq!(map.field_size(), Some((16.541, 8.069)));

    let t1 = map.get(1).unwrap();
    assert!((t1.translation() - na::Vector3::new(15.079, 0.246, 1.356)).norm() < 1e-12);
    let r1 = t1.rotation();
    assert!((r1.transpose() * r1 - na::Matrix3::identity()).amax() < 1e-9);

    // (0, 0, 0, 2) is normalized to a half turn about z
    let r4 = map.get(4).unwrap().rotation();
    assert!((r4 * na::Vector3::x() + na::Vector3::x()).norm() < 1e-12);
}

#[test]
fn test_duplicate_id_rejected() {
    let json = r#"{ "tags": [
        { "ID": 3, "pose": { "translation": { "x": 0, "y": 0, "z": 0 },
            "rotation": { "quaternion": { "W": 1, "X": 0, "Y": 0, "Z": 0 } } } },
        { "ID": 3, "pose": { "translation": { "x": 1, "y": 0, "z": 0 },
            "rotation": { "quaternion": { "W": 1, "X": 0, "Y": 0, "Z": 0 } } } }
    ] }"#;
    assert!(matches!(
        TagMap::from_json_str(json),
        Err(FieldMapError::DuplicateTagId(3))
    ));
}

#[test]
fn test_non_positive_id_rejected() {
    let json = r#"{ "tags": [
        { "ID": 0, "pose": { "translation": { "x": 0, "y": 0, "z": 0 },
            "rotation": { "quaternion": { "W": 1, "X": 0, "Y": 0, "Z": 0 } } } }
    ] }"#;
    assert!(matches!(
        TagMap::from_json_str(json),
        Err(FieldMapError::InvalidTagId(0))
    ));
}

#[test]
fn test_zero_quaternion_rejected() {
    let json = r#"{ "tags": [
        { "ID": 2, "pose": { "translation": { "x": 0, "y": 0, "z": 0 },
            "rotation": { "quaternion": { "W": 0, "X": 0, "Y": 0, "Z": 0 } } } }
    ] }"#;
    assert!(matches!(
        TagMap::from_json_str(json),
        Err(FieldMapError::InvalidQuaternion { .. })
    ));
}

#[test]
fn test_malformed_json() {
    assert!(matches!(
        TagMap::from_json_str("{ \"tags\": [ { \"ID\": 1 } ] }"),
        Err(FieldMapError::Json(_))
    ));
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.json");
    let saved = TagMap::from_json_str(FIELD_JSON).unwrap();
    saved.save(&path).unwrap();

    let loaded = TagMap::load(&path).unwrap();
    assert_eq!(loaded.len(), saved.len());
    assert_eq!(loaded.field_size(), saved.field_size());
    for (id, t) in saved.iter() {
        assert!((loaded.get(id).unwrap().matrix() - t.matrix()).amax() < 1e-12);
    }
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        TagMap::load("/nonexistent/field.json"),
        Err(FieldMapError::Io(_))
    ));
}

#[test]
fn test_insert_keeps_ids_sorted() {
    let mut map = TagMap::new();
    assert!(map.is_empty());
    map.insert(9, HomogeneousTransform::identity());
    map.insert(2, HomogeneousTransform::identity());
    map.insert(5, HomogeneousTransform::identity());
    assert_eq!(map.tag_ids().collect::<Vec<_>>(), vec![2, 5, 9]);
    assert_eq!(map.to_document().tags[0].id, 2);
}
