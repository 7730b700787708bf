//! Tag id to pose maps and the field map document they are stored in.
//!
//! ```json
//! { "tags": [ { "ID": 1, "pose": {
//!     "translation": { "x": 1.0, "y": 2.0, "z": 3.0 },
//!     "rotation": { "quaternion": { "W": 1.0, "X": 0.0, "Y": 0.0, "Z": 0.0 } } } } ] }
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{FieldMapError, Result};
use crate::transform::HomogeneousTransform;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldDocument {
    pub length: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagMapDocument {
    pub tags: Vec<TagEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(rename = "ID")]
    pub id: i64,
    pub pose: PoseDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseDocument {
    pub translation: TranslationDocument,
    pub rotation: RotationDocument,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TranslationDocument {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RotationDocument {
    pub quaternion: QuaternionDocument,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuaternionDocument {
    #[serde(rename = "W")]
    pub w: f64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

/// Tag poses keyed by tag id, iterated in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    tags: BTreeMap<u32, HomogeneousTransform>,
    field: Option<(f64, f64)>,
}

/// Ground-truth map of a field.
pub type IdealMap = TagMap;

impl TagMap {
    pub fn new() -> TagMap {
        TagMap::default()
    }

    pub fn insert(&mut self, tag_id: u32, transform: HomogeneousTransform) {
        self.tags.insert(tag_id, transform);
    }

    pub fn get(&self, tag_id: u32) -> Option<&HomogeneousTransform> {
        self.tags.get(&tag_id)
    }

    pub fn contains(&self, tag_id: u32) -> bool {
        self.tags.contains_key(&tag_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &HomogeneousTransform)> {
        self.tags.iter().map(|(id, t)| (*id, t))
    }

    pub fn tag_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tags.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Field dimensions `(length, width)` when the source document carried them.
    pub fn field_size(&self) -> Option<(f64, f64)> {
        self.field
    }

    pub fn with_field_size(mut self, length: f64, width: f64) -> TagMap {
        self.field = Some((length, width));
        self
    }

    /// Converts a parsed document, normalizing quaternions and rejecting
    /// non-positive or repeated ids.
    pub fn from_document(document: &TagMapDocument) -> Result<TagMap> {
        let mut tags = BTreeMap::new();
        for entry in &document.tags {
            let id = u32::try_from(entry.id)
                .ok()
                .filter(|id| *id > 0)
                .ok_or(FieldMapError::InvalidTagId(entry.id))?;
            let t = &entry.pose.translation;
            let q = &entry.pose.rotation.quaternion;
            let transform = HomogeneousTransform::from_quaternion_translation(
                &na::Quaternion::new(q.w, q.x, q.y, q.z),
                &na::Vector3::new(t.x, t.y, t.z),
            )?;
            match tags.entry(id) {
                Entry::Vacant(v) => {
                    v.insert(transform);
                }
                Entry::Occupied(_) => return Err(FieldMapError::DuplicateTagId(id)),
            }
        }
        Ok(TagMap {
            tags,
            field: document.field.map(|f| (f.length, f.width)),
        })
    }

    pub fn to_document(&self) -> TagMapDocument {
        let tags = self
            .tags
            .iter()
            .map(|(id, transform)| {
                let t = transform.translation();
                let q = transform.quaternion();
                TagEntry {
                    id: *id as i64,
                    pose: PoseDocument {
                        translation: TranslationDocument {
                            x: t.x,
                            y: t.y,
                            z: t.z,
                        },
                        rotation: RotationDocument {
                            quaternion: QuaternionDocument {
                                w: q.w,
                                x: q.i,
                                y: q.j,
                                z: q.k,
                            },
                        },
                    },
                }
            })
            .collect();
        TagMapDocument {
            tags,
            field: self
                .field
                .map(|(length, width)| FieldDocument { length, width }),
        }
    }

    pub fn from_json_str(s: &str) -> Result<TagMap> {
        let document: TagMapDocument = serde_json::from_str(s)?;
        Self::from_document(&document)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<TagMap> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

impl From<BTreeMap<u32, HomogeneousTransform>> for TagMap {
    fn from(tags: BTreeMap<u32, HomogeneousTransform>) -> Self {
        TagMap { tags, field: None }
    }
}

impl FromIterator<(u32, HomogeneousTransform)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (u32, HomogeneousTransform)>>(iter: I) -> Self {
        TagMap {
            tags: iter.into_iter().collect(),
            field: None,
        }
    }
}
