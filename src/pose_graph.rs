//! Pose graph: poses indexed `0..n` and relative-pose constraints between them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra as na;

use crate::error::{FieldMapError, Result};
use crate::resolver::FrameRelativePoses;
use crate::tag_map::TagMap;
use crate::transform::{HomogeneousTransform, compose, invert};

/// Graph node state: position and `(w, x, y, z)` orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: na::Vector3<f64>,
    pub orientation: na::Quaternion<f64>,
}

impl Pose {
    pub fn new(position: na::Vector3<f64>, orientation: na::Quaternion<f64>) -> Pose {
        Pose {
            position,
            orientation,
        }
    }

    pub fn identity() -> Pose {
        Pose::new(na::Vector3::zeros(), na::Quaternion::identity())
    }

    pub fn from_position(position: na::Vector3<f64>) -> Pose {
        Pose::new(position, na::Quaternion::identity())
    }

    pub fn from_transform(t: &HomogeneousTransform) -> Pose {
        Pose::new(t.translation(), t.quaternion())
    }

    pub fn to_transform(&self) -> Result<HomogeneousTransform> {
        HomogeneousTransform::from_quaternion_translation(&self.orientation, &self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Edge asserting that the transform from `id_begin` to `id_end` equals
/// `expected`, or identity when no expectation is given.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    id_begin: usize,
    id_end: usize,
    expected: Option<HomogeneousTransform>,
}

impl Constraint {
    pub fn new(id_begin: usize, id_end: usize) -> Constraint {
        Constraint {
            id_begin,
            id_end,
            expected: None,
        }
    }

    pub fn with_expected(
        id_begin: usize,
        id_end: usize,
        expected: HomogeneousTransform,
    ) -> Constraint {
        Constraint {
            id_begin,
            id_end,
            expected: Some(expected),
        }
    }

    pub fn id_begin(&self) -> usize {
        self.id_begin
    }

    pub fn id_end(&self) -> usize {
        self.id_end
    }

    pub fn expected(&self) -> Option<&HomogeneousTransform> {
        self.expected.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct PoseGraph {
    poses: Vec<Pose>,
    constraints: Vec<Constraint>,
}

impl PoseGraph {
    /// Builds a graph, rejecting constraints that point outside `poses`.
    pub fn new(poses: Vec<Pose>, constraints: Vec<Constraint>) -> Result<PoseGraph> {
        let num_poses = poses.len();
        if let Some((index, c)) = constraints
            .iter()
            .enumerate()
            .find(|(_, c)| c.id_begin >= num_poses || c.id_end >= num_poses)
        {
            return Err(FieldMapError::InvalidConstraint {
                index,
                id_begin: c.id_begin,
                id_end: c.id_end,
                num_poses,
            });
        }
        Ok(PoseGraph { poses, constraints })
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_poses(&self) -> usize {
        self.poses.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Replaces every pose value at once. The pose count is fixed for the
    /// lifetime of the graph.
    pub fn replace_poses(&mut self, poses: Vec<Pose>) -> Result<()> {
        if poses.len() != self.poses.len() {
            return Err(FieldMapError::PoseCountMismatch {
                expected: self.poses.len(),
                actual: poses.len(),
            });
        }
        self.poses = poses;
        Ok(())
    }
}

/// A pose graph whose nodes are tags, built from resolved frames.
#[derive(Debug, Clone)]
pub struct TagPoseGraph {
    pub graph: PoseGraph,
    tag_ids: Vec<u32>,
    reference_tag: u32,
}

impl TagPoseGraph {
    /// One node per distinct tag id (ascending), one constraint per
    /// non-reference observation. Returns `None` when there are no frames.
    pub fn from_frames(frames: &[FrameRelativePoses]) -> Result<Option<TagPoseGraph>> {
        let Some(first) = frames.first() else {
            return Ok(None);
        };
        let tag_ids: Vec<u32> = frames
            .iter()
            .flat_map(|f| f.poses.iter().map(|o| o.tag_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index_of: HashMap<u32, usize> =
            tag_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut constraints = Vec::new();
        for f in frames {
            let begin = index_of[&f.reference_id];
            for o in f.poses.iter().skip(1) {
                if o.tag_id == f.reference_id {
                    continue;
                }
                constraints.push(Constraint::with_expected(
                    begin,
                    index_of[&o.tag_id],
                    o.transform,
                ));
            }
        }

        let seeded = seed_tag_poses(frames, first.reference_id);
        let poses = tag_ids
            .iter()
            .map(|id| match seeded.get(id) {
                Some(t) => Pose::from_transform(t),
                None => {
                    log::warn!(
                        "tag {} is not connected to reference tag {}, seeded at identity",
                        id,
                        first.reference_id
                    );
                    Pose::identity()
                }
            })
            .collect();

        log::debug!(
            "pose graph with {} tags and {} constraints",
            tag_ids.len(),
            constraints.len()
        );
        Ok(Some(TagPoseGraph {
            graph: PoseGraph::new(poses, constraints)?,
            tag_ids,
            reference_tag: first.reference_id,
        }))
    }

    pub fn tag_ids(&self) -> &[u32] {
        &self.tag_ids
    }

    /// Tag of the first frame's reference. [`TagPoseGraph::tag_map`]
    /// expresses every pose in this tag's frame.
    pub fn reference_tag(&self) -> u32 {
        self.reference_tag
    }

    pub fn index_of(&self, tag_id: u32) -> Option<usize> {
        self.tag_ids.binary_search(&tag_id).ok()
    }

    /// Current poses re-expressed relative to the reference tag, which maps
    /// to identity. The optimizer leaves the gauge free, so the raw poses may
    /// have drifted as a whole.
    pub fn tag_map(&self) -> Result<TagMap> {
        let reference = match self.index_of(self.reference_tag) {
            Some(i) => self.graph.poses()[i].to_transform()?,
            None => HomogeneousTransform::identity(),
        };
        let to_reference = invert(&reference);
        let entries: Result<BTreeMap<u32, HomogeneousTransform>> = self
            .tag_ids
            .iter()
            .zip(self.graph.poses())
            .map(|(id, p)| {
                let t = if *id == self.reference_tag {
                    HomogeneousTransform::identity()
                } else {
                    compose(&to_reference, &p.to_transform()?)
                };
                Ok((*id, t))
            })
            .collect();
        Ok(TagMap::from(entries?))
    }
}

/// Chains relative transforms outward from `reference_tag` until no frame adds
/// a new tag.
fn seed_tag_poses(
    frames: &[FrameRelativePoses],
    reference_tag: u32,
) -> HashMap<u32, HomogeneousTransform> {
    let mut seeded = HashMap::from([(reference_tag, HomogeneousTransform::identity())]);
    loop {
        let mut progress = false;
        for f in frames {
            let Some((anchor_world, anchor_rel)) = f
                .poses
                .iter()
                .find_map(|o| seeded.get(&o.tag_id).map(|w| (*w, o.transform)))
            else {
                continue;
            };
            // world <- frame reference
            let frame_to_world = compose(&anchor_world, &invert(&anchor_rel));
            for o in &f.poses {
                if !seeded.contains_key(&o.tag_id) {
                    seeded.insert(o.tag_id, compose(&frame_to_world, &o.transform));
                    progress = true;
                }
            }
        }
        if !progress {
            return seeded;
        }
    }
}
