use crate::transform::{HomogeneousTransform, relative_to};
use crate::types::{FrameObservations, TagObservation};

/// Tag poses of one frame expressed in the frame of its reference tag.
#[derive(Debug, Clone)]
pub struct FrameRelativePoses {
    pub time_ns: i64,
    pub reference_id: u32,
    /// Same order as the input; the reference comes first with identity.
    pub poses: Vec<TagObservation>,
}

impl FrameRelativePoses {
    pub fn get(&self, tag_id: u32) -> Option<&HomogeneousTransform> {
        self.poses
            .iter()
            .find(|o| o.tag_id == tag_id)
            .map(|o| &o.transform)
    }
}

/// Re-expresses every observation relative to the first one.
///
/// Returns `None` for a frame without detections.
pub fn resolve_relative_poses(
    time_ns: i64,
    observations: &[TagObservation],
) -> Option<FrameRelativePoses> {
    let (reference, others) = observations.split_first()?;
    let mut poses = Vec::with_capacity(observations.len());
    poses.push(TagObservation::new(
        reference.tag_id,
        HomogeneousTransform::identity(),
    ));
    poses.extend(others.iter().map(|o| {
        TagObservation::new(o.tag_id, relative_to(&reference.transform, &o.transform))
    }));
    Some(FrameRelativePoses {
        time_ns,
        reference_id: reference.tag_id,
        poses,
    })
}

/// Resolves a frame sequence, dropping frames with no detections.
pub fn resolve_frames(frames: &[FrameObservations]) -> Vec<FrameRelativePoses> {
    frames
        .iter()
        .filter_map(|f| {
            let resolved = resolve_relative_poses(f.time_ns, &f.observations);
            if resolved.is_none() {
                log::trace!("frame {} has no detections", f.time_ns);
            }
            resolved
        })
        .collect()
}
