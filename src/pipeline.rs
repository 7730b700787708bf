use crate::compare::{TagComparison, align_to_ideal, compare_with_ideal_map};
use crate::config::MappingConfig;
use crate::error::Result;
use crate::optimization::{OptimizationReport, PoseGraphOptimizer};
use crate::pose_graph::TagPoseGraph;
use crate::resolver::resolve_frames;
use crate::tag_map::TagMap;
use crate::types::FrameObservations;

#[derive(Debug, Clone, Default)]
pub struct MappingResult {
    pub frames_used: usize,
    /// Optimized poses relative to the reference tag.
    pub relative_map: TagMap,
    /// Optimized poses in the ideal map's frame when anchoring succeeded,
    /// otherwise the relative map.
    pub observed: TagMap,
    /// Set when `observed` was anchored to the ideal map through this tag.
    pub anchor_tag: Option<u32>,
    pub optimization: Option<OptimizationReport>,
    pub comparisons: Vec<TagComparison>,
}

/// Frames to refined tag map and, when an ideal map is given, its comparison.
pub fn map_field(
    frames: &[FrameObservations],
    ideal: Option<&TagMap>,
    config: &MappingConfig,
) -> Result<MappingResult> {
    let min_tags = config.min_tags_per_frame.max(1);
    let usable: Vec<FrameObservations> = frames
        .iter()
        .filter(|f| f.observations.len() >= min_tags)
        .cloned()
        .collect();
    let resolved = resolve_frames(&usable);
    log::info!(
        "{} of {} frames have at least {} tags",
        resolved.len(),
        frames.len(),
        min_tags
    );

    let Some(mut tag_graph) = TagPoseGraph::from_frames(&resolved)? else {
        log::warn!("no tags detected in any frame");
        return Ok(MappingResult::default());
    };

    let optimizer = PoseGraphOptimizer::new(config.optimizer.clone());
    let report = optimizer.optimize(&mut tag_graph.graph);
    let relative_map = tag_graph.tag_map()?;

    let anchor = config.anchor_tag.unwrap_or(tag_graph.reference_tag());
    let (observed, anchor_tag) = match ideal.map(|i| align_to_ideal(&relative_map, anchor, i)) {
        Some(Some(aligned)) => (aligned, Some(anchor)),
        Some(None) => {
            log::warn!(
                "anchor tag {} missing from the observed or ideal map, comparing relative poses",
                anchor
            );
            (relative_map.clone(), None)
        }
        None => (relative_map.clone(), None),
    };
    let comparisons = ideal
        .map(|i| compare_with_ideal_map(&observed, i))
        .unwrap_or_default();

    Ok(MappingResult {
        frames_used: resolved.len(),
        relative_map,
        observed,
        anchor_tag,
        optimization: Some(report),
        comparisons,
    })
}
