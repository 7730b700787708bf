//! Per-tag comparison of an observed map against a ground-truth map.

use nalgebra as na;

use crate::tag_map::TagMap;
use crate::transform::{HomogeneousTransform, compose, invert, rotation_angle};

#[derive(Debug, Clone)]
pub struct TagComparison {
    pub tag_id: u32,
    pub observed: HomogeneousTransform,
    pub ideal: HomogeneousTransform,
    /// element-wise `ideal - observed`
    pub difference: na::Matrix4<f64>,
    /// `t_ideal - t_observed`
    pub translation_delta: na::Vector3<f64>,
    pub translation_error: f64,
    /// angle of `R_idealᵀ · R_observed`, radians
    pub rotation_error: f64,
}

impl TagComparison {
    pub fn new(
        tag_id: u32,
        observed: &HomogeneousTransform,
        ideal: &HomogeneousTransform,
    ) -> TagComparison {
        let difference = ideal.matrix() - observed.matrix();
        let translation_delta = ideal.translation() - observed.translation();
        let rotation_error = rotation_angle(&(ideal.rotation().transpose() * observed.rotation()));
        TagComparison {
            tag_id,
            observed: *observed,
            ideal: *ideal,
            difference,
            translation_delta,
            translation_error: translation_delta.norm(),
            rotation_error,
        }
    }
}

/// Compares every observed tag that has a ground-truth entry; tags missing
/// from `ideal` are skipped.
pub fn compare_with_ideal_map(observed: &TagMap, ideal: &TagMap) -> Vec<TagComparison> {
    observed
        .iter()
        .filter_map(|(tag_id, observed_t)| {
            let Some(ideal_t) = ideal.get(tag_id) else {
                log::debug!("tag {} has no ideal pose, skipped", tag_id);
                return None;
            };
            let c = TagComparison::new(tag_id, observed_t, ideal_t);
            log::info!(
                "tag {}: translation error {:.4} m, rotation error {:.3} deg",
                tag_id,
                c.translation_error,
                c.rotation_error.to_degrees()
            );
            log::debug!("tag {} difference (ideal - observed):{}", tag_id, c.difference);
            Some(c)
        })
        .collect()
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ComparisonSummary {
    pub compared: usize,
    pub mean_translation_error: f64,
    pub max_translation_error: f64,
    pub rms_translation_error: f64,
    pub mean_rotation_error_deg: f64,
    pub max_rotation_error_deg: f64,
}

impl ComparisonSummary {
    pub fn from_comparisons(comparisons: &[TagComparison]) -> ComparisonSummary {
        if comparisons.is_empty() {
            return ComparisonSummary::default();
        }
        let n = comparisons.len() as f64;
        let sum_t: f64 = comparisons.iter().map(|c| c.translation_error).sum();
        let sum_t2: f64 = comparisons.iter().map(|c| c.translation_error.powi(2)).sum();
        let sum_r: f64 = comparisons.iter().map(|c| c.rotation_error).sum();
        ComparisonSummary {
            compared: comparisons.len(),
            mean_translation_error: sum_t / n,
            max_translation_error: comparisons
                .iter()
                .map(|c| c.translation_error)
                .fold(0.0, f64::max),
            rms_translation_error: (sum_t2 / n).sqrt(),
            mean_rotation_error_deg: (sum_r / n).to_degrees(),
            max_rotation_error_deg: comparisons
                .iter()
                .map(|c| c.rotation_error)
                .fold(0.0, f64::max)
                .to_degrees(),
        }
    }
}

/// Moves a map expressed relative to `anchor_tag` into the ideal map's world
/// frame: `ideal[anchor] · observed[anchor]⁻¹ · observed[i]`.
pub fn align_to_ideal(observed: &TagMap, anchor_tag: u32, ideal: &TagMap) -> Option<TagMap> {
    let world_anchor = ideal.get(anchor_tag)?;
    let observed_anchor = observed.get(anchor_tag)?;
    let to_world = compose(world_anchor, &invert(observed_anchor));
    let aligned: TagMap = observed
        .iter()
        .map(|(id, t)| (id, compose(&to_world, t)))
        .collect();
    Some(match ideal.field_size() {
        Some((length, width)) => aligned.with_field_size(length, width),
        None => aligned,
    })
}
