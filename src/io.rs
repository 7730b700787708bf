use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::compare::{ComparisonSummary, TagComparison};
use crate::error::Result;
use crate::optimization::OptimizationReport;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize, P: AsRef<Path>>(output_path: P, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(output_path, j)?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned, P: AsRef<Path>>(file_path: P) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Debug, Serialize)]
pub struct TagReport {
    pub id: u32,
    pub translation_delta: [f64; 3],
    pub translation_error: f64,
    pub rotation_error_deg: f64,
    pub observed: [[f64; 4]; 4],
    pub ideal: [[f64; 4]; 4],
    pub difference: [[f64; 4]; 4],
}

impl From<&TagComparison> for TagReport {
    fn from(c: &TagComparison) -> Self {
        let mut difference = [[0.0; 4]; 4];
        for (r, row) in difference.iter_mut().enumerate() {
            for (col, v) in row.iter_mut().enumerate() {
                *v = c.difference[(r, col)];
            }
        }
        TagReport {
            id: c.tag_id,
            translation_delta: [
                c.translation_delta.x,
                c.translation_delta.y,
                c.translation_delta.z,
            ],
            translation_error: c.translation_error,
            rotation_error_deg: c.rotation_error.to_degrees(),
            observed: c.observed.to_rows(),
            ideal: c.ideal.to_rows(),
            difference,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MappingReport {
    pub timestamp: String,
    pub frames_used: usize,
    pub tags_observed: usize,
    pub anchor_tag: Option<u32>,
    pub optimization: Option<OptimizationReport>,
    pub summary: ComparisonSummary,
    pub tags: Vec<TagReport>,
}

fn timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Writes the optimizer outcome and per-tag comparison as JSON.
pub fn write_mapping_report<P: AsRef<Path>>(
    output_path: P,
    frames_used: usize,
    tags_observed: usize,
    anchor_tag: Option<u32>,
    optimization: Option<&OptimizationReport>,
    comparisons: &[TagComparison],
) -> Result<()> {
    let report = MappingReport {
        timestamp: timestamp(),
        frames_used,
        tags_observed,
        anchor_tag,
        optimization: optimization.cloned(),
        summary: ComparisonSummary::from_comparisons(comparisons),
        tags: comparisons.iter().map(TagReport::from).collect(),
    };
    object_to_json(output_path, &report)
}

/// Human readable variant of the report.
pub fn write_text_report<P: AsRef<Path>>(
    output_path: P,
    optimization: Option<&OptimizationReport>,
    comparisons: &[TagComparison],
) -> Result<()> {
    let mut s = String::new();
    if let Some(o) = optimization {
        let iterations = o
            .iterations
            .map_or_else(|| "an unreported number of".to_string(), |n| n.to_string());
        s += format!(
            "optimizer: {:?} after {} iterations, cost {:e} -> {:e}\n\n",
            o.status, iterations, o.initial_cost, o.final_cost
        )
        .as_str();
    }
    for c in comparisons {
        s += format!("tag{}:\n", c.tag_id).as_str();
        s += format!(
            "    translation delta: [{:.5}, {:.5}, {:.5}] m\n",
            c.translation_delta.x, c.translation_delta.y, c.translation_delta.z
        )
        .as_str();
        s += format!("    translation error: {:.5} m\n", c.translation_error).as_str();
        s += format!(
            "    rotation error:    {:.5} deg\n\n",
            c.rotation_error.to_degrees()
        )
        .as_str();
    }
    let summary = ComparisonSummary::from_comparisons(comparisons);
    s += format!(
        "compared {} tags, rms translation error {:.5} m, mean rotation error {:.5} deg\n",
        summary.compared, summary.rms_translation_error, summary.mean_rotation_error_deg
    )
    .as_str();
    std::fs::write(output_path, s)?;
    Ok(())
}
