use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::object_from_json;
use crate::optimization::OptimizerConfig;
use crate::tag::TagConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub tag: TagConfig,
    pub optimizer: OptimizerConfig,
    /// Tag whose ideal pose anchors the observed map in world coordinates.
    /// Defaults to the reference tag of the first usable frame.
    pub anchor_tag: Option<u32>,
    /// Frames with fewer detections are ignored.
    pub min_tags_per_frame: usize,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            tag: TagConfig::default(),
            optimizer: OptimizerConfig::default(),
            anchor_tag: None,
            min_tags_per_frame: 1,
        }
    }
}

impl MappingConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MappingConfig> {
        object_from_json(path)
    }
}
