pub mod camera;
pub mod compare;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod io;
pub mod optimization;
pub mod pipeline;
pub mod pnp;
pub mod pose_graph;
pub mod resolver;
pub mod tag;
pub mod tag_map;
pub mod transform;
pub mod types;
pub mod visualization;

pub use error::{FieldMapError, Result};
pub use pose_graph::{Constraint, Pose, PoseGraph, TagPoseGraph};
pub use tag_map::{IdealMap, TagMap};
pub use transform::HomogeneousTransform;
