use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldMapError {
    /// A quaternion whose norm is too small to describe a rotation.
    #[error("quaternion norm {norm} is too small to normalize")]
    InvalidQuaternion { norm: f64 },

    #[error(
        "constraint {index} ({id_begin} -> {id_end}) references a pose outside 0..{num_poses}"
    )]
    InvalidConstraint {
        index: usize,
        id_begin: usize,
        id_end: usize,
        num_poses: usize,
    },

    #[error("expected {expected} poses, got {actual}")]
    PoseCountMismatch { expected: usize, actual: usize },

    #[error("invalid homogeneous transform: {0}")]
    InvalidTransform(String),

    #[error("tag id {0} appears more than once in the map")]
    DuplicateTagId(u32),

    #[error("tag id {0} is not a positive integer")]
    InvalidTagId(i64),

    #[error("invalid camera model: {0}")]
    InvalidCameraModel(String),

    #[error("pnp failed for tag {tag_id}")]
    PnpFailed { tag_id: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("rerun: {0}")]
    Rerun(String),
}

pub type Result<T> = std::result::Result<T, FieldMapError>;
