pub mod factors;
pub mod optimizer;
pub mod problem;

pub use optimizer::*;
pub use problem::{PoseGraphProblem, ResidualMode};
