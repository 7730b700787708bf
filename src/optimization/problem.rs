//! Residuals and Jacobian of a pose graph as pure functions of the stacked
//! parameter vector `[px, py, pz, qw, qx, qy, qz]` per pose.

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::pose_graph::{Pose, PoseGraph};

pub const POSE_PARAMS: usize = 7;

const QUATERNION_STEP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualMode {
    /// 3 residuals per constraint, translation only.
    #[default]
    Translation,
    /// 6 residuals per constraint: translation and a small-angle rotation error.
    Full,
}

impl ResidualMode {
    pub fn residual_dim(self) -> usize {
        match self {
            ResidualMode::Translation => 3,
            ResidualMode::Full => 6,
        }
    }
}

#[derive(Debug, Clone)]
struct ConstraintTerm {
    begin: usize,
    end: usize,
    translation: na::Vector3<f64>,
    rotation: na::UnitQuaternion<f64>,
}

#[derive(Debug, Clone)]
pub struct PoseGraphProblem {
    terms: Vec<ConstraintTerm>,
    num_poses: usize,
    mode: ResidualMode,
    rotation_weight: f64,
}

impl PoseGraphProblem {
    pub fn new(graph: &PoseGraph, mode: ResidualMode, rotation_weight: f64) -> PoseGraphProblem {
        let terms = graph
            .constraints()
            .iter()
            .map(|c| {
                let (translation, rotation) = match c.expected() {
                    Some(t) => (
                        t.translation(),
                        na::UnitQuaternion::from_quaternion(t.quaternion()),
                    ),
                    None => (na::Vector3::zeros(), na::UnitQuaternion::identity()),
                };
                ConstraintTerm {
                    begin: c.id_begin(),
                    end: c.id_end(),
                    translation,
                    rotation,
                }
            })
            .collect();
        PoseGraphProblem {
            terms,
            num_poses: graph.num_poses(),
            mode,
            rotation_weight,
        }
    }

    pub fn mode(&self) -> ResidualMode {
        self.mode
    }

    pub fn num_params(&self) -> usize {
        self.num_poses * POSE_PARAMS
    }

    pub fn num_residuals(&self) -> usize {
        self.terms.len() * self.mode.residual_dim()
    }

    pub fn residuals(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
        let dim = self.mode.residual_dim();
        let mut r = na::DVector::zeros(self.num_residuals());
        for (k, term) in self.terms.iter().enumerate() {
            let rk = self.term_residual(term, pose_block(x, term.begin), pose_block(x, term.end));
            r.rows_mut(k * dim, dim).copy_from_slice(&rk.as_slice()[..dim]);
        }
        r
    }

    /// Block-sparse Jacobian stored densely. Translation rows carry `+I` for
    /// the begin position and `-I` for the end position; quaternion columns
    /// come from central differences of the constraint residual.
    pub fn jacobian(&self, x: &na::DVector<f64>) -> na::DMatrix<f64> {
        let dim = self.mode.residual_dim();
        let mut j = na::DMatrix::zeros(self.num_residuals(), self.num_params());
        for (k, term) in self.terms.iter().enumerate() {
            let row = k * dim;
            let cb = term.begin * POSE_PARAMS;
            let ce = term.end * POSE_PARAMS;
            for i in 0..3 {
                j[(row + i, cb + i)] += 1.0;
                j[(row + i, ce + i)] -= 1.0;
            }

            let xb = pose_block(x, term.begin);
            let xe = pose_block(x, term.end);
            for q in 3..POSE_PARAMS {
                let (plus, minus) = perturbed(&xb, q);
                let d = (self.term_residual(term, plus, xe) - self.term_residual(term, minus, xe))
                    / (2.0 * QUATERNION_STEP);
                for i in 0..dim {
                    j[(row + i, cb + q)] += d[i];
                }

                let (plus, minus) = perturbed(&xe, q);
                let d = (self.term_residual(term, xb, plus) - self.term_residual(term, xb, minus))
                    / (2.0 * QUATERNION_STEP);
                for i in 0..dim {
                    j[(row + i, ce + q)] += d[i];
                }
            }
        }
        j
    }

    /// Sum of squared residuals.
    pub fn cost(&self, x: &na::DVector<f64>) -> f64 {
        self.residuals(x).norm_squared()
    }

    fn term_residual(
        &self,
        term: &ConstraintTerm,
        xb: [f64; POSE_PARAMS],
        xe: [f64; POSE_PARAMS],
    ) -> na::Vector6<f64> {
        let pb = na::Vector3::new(xb[0], xb[1], xb[2]);
        let pe = na::Vector3::new(xe[0], xe[1], xe[2]);
        let qb = unit_quaternion(xb[3], xb[4], xb[5], xb[6]);
        let qe = unit_quaternion(xe[3], xe[4], xe[5], xe[6]);

        // predicted end position minus actual end position, world frame
        let t = pb + qb * term.translation - pe;
        let mut r = na::Vector6::zeros();
        r.fixed_rows_mut::<3>(0).copy_from(&t);

        if self.mode == ResidualMode::Full {
            let q_err = (term.rotation.inverse() * qb.inverse() * qe).into_inner();
            let sign = if q_err.w < 0.0 { -1.0 } else { 1.0 };
            let scale = 2.0 * sign * self.rotation_weight;
            r[3] = scale * q_err.i;
            r[4] = scale * q_err.j;
            r[5] = scale * q_err.k;
        }
        r
    }
}

/// Normalized quaternion from raw `(w, x, y, z)` parameters; a degenerate
/// quaternion is read as identity.
pub fn unit_quaternion(w: f64, x: f64, y: f64, z: f64) -> na::UnitQuaternion<f64> {
    let q = na::Quaternion::new(w, x, y, z);
    na::UnitQuaternion::try_new(q, f64::EPSILON).unwrap_or_else(na::UnitQuaternion::identity)
}

pub fn poses_to_params(poses: &[Pose]) -> na::DVector<f64> {
    let mut x = na::DVector::zeros(poses.len() * POSE_PARAMS);
    for (i, p) in poses.iter().enumerate() {
        let o = i * POSE_PARAMS;
        x.rows_mut(o, 3).copy_from(&p.position);
        x[o + 3] = p.orientation.w;
        x[o + 4] = p.orientation.i;
        x[o + 5] = p.orientation.j;
        x[o + 6] = p.orientation.k;
    }
    x
}

/// Inverse of [`poses_to_params`]; orientations come back normalized.
pub fn params_to_poses(x: &na::DVector<f64>) -> Vec<Pose> {
    (0..x.len() / POSE_PARAMS)
        .map(|i| {
            let b = pose_block(x, i);
            Pose::new(
                na::Vector3::new(b[0], b[1], b[2]),
                unit_quaternion(b[3], b[4], b[5], b[6]).into_inner(),
            )
        })
        .collect()
}

fn pose_block(x: &na::DVector<f64>, index: usize) -> [f64; POSE_PARAMS] {
    let mut b = [0.0; POSE_PARAMS];
    b.copy_from_slice(&x.as_slice()[index * POSE_PARAMS..(index + 1) * POSE_PARAMS]);
    b
}

fn perturbed(
    block: &[f64; POSE_PARAMS],
    index: usize,
) -> ([f64; POSE_PARAMS], [f64; POSE_PARAMS]) {
    let mut plus = *block;
    let mut minus = *block;
    plus[index] += QUATERNION_STEP;
    minus[index] -= QUATERNION_STEP;
    (plus, minus)
}
