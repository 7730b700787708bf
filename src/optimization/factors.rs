use nalgebra as na;
use tiny_solver::factors::Factor;

use super::problem::ResidualMode;
use crate::pose_graph::Constraint;

/// Relative pose constraint between two 7-parameter pose blocks
/// `[px, py, pz, qw, qx, qy, qz]`, evaluated with autodiff by tiny-solver.
#[derive(Debug, Clone)]
pub struct PoseConstraintFactor {
    /// expected translation of the end pose in the begin frame
    pub translation: [f64; 3],
    /// expected rotation, `(w, x, y, z)`
    pub rotation: [f64; 4],
    pub mode: ResidualMode,
    pub rotation_weight: f64,
}

impl PoseConstraintFactor {
    pub fn new(
        constraint: &Constraint,
        mode: ResidualMode,
        rotation_weight: f64,
    ) -> PoseConstraintFactor {
        let (translation, rotation) = match constraint.expected() {
            Some(t) => {
                let p = t.translation();
                let q = t.quaternion();
                ([p.x, p.y, p.z], [q.w, q.i, q.j, q.k])
            }
            None => ([0.0; 3], [1.0, 0.0, 0.0, 0.0]),
        };
        PoseConstraintFactor {
            translation,
            rotation,
            mode,
            rotation_weight,
        }
    }

    pub fn residual_num(&self) -> usize {
        self.mode.residual_dim()
    }
}

impl<T: na::RealField> Factor<T> for PoseConstraintFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        // params[begin pose, end pose]
        let pb = na::Vector3::new(
            params[0][0].clone(),
            params[0][1].clone(),
            params[0][2].clone(),
        );
        let pe = na::Vector3::new(
            params[1][0].clone(),
            params[1][1].clone(),
            params[1][2].clone(),
        );
        let qb = normalized(&params[0]);
        let qe = normalized(&params[1]);

        let t_x = na::Vector3::new(
            na::convert::<f64, T>(self.translation[0]),
            na::convert::<f64, T>(self.translation[1]),
            na::convert::<f64, T>(self.translation[2]),
        );
        let t = pb + rotate(&qb, &t_x) - pe;

        match self.mode {
            ResidualMode::Translation => {
                na::dvector![t[0].clone(), t[1].clone(), t[2].clone()]
            }
            ResidualMode::Full => {
                let q_x = self.rotation.map(na::convert::<f64, T>);
                let q_err = quaternion_mul(&quaternion_mul(&conjugate(&q_x), &conjugate(&qb)), &qe);
                let two: T = na::convert(2.0 * self.rotation_weight);
                let scale = if q_err[0] < T::zero() { -two } else { two };
                na::dvector![
                    t[0].clone(),
                    t[1].clone(),
                    t[2].clone(),
                    scale.clone() * q_err[1].clone(),
                    scale.clone() * q_err[2].clone(),
                    scale * q_err[3].clone()
                ]
            }
        }
    }
}

fn normalized<T: na::RealField>(block: &na::DVector<T>) -> [T; 4] {
    let q = [
        block[3].clone(),
        block[4].clone(),
        block[5].clone(),
        block[6].clone(),
    ];
    let norm = q
        .iter()
        .fold(T::zero(), |acc, v| acc + v.clone() * v.clone())
        .sqrt();
    if norm <= na::convert::<f64, T>(f64::EPSILON) {
        return [T::one(), T::zero(), T::zero(), T::zero()];
    }
    q.map(|v| v / norm.clone())
}

fn conjugate<T: na::RealField>(q: &[T; 4]) -> [T; 4] {
    [
        q[0].clone(),
        -q[1].clone(),
        -q[2].clone(),
        -q[3].clone(),
    ]
}

fn quaternion_mul<T: na::RealField>(a: &[T; 4], b: &[T; 4]) -> [T; 4] {
    let [aw, ax, ay, az] = a.clone();
    let [bw, bx, by, bz] = b.clone();
    [
        aw.clone() * bw.clone() - ax.clone() * bx.clone() - ay.clone() * by.clone()
            - az.clone() * bz.clone(),
        aw.clone() * bx.clone() + ax.clone() * bw.clone() + ay.clone() * bz.clone()
            - az.clone() * by.clone(),
        aw.clone() * by.clone() - ax.clone() * bz.clone() + ay.clone() * bw.clone()
            + az.clone() * bx.clone(),
        aw * bz + ax * by - ay * bx + az * bw,
    ]
}

fn rotate<T: na::RealField>(q: &[T; 4], v: &na::Vector3<T>) -> na::Vector3<T> {
    let p = [T::zero(), v[0].clone(), v[1].clone(), v[2].clone()];
    let r = quaternion_mul(&quaternion_mul(q, &p), &conjugate(q));
    na::Vector3::new(r[1].clone(), r[2].clone(), r[3].clone())
}
