use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra as na;
use nalgebra::storage::Owned;
use serde::{Deserialize, Serialize};
use tiny_solver::LevenbergMarquardtOptimizer;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;

use super::factors::PoseConstraintFactor;
use super::problem::{
    POSE_PARAMS, PoseGraphProblem, ResidualMode, params_to_poses, poses_to_params,
};
use crate::pose_graph::PoseGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    /// MINPACK-style Levenberg–Marquardt on the explicit Jacobian.
    #[default]
    LevenbergMarquardt,
    /// tiny-solver Levenberg–Marquardt with autodiff factors.
    TinySolver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub backend: SolverBackend,
    pub residual_mode: ResidualMode,
    pub max_iterations: usize,
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Weight of rotation residuals relative to translation, in meters per radian.
    pub rotation_weight: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::LevenbergMarquardt,
            residual_mode: ResidualMode::Translation,
            max_iterations: 100,
            max_evaluations: 1000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            rotation_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Converged,
    /// Nothing to optimize; poses were left untouched.
    NoConstraints,
    MaxIterations,
    MaxEvaluations,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub status: SolverStatus,
    /// Jacobian evaluations. `None` for the tiny-solver backend, which does
    /// not expose its iteration count.
    pub iterations: Option<usize>,
    /// Residual evaluations. `None` for the tiny-solver backend.
    pub evaluations: Option<usize>,
    pub initial_cost: f64,
    pub final_cost: f64,
}

impl OptimizationReport {
    pub fn converged(&self) -> bool {
        matches!(
            self.status,
            SolverStatus::Converged | SolverStatus::NoConstraints
        )
    }
}

/// Refines every pose of a graph so that its constraints are satisfied in the
/// least-squares sense.
#[derive(Debug, Clone, Default)]
pub struct PoseGraphOptimizer {
    config: OptimizerConfig,
}

impl PoseGraphOptimizer {
    pub fn new(config: OptimizerConfig) -> PoseGraphOptimizer {
        PoseGraphOptimizer { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs the configured backend and writes the best point it found back
    /// into `graph`. Never fails; check the report's status for convergence.
    pub fn optimize(&self, graph: &mut PoseGraph) -> OptimizationReport {
        if graph.num_constraints() == 0 {
            return OptimizationReport {
                status: SolverStatus::NoConstraints,
                iterations: Some(0),
                evaluations: Some(0),
                initial_cost: 0.0,
                final_cost: 0.0,
            };
        }

        let problem = PoseGraphProblem::new(
            graph,
            self.config.residual_mode,
            self.config.rotation_weight,
        );
        let x0 = poses_to_params(graph.poses());
        let initial_cost = problem.cost(&x0);

        // Both backends only accept cost-decreasing steps, so the returned
        // point never costs more than `x0`.
        let (x, mut status, iterations, evaluations) = match self.config.backend {
            SolverBackend::LevenbergMarquardt => {
                let (x, status, iterations, evaluations) =
                    self.solve_lm(&problem, &x0, initial_cost);
                (x, status, Some(iterations), Some(evaluations))
            }
            SolverBackend::TinySolver => {
                let (x, status) = self.solve_tiny(graph, &problem, &x0);
                (x, status, None, None)
            }
        };
        let final_cost = problem.cost(&x);

        if let Err(e) = graph.replace_poses(params_to_poses(&x)) {
            log::error!("could not write optimized poses back: {}", e);
            status = SolverStatus::Failed;
        }

        let report = OptimizationReport {
            status,
            iterations,
            evaluations,
            initial_cost,
            final_cost,
        };
        if report.converged() {
            log::info!(
                "pose graph optimized: cost {:e} -> {:e} ({:?})",
                initial_cost,
                final_cost,
                status
            );
        } else {
            log::warn!(
                "pose graph optimization stopped with {:?}: cost {:e} -> {:e}",
                status,
                initial_cost,
                final_cost
            );
        }
        report
    }

    fn solve_lm(
        &self,
        problem: &PoseGraphProblem,
        x0: &na::DVector<f64>,
        initial_cost: f64,
    ) -> (na::DVector<f64>, SolverStatus, usize, usize) {
        let n = problem.num_params();
        let max_evaluations = self.config.max_evaluations.max(1);
        let patience = max_evaluations.div_ceil(n + 1).max(1);
        let lm = LevenbergMarquardt::new()
            .with_ftol(self.config.ftol)
            .with_xtol(self.config.xtol)
            .with_gtol(self.config.gtol)
            .with_patience(patience);

        let adapter = LmAdapter {
            problem,
            params: x0.clone(),
            max_iterations: self.config.max_iterations.max(1),
            max_evaluations,
            iterations: Cell::new(0),
            evaluations: Cell::new(0),
            stopped_by: Cell::new(None),
            best: RefCell::new((initial_cost, x0.clone())),
        };
        let (adapter, report) = lm.minimize(adapter);
        log::debug!(
            "levenberg-marquardt: {:?} after {} evaluations",
            report.termination,
            report.number_of_evaluations
        );

        let status = if let Some(cap) = adapter.stopped_by.get() {
            cap
        } else if report.termination.was_successful()
            || matches!(report.termination, TerminationReason::NoImprovementPossible(_))
        {
            // no improvement possible means the tolerances hit machine precision
            SolverStatus::Converged
        } else if matches!(report.termination, TerminationReason::LostPatience) {
            SolverStatus::MaxEvaluations
        } else {
            SolverStatus::Failed
        };
        let (_, best) = adapter.best.into_inner();
        (
            best,
            status,
            adapter.iterations.get(),
            adapter.evaluations.get(),
        )
    }

    fn solve_tiny(
        &self,
        graph: &PoseGraph,
        cost_problem: &PoseGraphProblem,
        x0: &na::DVector<f64>,
    ) -> (na::DVector<f64>, SolverStatus) {
        let names: Vec<String> = (0..graph.num_poses()).map(|i| format!("x{}", i)).collect();
        let mut problem = Problem::new();
        let mut used = BTreeSet::new();
        for c in graph.constraints() {
            // a pose constrained to itself contributes nothing
            if c.id_begin() == c.id_end() {
                continue;
            }
            let factor = PoseConstraintFactor::new(
                c,
                self.config.residual_mode,
                self.config.rotation_weight,
            );
            problem.add_residual_block(
                factor.residual_num(),
                &[names[c.id_begin()].as_str(), names[c.id_end()].as_str()],
                Box::new(factor),
                None,
            );
            used.insert(c.id_begin());
            used.insert(c.id_end());
        }
        if used.is_empty() {
            return (x0.clone(), SolverStatus::Converged);
        }

        // tiny-solver evaluates residuals twice per iteration (linearization
        // and trial step) plus once up front.
        let max_iterations = self.config.max_iterations.max(1);
        let evaluation_budget = (self.config.max_evaluations.saturating_sub(1) / 2).max(1);
        let (iteration_cap, cap_status) = if evaluation_budget < max_iterations {
            (evaluation_budget, SolverStatus::MaxEvaluations)
        } else {
            (max_iterations, SolverStatus::MaxIterations)
        };
        let options = OptimizerOptions {
            max_iteration: iteration_cap,
            ..OptimizerOptions::default()
        };

        let optimizer = LevenbergMarquardtOptimizer::default();
        let initial_values = values_of(x0, &used, &names);
        let Some(solution) = optimizer.optimize(&problem, &initial_values, Some(options)) else {
            return (x0.clone(), SolverStatus::Failed);
        };
        let x = with_values(x0, &used, &names, &solution);

        // tiny-solver returns the same way whether it met its stopping rule
        // or ran out of iterations. One more iteration from the result tells
        // the two apart: a converged point does not move under the same rule.
        let continuation = OptimizerOptions {
            max_iteration: 1,
            ..OptimizerOptions::default()
        };
        let status = match optimizer.optimize(&problem, &solution, Some(continuation.clone())) {
            Some(next) => {
                let cost = cost_problem.cost(&x);
                let next_cost = cost_problem.cost(&with_values(x0, &used, &names, &next));
                if has_stalled(cost, next_cost, &continuation) {
                    SolverStatus::Converged
                } else {
                    log::debug!(
                        "tiny-solver stopped after {} iterations with cost still dropping ({:e} -> {:e})",
                        iteration_cap,
                        cost,
                        next_cost
                    );
                    cap_status
                }
            }
            // no step could be taken from the result
            None => SolverStatus::Converged,
        };
        (x, status)
    }
}

fn values_of(
    x: &na::DVector<f64>,
    used: &BTreeSet<usize>,
    names: &[String],
) -> HashMap<String, na::DVector<f64>> {
    used.iter()
        .map(|&i| (names[i].clone(), x.rows(i * POSE_PARAMS, POSE_PARAMS).into_owned()))
        .collect()
}

fn with_values(
    x0: &na::DVector<f64>,
    used: &BTreeSet<usize>,
    names: &[String],
    values: &HashMap<String, na::DVector<f64>>,
) -> na::DVector<f64> {
    let mut x = x0.clone();
    for &i in used {
        if let Some(v) = values.get(&names[i]) {
            x.rows_mut(i * POSE_PARAMS, POSE_PARAMS).copy_from(v);
        }
    }
    x
}

/// tiny-solver's own stopping rule applied to one step.
fn has_stalled(cost: f64, next_cost: f64, options: &OptimizerOptions) -> bool {
    let decrease = (cost - next_cost).abs();
    cost < options.min_error_threshold
        || decrease < options.min_abs_error_decrease_threshold
        || decrease / cost < options.min_rel_error_decrease_threshold
}

/// Feeds [`PoseGraphProblem`] to the `levenberg-marquardt` crate while
/// counting evaluations and remembering the lowest-cost point seen.
struct LmAdapter<'a> {
    problem: &'a PoseGraphProblem,
    params: na::DVector<f64>,
    max_iterations: usize,
    max_evaluations: usize,
    iterations: Cell<usize>,
    evaluations: Cell<usize>,
    stopped_by: Cell<Option<SolverStatus>>,
    best: RefCell<(f64, na::DVector<f64>)>,
}

impl LeastSquaresProblem<f64, na::Dyn, na::Dyn> for LmAdapter<'_> {
    type ResidualStorage = Owned<f64, na::Dyn>;
    type JacobianStorage = Owned<f64, na::Dyn, na::Dyn>;
    type ParameterStorage = Owned<f64, na::Dyn>;

    fn set_params(&mut self, x: &na::DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> na::DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<na::DVector<f64>> {
        if self.evaluations.get() >= self.max_evaluations {
            self.stopped_by.set(Some(SolverStatus::MaxEvaluations));
            return None;
        }
        self.evaluations.set(self.evaluations.get() + 1);
        let r = self.problem.residuals(&self.params);
        let cost = r.norm_squared();
        let mut best = self.best.borrow_mut();
        if cost.is_finite() && cost < best.0 {
            *best = (cost, self.params.clone());
        }
        Some(r)
    }

    fn jacobian(&self) -> Option<na::DMatrix<f64>> {
        if self.iterations.get() >= self.max_iterations {
            self.stopped_by.set(Some(SolverStatus::MaxIterations));
            return None;
        }
        self.iterations.set(self.iterations.get() + 1);
        Some(self.problem.jacobian(&self.params))
    }
}
