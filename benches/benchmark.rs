use apriltag_field_map::optimization::factors::PoseConstraintFactor;
use apriltag_field_map::optimization::{OptimizerConfig, PoseGraphOptimizer, ResidualMode};
use apriltag_field_map::pose_graph::{Constraint, Pose, PoseGraph};
use apriltag_field_map::transform::{HomogeneousTransform, compose, invert};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra as na;
use tiny_solver::factors::Factor;

fn yaw_pose(x: f64, y: f64, yaw: f64) -> HomogeneousTransform {
    let r = na::Rotation3::from_euler_angles(0.0, 0.0, yaw);
    HomogeneousTransform::from_parts(r.matrix(), &na::Vector3::new(x, y, 0.0))
}

/// Tags on a circle, each constrained to its two successors, with a drifted start.
fn ring_graph(n: usize) -> PoseGraph {
    let truth: Vec<_> = (0..n)
        .map(|i| {
            let a = i as f64 / n as f64 * std::f64::consts::TAU;
            yaw_pose(5.0 * a.cos(), 5.0 * a.sin(), a)
        })
        .collect();
    let constraints = (0..n)
        .flat_map(|i| [(i, (i + 1) % n), (i, (i + 2) % n)])
        .map(|(b, e)| Constraint::with_expected(b, e, compose(&invert(&truth[b]), &truth[e])))
        .collect();
    let poses = truth
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let drift = i as f64 * 0.01;
            Pose::from_transform(&compose(t, &yaw_pose(drift, -drift, drift)))
        })
        .collect();
    PoseGraph::new(poses, constraints).unwrap()
}

fn bench_compose(c: &mut Criterion) {
    let a = yaw_pose(1.0, 2.0, 0.3);
    let b = yaw_pose(-0.5, 4.0, -1.1);
    c.bench_function("compose_invert", |bench| {
        bench.iter(|| compose(black_box(&a), &invert(black_box(&b))))
    });
}

fn bench_factor_residual(c: &mut Criterion) {
    let constraint = Constraint::with_expected(0, 1, yaw_pose(1.0, 0.5, 0.4));
    let factor = PoseConstraintFactor::new(&constraint, ResidualMode::Full, 1.0);
    let params = vec![
        na::dvector![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        na::dvector![1.0, 0.4, 0.1, 0.98, 0.0, 0.0, 0.2],
    ];
    c.bench_function("pose_constraint_residual", |b| {
        b.iter(|| factor.residual_func(black_box(&params)))
    });
}

fn bench_optimize_ring(c: &mut Criterion) {
    let graph = ring_graph(24);
    for mode in [ResidualMode::Translation, ResidualMode::Full] {
        let optimizer = PoseGraphOptimizer::new(OptimizerConfig {
            residual_mode: mode,
            ..OptimizerConfig::default()
        });
        c.bench_function(&format!("optimize_ring_24_{:?}", mode), |b| {
            b.iter(|| {
                let mut g = graph.clone();
                optimizer.optimize(black_box(&mut g))
            })
        });
    }
}

criterion_group!(benches, bench_compose, bench_factor_residual, bench_optimize_ring);
criterion_main!(benches);
