use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use corofem::fem::implicit::ImplicitOperator;
use corofem::{test_utils::*, *};

const EXPLICIT_BENCH_PARAMS: SimParams = SimParams {
    bounds: None,
    ..SimParams::explicit()
};

const IMPLICIT_BENCH_PARAMS: SimParams = SimParams {
    bounds: None,
    ..SimParams::implicit()
};

fn make_box(i: usize) -> TetMesh {
    make_box_mesh([i, i, i], 1.0 / i as f64)
}

fn step_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Step");

    for i in (2..19).step_by(4) {
        let box_mesh = make_box(i);

        group.bench_function(BenchmarkId::new("Explicit", i), |b| {
            let mut engine = SolverBuilder::new(EXPLICIT_BENCH_PARAMS)
                .set_solid(box_mesh.clone(), EXPLICIT_MATERIAL)
                .build()
                .unwrap();
            b.iter(|| engine.step().is_ok())
        });

        group.bench_function(BenchmarkId::new("Implicit", i), |b| {
            let mut engine = SolverBuilder::new(IMPLICIT_BENCH_PARAMS)
                .set_solid(box_mesh.clone(), IMPLICIT_MATERIAL)
                .build()
                .unwrap();
            b.iter(|| engine.step().is_ok())
        });
    }

    group.finish();
}

fn operator_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Implicit Operator");

    for i in (2..19).step_by(4) {
        let box_mesh = make_box(i);
        let elements = TetElements::new(&box_mesh, IMPLICIT_MATERIAL.density).unwrap();
        let mu = IMPLICIT_MATERIAL.elasticity().mu;
        let op = ImplicitOperator::from_mesh(&box_mesh, &elements, mu, 1.0 / 30.0);
        let vel: Vec<[f64; 3]> = box_mesh
            .vertex_positions()
            .iter()
            .map(|p| [p[1], -p[0], 0.5 * p[2]])
            .collect();
        let mut out = vec![[0.0; 3]; vel.len()];

        group.bench_function(BenchmarkId::new("Apply", i), |b| {
            b.iter(|| op.apply(&vel, &mut out))
        });
    }

    group.finish();
}

criterion_group!(benches, step_performance, operator_performance);
criterion_main!(benches);
