use RustedShooting::numerical::Examples_and_utils::TestProblem;
use RustedShooting::numerical::ShootingBVP::MultipleShooting_solver::MultipleShooting;
use RustedShooting::numerical::ShootingBVP::STM_dynamics::DerivativeMethod;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn solve_oscillator(number_arcs: usize, method: DerivativeMethod) -> bool {
    let problem = TestProblem::LinearOscillator;
    let mut bvp = problem.bvp(30);
    let mut solver = MultipleShooting::new(1e-8, 50, 100.0, method, number_arcs, false).unwrap();
    solver.set_solver_params(Some("off".to_string()));
    solver.solve(&mut bvp).converged
}

fn bench_arc_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("oscillator by arc count");
    for number_arcs in [2usize, 4, 8] {
        group.bench_function(format!("{} arcs", number_arcs), |b| {
            b.iter(|| {
                solve_oscillator(
                    black_box(number_arcs),
                    DerivativeMethod::finite_difference(),
                )
            })
        });
    }
    group.finish();
}

fn bench_derivative_policies(c: &mut Criterion) {
    c.bench_function("finite difference", |b| {
        b.iter(|| solve_oscillator(4, DerivativeMethod::finite_difference()))
    });
    c.bench_function("complex step", |b| {
        b.iter(|| solve_oscillator(4, DerivativeMethod::complex_step()))
    });
}

criterion_group!(benches, bench_arc_counts, bench_derivative_policies);
criterion_main!(benches);
