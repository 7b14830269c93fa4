use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use so_math::{Array, LinearProgram, Matrix};

/// Direction-finding LP of the active-set solver in `n` dimensions:
/// `min gᵀd` over `‖d‖₁ ≤ 1` with one equality row `Σd = 0`.
fn direction_lp(n: usize) -> LinearProgram {
    let mut c = vec![0.0; 2 * n];
    for (i, ci) in c.iter_mut().take(n).enumerate() {
        *ci = (i as f64 * 0.7).sin();
    }

    let mut eq = vec![0.0; 2 * n];
    eq[..n].fill(1.0);

    let rows = 2 * n + 1;
    let mut ub = vec![0.0; rows * 2 * n];
    for i in 0..n {
        // d_i − t_i ≤ 0 and −d_i − t_i ≤ 0
        ub[(2 * i) * 2 * n + i] = 1.0;
        ub[(2 * i) * 2 * n + n + i] = -1.0;
        ub[(2 * i + 1) * 2 * n + i] = -1.0;
        ub[(2 * i + 1) * 2 * n + n + i] = -1.0;
        ub[(rows - 1) * 2 * n + n + i] = 1.0;
    }
    let mut b_ub = vec![0.0; rows];
    b_ub[rows - 1] = 1.0;

    let mut lower = vec![f64::NEG_INFINITY; n];
    lower.extend(std::iter::repeat(0.0).take(n));

    LinearProgram::new(Array::from_vec(c))
        .equalities(Matrix::from_row_slice(1, 2 * n, &eq), Array::zeros(1))
        .and_then(|lp| lp.inequalities(Matrix::from_row_slice(rows, 2 * n, &ub), Array::from_vec(b_ub)))
        .and_then(|lp| lp.bounds(Array::from_vec(lower), Array::from_element(2 * n, f64::INFINITY)))
        .unwrap()
}

fn bench_direction_lp(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplex_direction_lp");
    for n in [2, 10, 30] {
        let lp = direction_lp(n);
        group.bench_with_input(BenchmarkId::new("dim", n), &lp, |b, lp| {
            b.iter(|| black_box(lp.solve().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_direction_lp);
criterion_main!(benches);
