//! Properties every solve must satisfy regardless of the problem instance.

use proptest::prelude::*;
use so_math::Array;
use so_models::models::quadratic::{quadratic_problem, QuadraticFactors, QuadraticModel};
use so_models::{ObjectiveSign, SimulationProblem};
use so_solvers::{ActiveSet, ActiveSetConfig, DirectSearch, DirectSearchConfig, Solver, Trail};

const TOL: f64 = 1e-7;

fn run(solver: &mut dyn Solver, center: Vec<f64>, noise_sd: f64, budget: usize) -> Trail {
    let mut problem = quadratic_problem(center, noise_sd)
        .budget(budget)
        .build()
        .unwrap();
    solver.solve(&mut problem).unwrap()
}

fn same_trail(a: &Trail, b: &Trail) -> bool {
    a.intermediate_budgets() == b.intermediate_budgets()
        && a.termination() == b.termination()
        && a.solutions().iter().zip(b.solutions()).all(|(s, t)| {
            s.x() == t.x() && s.objectives_mean().to_vec() == t.objectives_mean().to_vec()
        })
}

#[test]
fn same_seed_gives_identical_trails() {
    let config = DirectSearchConfig {
        r: 5,
        seed: 17,
        ..DirectSearchConfig::default()
    };
    let a = run(&mut DirectSearch::new(config.clone()).unwrap(), vec![1.0, 2.0], 1.0, 800);
    let b = run(&mut DirectSearch::new(config).unwrap(), vec![1.0, 2.0], 1.0, 800);
    assert!(same_trail(&a, &b));

    let config = ActiveSetConfig {
        r: 5,
        seed: 17,
        ..ActiveSetConfig::default()
    };
    let a = run(&mut ActiveSet::new(config.clone()).unwrap(), vec![1.0, 2.0], 1.0, 800);
    let b = run(&mut ActiveSet::new(config).unwrap(), vec![1.0, 2.0], 1.0, 800);
    assert!(same_trail(&a, &b));
}

#[test]
fn different_seeds_see_different_noise() {
    let trail = |seed| {
        let config = DirectSearchConfig {
            r: 5,
            seed,
            ..DirectSearchConfig::default()
        };
        run(&mut DirectSearch::new(config).unwrap(), vec![1.0, 2.0], 1.0, 400)
    };
    let (a, b) = (trail(1), trail(2));
    assert_ne!(
        a.solutions()[0].objectives_mean().to_vec(),
        b.solutions()[0].objectives_mean().to_vec()
    );
}

#[test]
fn budgets_increase_and_stay_within_the_total() {
    for crn_across_solutions in [true, false] {
        let config = DirectSearchConfig {
            r: 7,
            crn_across_solutions,
            ..DirectSearchConfig::default()
        };
        let trail = run(&mut DirectSearch::new(config).unwrap(), vec![-1.0, 0.5, 2.0], 0.3, 1000);
        let budgets = trail.intermediate_budgets();
        assert!(!budgets.is_empty());
        assert!(budgets.windows(2).all(|w| w[0] < w[1]));
        assert!(*budgets.last().unwrap() <= 1000);
    }
}

/// A noisy bowl on a box whose gradient must be estimated by finite differences.
fn finite_difference_box(
    center: Vec<f64>,
    lower: Array,
    upper: Array,
    budget: usize,
) -> SimulationProblem<QuadraticModel> {
    let dim = center.len();
    let model = QuadraticModel::with_factors(QuadraticFactors {
        x: vec![0.0; dim],
        center,
        weights: vec![1.0; dim],
        noise_sd: 0.1,
        analytic_gradient: false,
    })
    .unwrap();
    SimulationProblem::builder(model)
        .dim(dim)
        .objective_sign(ObjectiveSign::Minimize)
        .bounds(lower, upper)
        .budget(budget)
        .vector_to_factors(|x, f: &QuadraticFactors| QuadraticFactors {
            x: x.to_vec(),
            ..f.clone()
        })
        .responses_to_objectives(|r| Ok(Array::from_slice(&[r.scalar("value")?])))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn box_constrained_trails_stay_in_the_box(
        c0 in -5.0f64..5.0,
        c1 in -5.0f64..5.0,
        l0 in -2.0f64..0.0,
        l1 in -2.0f64..0.0,
        u0 in 0.5f64..2.0,
        u1 in 0.5f64..2.0,
        seed in 0u64..1000,
    ) {
        let lower = Array::from_slice(&[l0, l1]);
        let upper = Array::from_slice(&[u0, u1]);
        let mut problem = quadratic_problem(vec![c0, c1], 0.1)
            .bounds(lower.clone(), upper.clone())
            .budget(300)
            .build()
            .unwrap();
        let config = DirectSearchConfig { r: 5, seed, ..DirectSearchConfig::default() };
        let trail = DirectSearch::new(config).unwrap().solve(&mut problem).unwrap();

        prop_assert!(!trail.solutions().is_empty());
        for s in trail.solutions() {
            for i in 0..2 {
                prop_assert!(s.x()[i] >= lower[i] - TOL && s.x()[i] <= upper[i] + TOL);
            }
        }
    }

    #[test]
    fn active_set_trails_stay_in_the_box(
        c0 in -5.0f64..5.0,
        c1 in -5.0f64..5.0,
        l0 in -2.0f64..0.0,
        l1 in -2.0f64..0.0,
        u0 in 0.5f64..2.0,
        u1 in 0.5f64..2.0,
        seed in 0u64..1000,
    ) {
        let lower = Array::from_slice(&[l0, l1]);
        let upper = Array::from_slice(&[u0, u1]);
        let mut problem = finite_difference_box(vec![c0, c1], lower.clone(), upper.clone(), 400);
        let config = ActiveSetConfig { r: 5, seed, ..ActiveSetConfig::default() };
        let trail = ActiveSet::new(config).unwrap().solve(&mut problem).unwrap();

        prop_assert!(!trail.solutions().is_empty());
        for s in trail.solutions() {
            for i in 0..2 {
                prop_assert!(s.x()[i] >= lower[i] - TOL && s.x()[i] <= upper[i] + TOL);
            }
        }
    }
}
