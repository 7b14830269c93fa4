//! End-to-end solves on small problems with known answers.

use approx::assert_abs_diff_eq;
use so_core::{Error, Real};
use so_math::{Array, Matrix};
use so_models::models::mm1_queue::mm1_problem;
use so_models::models::quadratic::{quadratic_problem, QuadraticFactors, QuadraticModel};
use so_models::{ObjectiveSign, Problem, SimulationProblem};
use so_solvers::{
    ActiveSet, ActiveSetConfig, DirectSearch, DirectSearchConfig, FeasibilityEngine, Solver,
    SolverEvent, Termination, Trail,
};
use tracing_subscriber::filter::LevelFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::DEBUG)
        .try_init();
}

fn best_x(trail: &Trail) -> &Array {
    trail.best().expect("trail is never empty").x()
}

fn check_budgets(trail: &Trail, total: usize) {
    let budgets = trail.intermediate_budgets();
    assert_eq!(budgets.len(), trail.solutions().len());
    assert!(budgets.windows(2).all(|w| w[0] < w[1]), "budgets {budgets:?}");
    assert!(*budgets.last().unwrap() <= total);
    assert!(trail.solutions().iter().all(|s| s.n_reps() >= 1));
}

/// Nonnegative orthant in two dimensions.
fn orthant() -> (Array, Array) {
    (Array::zeros(2), Array::from_element(2, Real::INFINITY))
}

// ── Direct search ─────────────────────────────────────────────────────────────

#[test]
fn direct_search_finds_a_one_dimensional_minimum() {
    init_tracing();
    let mut problem = quadratic_problem(vec![3.0], 0.0)
        .budget(2000)
        .build()
        .unwrap();
    let mut solver = DirectSearch::new(DirectSearchConfig {
        r: 1,
        ..DirectSearchConfig::default()
    })
    .unwrap();
    let trail = solver.solve(&mut problem).unwrap();

    assert_eq!(trail.termination(), Termination::BudgetExhausted);
    assert_abs_diff_eq!(best_x(&trail)[0], 3.0, epsilon = 1e-2);
    check_budgets(&trail, 2000);
}

#[test]
fn direct_search_accepts_only_sufficient_decrease() {
    init_tracing();
    let config = DirectSearchConfig {
        r: 10,
        ..DirectSearchConfig::default()
    };
    let mut problem = quadratic_problem(vec![1.0, -2.0], 0.5)
        .budget(3000)
        .build()
        .unwrap();
    let trail = DirectSearch::new(config.clone())
        .unwrap()
        .solve(&mut problem)
        .unwrap();

    let mut accepted = 0;
    for event in trail.events() {
        if let SolverEvent::StepAccepted {
            alpha,
            incumbent_loss,
            candidate_loss,
            ..
        } = *event
        {
            accepted += 1;
            assert!(candidate_loss <= incumbent_loss - config.c * alpha.powf(config.q));
        }
    }
    assert!(accepted > 0);
    check_budgets(&trail, 3000);
}

#[test]
fn direct_search_stays_on_an_equality_plane() {
    init_tracing();
    let (lower, upper) = orthant();
    let mut problem = quadratic_problem(vec![0.0, 0.0], 0.0)
        .equality_constraints(Matrix::from_row_slice(1, 2, &[1.0, 1.0]), Array::from_slice(&[1.0]))
        .bounds(lower, upper)
        .budget(1500)
        .build()
        .unwrap();
    let engine = FeasibilityEngine::from_problem(&problem, 1e-6);
    let trail = DirectSearch::new(DirectSearchConfig {
        r: 1,
        ..DirectSearchConfig::default()
    })
    .unwrap()
    .solve(&mut problem)
    .unwrap();

    for s in trail.solutions() {
        assert!(engine.is_feasible(s.x()), "infeasible recommendation {}", s.x());
    }
    let x = best_x(&trail);
    assert_abs_diff_eq!(x[0], 0.5, epsilon = 5e-2);
    assert_abs_diff_eq!(x[1], 0.5, epsilon = 5e-2);
}

#[test]
fn direct_search_stops_on_a_single_point_region() {
    init_tracing();
    let mut problem = quadratic_problem(vec![0.0], 0.0)
        .bounds(Array::from_slice(&[2.0]), Array::from_slice(&[2.0]))
        .budget(500)
        .build()
        .unwrap();
    let trail = DirectSearch::new(DirectSearchConfig {
        r: 1,
        max_degenerate_polls: 3,
        ..DirectSearchConfig::default()
    })
    .unwrap()
    .solve(&mut problem)
    .unwrap();

    assert_eq!(trail.termination(), Termination::Degenerate);
    assert_eq!(trail.solutions().len(), 1);
    assert_eq!(best_x(&trail)[0], 2.0);
    assert_eq!(problem.budget().expended(), 1);
}

// ── Active set ────────────────────────────────────────────────────────────────

#[test]
fn active_set_converges_on_the_simplex() {
    init_tracing();
    let (lower, upper) = orthant();
    let mut problem = quadratic_problem(vec![0.0, 0.0], 0.0)
        .equality_constraints(Matrix::from_row_slice(1, 2, &[1.0, 1.0]), Array::from_slice(&[1.0]))
        .bounds(lower, upper)
        .budget(2000)
        .build()
        .unwrap();
    let trail = ActiveSet::new(ActiveSetConfig {
        r: 1,
        ..ActiveSetConfig::default()
    })
    .unwrap()
    .solve(&mut problem)
    .unwrap();

    let x = best_x(&trail);
    assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(x.sum(), 1.0, epsilon = 1e-6);
    check_budgets(&trail, 2000);
}

#[test]
fn active_set_stops_at_a_vertex_with_nonnegative_multipliers() {
    init_tracing();
    let (lower, upper) = orthant();
    let config = ActiveSetConfig::default();
    let mut problem = quadratic_problem(vec![-1.0, -1.0], 0.0)
        .bounds(lower, upper)
        .initial_solution(Array::from_slice(&[0.5, 0.5]))
        .budget(1000)
        .build()
        .unwrap();
    let trail = ActiveSet::new(config.clone())
        .unwrap()
        .solve(&mut problem)
        .unwrap();

    assert_eq!(trail.termination(), Termination::Optimal);
    let x = best_x(&trail);
    assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-9);

    let multipliers = trail
        .events()
        .iter()
        .find_map(|e| match e {
            SolverEvent::Optimal { multipliers } => Some(multipliers.clone()),
            _ => None,
        })
        .expect("optimal event recorded");
    assert_eq!(multipliers.len(), 2);
    assert!(multipliers.iter().all(|&m| m >= -config.tol));
    assert!(trail
        .events()
        .iter()
        .any(|e| matches!(e, SolverEvent::ConstraintAdded { .. })));
}

/// The same bowl as above with the model's gradient withheld.
fn finite_difference_problem() -> SimulationProblem<QuadraticModel> {
    let model = QuadraticModel::with_factors(QuadraticFactors {
        x: vec![0.0; 2],
        center: vec![-1.0, -1.0],
        weights: vec![1.0; 2],
        noise_sd: 0.0,
        analytic_gradient: false,
    })
    .unwrap();
    let (lower, upper) = orthant();
    SimulationProblem::builder(model)
        .name("QUADRATIC-FD")
        .dim(2)
        .objective_sign(ObjectiveSign::Minimize)
        .bounds(lower, upper)
        .initial_solution(Array::from_slice(&[0.5, 0.5]))
        .budget(2000)
        .vector_to_factors(|x, f: &QuadraticFactors| QuadraticFactors {
            x: x.to_vec(),
            ..f.clone()
        })
        .responses_to_objectives(|r| Ok(Array::from_slice(&[r.scalar("value")?])))
        .build()
        .unwrap()
}

#[test]
fn active_set_falls_back_to_finite_differences() {
    init_tracing();
    let mut problem = finite_difference_problem();
    assert!(!problem.gradient_available());
    let trail = ActiveSet::default().solve(&mut problem).unwrap();

    assert_eq!(trail.termination(), Termination::Optimal);
    let x = best_x(&trail);
    assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-9);
    check_budgets(&trail, 2000);
}

#[test]
fn flat_loss_retries_then_declares_optimality() {
    init_tracing();
    // A zero-weight bowl is flat: every finite difference is zero.
    let model = QuadraticModel::with_factors(QuadraticFactors {
        x: vec![0.0],
        center: vec![0.0],
        weights: vec![0.0],
        noise_sd: 0.0,
        analytic_gradient: false,
    })
    .unwrap();
    let mut problem = SimulationProblem::builder(model)
        .dim(1)
        .budget(10_000)
        .vector_to_factors(|x, f: &QuadraticFactors| QuadraticFactors {
            x: x.to_vec(),
            ..f.clone()
        })
        .responses_to_objectives(|r| Ok(Array::from_slice(&[r.scalar("value")?])))
        .build()
        .unwrap();
    let config = ActiveSetConfig {
        r: 2,
        max_zero_gradient_retries: 3,
        ..ActiveSetConfig::default()
    };
    let trail = ActiveSet::new(config).unwrap().solve(&mut problem).unwrap();

    let retries: Vec<usize> = trail
        .events()
        .iter()
        .filter_map(|e| match e {
            SolverEvent::ZeroGradientRetry { replications } => Some(*replications),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![4, 8, 16]);
    assert_eq!(trail.termination(), Termination::Optimal);
}

#[test]
fn both_solvers_improve_the_queue() {
    init_tracing();
    let total = 3000;
    let solvers: Vec<Box<dyn Solver>> = vec![
        Box::new(DirectSearch::default()),
        Box::new(ActiveSet::default()),
    ];
    for mut solver in solvers {
        let mut problem = mm1_problem(total).unwrap();
        let trail = solver.solve(&mut problem).unwrap();
        check_budgets(&trail, total);
        let first = problem.loss(&trail.solutions()[0]);
        let last = problem.loss(trail.best().unwrap());
        assert!(last <= first, "{}: {last} > {first}", solver.name());
        assert!(trail.solutions().iter().all(|s| s.x()[0] >= 1e-3 - 1e-7));
    }
}

#[test]
fn maximization_climbs_toward_the_far_corner() {
    init_tracing();
    let total = 1000;
    let solvers: Vec<Box<dyn Solver>> = vec![
        Box::new(
            DirectSearch::new(DirectSearchConfig {
                r: 1,
                ..DirectSearchConfig::default()
            })
            .unwrap(),
        ),
        Box::new(
            ActiveSet::new(ActiveSetConfig {
                r: 1,
                ..ActiveSetConfig::default()
            })
            .unwrap(),
        ),
    ];
    for mut solver in solvers {
        // The bowl grows away from (-0.5, -0.5): on the unit box its
        // maximum is 4.5 at (1, 1), its value at the start 0.5.
        let mut problem = quadratic_problem(vec![-0.5, -0.5], 0.0)
            .objective_sign(ObjectiveSign::Maximize)
            .bounds(Array::zeros(2), Array::from_element(2, 1.0))
            .budget(total)
            .build()
            .unwrap();
        let trail = solver.solve(&mut problem).unwrap();
        check_budgets(&trail, total);

        let first = &trail.solutions()[0];
        let best = trail.best().unwrap();
        assert_abs_diff_eq!(problem.loss(first), -0.5, epsilon = 1e-12);
        assert!(
            problem.loss(best) < problem.loss(first) - 1.0,
            "{}: loss {} did not improve on {}",
            solver.name(),
            problem.loss(best),
            problem.loss(first)
        );
        assert!(best.objectives_mean()[0] > first.objectives_mean()[0]);
        for s in trail.solutions() {
            assert!(s.x().iter().all(|&v| (-1e-7..=1.0 + 1e-7).contains(&v)));
        }
    }
}

#[test]
fn solving_with_a_spent_budget_is_an_error() {
    init_tracing();
    let solvers: Vec<Box<dyn Solver>> = vec![
        Box::new(
            DirectSearch::new(DirectSearchConfig {
                r: 50,
                ..DirectSearchConfig::default()
            })
            .unwrap(),
        ),
        Box::new(
            ActiveSet::new(ActiveSetConfig {
                r: 50,
                ..ActiveSetConfig::default()
            })
            .unwrap(),
        ),
    ];
    for mut solver in solvers {
        let mut problem = quadratic_problem(vec![1.0], 0.0)
            .budget(50)
            .build()
            .unwrap();
        let first = solver.solve(&mut problem).unwrap();
        assert!(first.solutions().iter().all(|s| s.n_reps() >= 1));
        assert_eq!(problem.budget().remaining(), 0);

        let again = solver.solve(&mut problem);
        assert!(
            matches!(
                again,
                Err(Error::BudgetExceeded {
                    requested: 50,
                    remaining: 0
                })
            ),
            "{}: {:?}",
            solver.name(),
            again.map(|t| t.intermediate_budgets().to_vec())
        );
    }
}

// ── Feasibility ───────────────────────────────────────────────────────────────

#[test]
fn unconstrained_problem_keeps_its_initial_point() {
    let problem = quadratic_problem(vec![1.0, 2.0, 3.0], 0.0)
        .initial_solution(Array::from_slice(&[-7.0, 0.25, 1e6]))
        .build()
        .unwrap();
    let engine = FeasibilityEngine::from_problem(&problem, 1e-7);
    let x0 = engine.find_feasible_point(problem.initial_solution()).unwrap();
    assert_eq!(&x0, problem.initial_solution());
}
