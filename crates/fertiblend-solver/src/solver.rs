use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::backend::{LpBackend, MicroLpBackend};
use crate::problem::{Constraint, ConstraintOp, LpProblem, VariableBounds};
use crate::solution::{ConstraintViolation, Solution, SolutionStatus};

/// Solver adapter: runs a backend under a timeout, retries operational
/// failures, verifies optimal points and explains infeasibility.
#[derive(Clone)]
pub struct Solver {
    backend: Arc<dyn LpBackend>,
    /// Relative feasibility tolerance (absolute when the rhs is zero)
    tolerance: f64,
    /// Wall-clock limit for a single backend call
    timeout: Option<Duration>,
    /// How many times an `Error` status is retried before it is returned
    max_retries: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            backend: Arc::new(MicroLpBackend),
            tolerance: 1e-6,
            timeout: Some(Duration::from_secs(10)),
            max_retries: 1,
        }
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("backend", &self.backend.name())
            .field("tolerance", &self.tolerance)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: impl LpBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve the problem and classify the outcome.
    ///
    /// The status is always taken from the backend's status code; an optimal
    /// point that fails verification is downgraded to `Error`.
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        let mut solution = self.attempt(problem);
        let mut retries = 0;
        while solution.status == SolutionStatus::Error && retries < self.max_retries {
            retries += 1;
            tracing::warn!(
                backend = self.backend.name(),
                reason = solution.message.as_deref().unwrap_or("unknown"),
                retry = retries,
                "solver error, retrying"
            );
            solution = self.attempt(problem);
        }

        match solution.status {
            SolutionStatus::Optimal => self.verify(problem, solution),
            SolutionStatus::Infeasible => self.explain_infeasibility(problem),
            SolutionStatus::Unbounded | SolutionStatus::Error => solution,
        }
    }

    /// One backend call, bounded by the timeout when one is set
    fn attempt(&self, problem: &LpProblem) -> Solution {
        let Some(limit) = self.timeout else {
            return self.backend.solve(problem);
        };

        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let owned = problem.clone();
        let spawned = thread::Builder::new()
            .name("fertiblend-lp".to_string())
            .spawn(move || {
                // The receiver may be gone after a timeout
                let _ = tx.send(backend.solve(&owned));
            });
        if let Err(e) = spawned {
            return Solution::error(format!("failed to start solver thread: {}", e));
        }

        match rx.recv_timeout(limit) {
            Ok(solution) => solution,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(backend = self.backend.name(), ?limit, "solver timed out");
                Solution::error(format!("solver exceeded the time limit of {:?}", limit))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Solution::error("solver stopped without producing a result")
            }
        }
    }

    /// Check an optimal point against every bound and row within tolerance
    fn verify(&self, problem: &LpProblem, mut solution: Solution) -> Solution {
        if solution.values.len() != problem.num_variables() {
            return Solution::error(format!(
                "solver returned {} values for {} variables",
                solution.values.len(),
                problem.num_variables()
            ));
        }
        if solution.values.iter().any(|v| !v.is_finite()) {
            return Solution::error("solver returned non-finite values");
        }

        for ((name, b), &v) in problem.variables.iter().zip(&problem.bounds).zip(&solution.values) {
            let below = v < b.lower - self.tolerance * b.lower.abs().max(1.0);
            let above = b.upper.is_some_and(|u| v > u + self.tolerance * u.abs().max(1.0));
            if below || above {
                return Solution::error(format!("{} = {} lies outside its bounds", name, v));
            }
        }

        let mut binding = Vec::new();
        for c in &problem.constraints {
            let lhs = c.lhs(&solution.values);
            if !c.is_satisfied_by(lhs, self.tolerance) {
                return Solution::error(format!(
                    "{} evaluates to {} which violates its bound of {}",
                    c.name, lhs, c.rhs
                ));
            }
            if (lhs - c.rhs).abs() <= self.tolerance * c.rhs.abs().max(1.0) {
                binding.push(c.name.clone());
            }
        }

        solution.objective_value = problem.objective_value(&solution.values);
        solution.binding_constraints = binding;
        solution
    }

    /// When the original problem is infeasible, find out which lower-bound
    /// rows cannot be met.
    ///
    /// Every `>=` row gets a shortfall variable and every `=` row a pair of
    /// deviation variables; upper limits and variable bounds stay hard. The
    /// relaxed problem minimizes total scaled shortfall, and the rows left
    /// short at its optimum are reported.
    fn explain_infeasibility(&self, problem: &LpProblem) -> Solution {
        let n = problem.num_variables();
        let mut columns: Vec<(String, usize, f64, f64)> = Vec::new();
        for (i, c) in problem.constraints.iter().enumerate() {
            let weight = 1.0 / c.rhs.abs().max(1.0);
            match c.op {
                ConstraintOp::Ge => columns.push((format!("{}_short", c.name), i, 1.0, weight)),
                ConstraintOp::Eq => {
                    columns.push((format!("{}_short", c.name), i, 1.0, weight));
                    columns.push((format!("{}_over", c.name), i, -1.0, weight));
                }
                ConstraintOp::Le => {}
            }
        }

        if columns.is_empty() {
            return self.analyze_conflicts(problem);
        }

        let mut relaxed = problem.clone();
        let width = n + columns.len();
        for c in &mut relaxed.constraints {
            c.coefficients.resize(width, 0.0);
        }
        let mut objective = vec![0.0; n];
        for (k, (name, row, coef, weight)) in columns.into_iter().enumerate() {
            relaxed.variables.push(name);
            relaxed.bounds.push(VariableBounds::default());
            relaxed.constraints[row].coefficients[n + k] = coef;
            objective.push(weight);
        }
        relaxed.set_objective(objective, true);

        let relaxed_solution = self.attempt(&relaxed);
        if relaxed_solution.status != SolutionStatus::Optimal || relaxed_solution.values.len() < n {
            // Relaxation failed too, look for rows that contradict each other
            return self.analyze_conflicts(problem);
        }

        let violations = self.find_violations(problem, &relaxed_solution.values[..n]);
        Solution::infeasible_with_violations(violations)
    }

    /// Find which constraints are violated by a given assignment
    fn find_violations(&self, problem: &LpProblem, values: &[f64]) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &problem.constraints {
            let lhs = c.lhs(values);
            if c.is_satisfied_by(lhs, self.tolerance) {
                continue;
            }
            let (amount, description) = match c.op {
                ConstraintOp::Le => {
                    let amt = lhs - c.rhs;
                    (amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt))
                }
                ConstraintOp::Ge => {
                    let amt = c.rhs - lhs;
                    (amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt))
                }
                ConstraintOp::Eq => {
                    let amt = (lhs - c.rhs).abs();
                    (amt, format!("{} requires exactly {:.2} but reaches {:.2}", c.name, c.rhs, lhs))
                }
            };
            violations.push(ConstraintViolation {
                constraint: c.name.clone(),
                required: c.rhs,
                actual: lhs,
                violation_amount: amount,
                description,
            });
        }

        // Worst first
        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        violations
    }

    /// Analyze direct constraint conflicts when even the relaxed solve fails
    fn analyze_conflicts(&self, problem: &LpProblem) -> Solution {
        // Rows over the same support (same coefficient signs) bound the same expression
        let mut groups: HashMap<Vec<i8>, Vec<&Constraint>> = HashMap::new();
        for c in &problem.constraints {
            let key: Vec<i8> = c
                .coefficients
                .iter()
                .map(|&x| {
                    if x.abs() < self.tolerance {
                        0
                    } else if x > 0.0 {
                        1
                    } else {
                        -1
                    }
                })
                .collect();
            groups.entry(key).or_default().push(c);
        }

        let mut violations = Vec::new();
        for constraints in groups.values() {
            let mut min_bound: Option<&Constraint> = None;
            let mut max_bound: Option<&Constraint> = None;
            for &c in constraints {
                if matches!(c.op, ConstraintOp::Ge | ConstraintOp::Eq)
                    && min_bound.is_none_or(|m| c.rhs > m.rhs)
                {
                    min_bound = Some(c);
                }
                if matches!(c.op, ConstraintOp::Le | ConstraintOp::Eq)
                    && max_bound.is_none_or(|m| c.rhs < m.rhs)
                {
                    max_bound = Some(c);
                }
            }

            if let (Some(lo), Some(hi)) = (min_bound, max_bound) {
                if lo.rhs > hi.rhs + self.tolerance {
                    violations.push(ConstraintViolation {
                        constraint: format!("{} vs {}", lo.name, hi.name),
                        required: lo.rhs,
                        actual: hi.rhs,
                        violation_amount: lo.rhs - hi.rhs,
                        description: format!(
                            "Conflict: {} requires >= {:.2} but {} requires <= {:.2}",
                            lo.name, lo.rhs, hi.name, hi.rhs
                        ),
                    });
                }
            }
        }

        violations.sort_by(|a, b| {
            b.violation_amount
                .total_cmp(&a.violation_amount)
                .then_with(|| a.constraint.cmp(&b.constraint))
        });
        Solution::infeasible_with_violations(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then delegates to microlp
    struct FlakyBackend {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    impl LpBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        fn solve(&self, problem: &LpProblem) -> Solution {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Solution::error("numerical trouble")
            } else {
                MicroLpBackend.solve(problem)
            }
        }
    }

    struct SlowBackend(Duration);

    impl LpBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        fn solve(&self, problem: &LpProblem) -> Solution {
            thread::sleep(self.0);
            MicroLpBackend.solve(problem)
        }
    }

    /// Claims optimality at the origin regardless of the rows
    struct LyingBackend;

    impl LpBackend for LyingBackend {
        fn name(&self) -> &str {
            "lying"
        }

        fn solve(&self, problem: &LpProblem) -> Solution {
            Solution::optimal(vec![0.0; problem.num_variables()], 0.0)
        }
    }

    struct PanickingBackend;

    impl LpBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn solve(&self, _problem: &LpProblem) -> Solution {
            panic!("backend blew up");
        }
    }

    fn covering_problem() -> LpProblem {
        // min x + 2y  s.t.  0.2x >= 30, 0.4y >= 20, 0.2y >= 10
        let mut problem = LpProblem::new(vec!["a".to_string(), "b".to_string()]);
        problem.set_objective(vec![1.0, 2.0], true);
        problem.add_constraint("N_min", vec![0.2, 0.0], ConstraintOp::Ge, 30.0);
        problem.add_constraint("P2O5_min", vec![0.0, 0.4], ConstraintOp::Ge, 20.0);
        problem.add_constraint("K2O_min", vec![0.0, 0.2], ConstraintOp::Ge, 10.0);
        problem
    }

    #[test]
    fn test_optimal_solution_is_verified_and_reports_binding_rows() {
        let solution = Solver::new().solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 150.0).abs() < 1e-6);
        assert!((solution.values[1] - 50.0).abs() < 1e-6);
        assert!((solution.objective_value - 250.0).abs() < 1e-6);
        assert_eq!(solution.binding_constraints.len(), 3);
    }

    #[test]
    fn test_error_is_retried_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let solver = Solver::new().with_backend(FlakyBackend {
            failures: 1,
            calls: Arc::clone(&calls),
        });

        let solution = solver.solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_persistent_error_surfaces_after_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let solver = Solver::new().with_backend(FlakyBackend {
            failures: usize::MAX,
            calls: Arc::clone(&calls),
        });

        let solution = solver.solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Error);
        assert_eq!(solution.message.as_deref(), Some("numerical trouble"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_maps_to_error() {
        let solver = Solver::new()
            .with_backend(SlowBackend(Duration::from_millis(500)))
            .with_timeout(Some(Duration::from_millis(20)))
            .with_max_retries(0);

        let solution = solver.solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.message.unwrap_or_default().contains("time limit"));
    }

    #[test]
    fn test_panicking_backend_maps_to_error() {
        let solver = Solver::new().with_backend(PanickingBackend).with_max_retries(0);

        let solution = solver.solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Error);
    }

    #[test]
    fn test_verification_rejects_violating_point() {
        let solver = Solver::new().with_backend(LyingBackend);

        let solution = solver.solve(&covering_problem());

        assert_eq!(solution.status, SolutionStatus::Error);
        assert!(solution.message.unwrap_or_default().contains("N_min"));
    }

    #[test]
    fn test_infeasible_explanation_names_only_unreachable_rows() {
        let mut problem = covering_problem();
        // b is capped at 50, so K2O can reach at most 10
        problem.set_bounds(1, 0.0, Some(50.0));
        problem.constraints[2].rhs = 100.0;

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert_eq!(solution.violations.len(), 1);
        let violation = &solution.violations[0];
        assert_eq!(violation.constraint, "K2O_min");
        assert!((violation.actual - 10.0).abs() < 1e-6);
        assert!((violation.violation_amount - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_direct_conflict_is_reported_when_relaxation_fails() {
        // x >= 5 (lower bound, stays hard) and x <= 3
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], true);
        problem.set_bounds(0, 5.0, None);
        problem.add_constraint("upper", vec![1.0], ConstraintOp::Le, 3.0);
        problem.add_constraint("lower", vec![1.0], ConstraintOp::Ge, 4.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.violations.iter().any(|v| v.constraint == "lower vs upper"));
    }
}
